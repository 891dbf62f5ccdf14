//! Codegen error types.

use thiserror::Error;

/// Errors that can occur while encoding a module to binary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// The module uses something the binary encoder does not emit.
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// A `$name` or index does not refer to anything in scope.
    #[error("unresolved symbol: {0}")]
    UnresolvedSymbol(String),

    /// The generated WASM module failed validation.
    #[error("WASM validation failed: {0}")]
    ValidationFailed(String),
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
