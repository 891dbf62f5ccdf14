//! Shared types for the wast-meter pipeline.
//!
//! This crate defines the text-format AST, source spans and the structured
//! diagnostics shared by the lexer, parser, metering pass and back end.

mod error;
mod span;
pub mod ast;

pub use error::{CompileErrors, ErrorCategory, ErrorCode, Severity, WastError, MAX_ERRORS};
pub use span::{SourceFile, Span};

/// Result type used by the front end.
pub type Result<T> = std::result::Result<T, WastError>;
