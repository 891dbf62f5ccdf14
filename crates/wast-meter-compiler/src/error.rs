//! Stage errors as structured diagnostics.

use thiserror::Error;
use wast_meter_codegen::CodegenError;
use wast_meter_metering::analyze::function_cost;
use wast_meter_metering::{CostTable, MeterError};
use wast_meter_types::ast::{Func, Script};
use wast_meter_types::{ErrorCode, SourceFile, Span, WastError};

/// Failure of [`inject_json`](crate::inject_json).
#[derive(Debug, Error)]
pub enum InjectJsonError {
    /// The input is not a JSON script, or the output failed to serialize.
    #[error("invalid JSON AST: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Meter(#[from] MeterError),
}

impl InjectJsonError {
    pub fn code(&self) -> ErrorCode {
        match self {
            InjectJsonError::Json(_) => ErrorCode::INVALID_JSON,
            InjectJsonError::Meter(e) => e.code(),
        }
    }
}

/// Diagnostic for a failed metering pass, pointing at the first function
/// that cannot be metered.
pub fn meter_diagnostic(
    error: &MeterError,
    script: &Script,
    table: &CostTable,
    source_file: &SourceFile,
) -> WastError {
    let span = failing_function(script, table)
        .map(|func| func.span)
        .unwrap_or_default();
    let diagnostic = at(source_file, error.code(), error.to_string(), span);
    match error {
        MeterError::DisallowedType { .. } => diagnostic
            .with_suggestion("metered code must use integer types; float results are not deterministic"),
        MeterError::UnsupportedInstruction(key) => {
            diagnostic.with_suggestion(format!("add a cost for '{key}' to the gas table"))
        }
        MeterError::GasOverflow { .. } => {
            diagnostic.with_suggestion("split the function into smaller functions")
        }
        MeterError::Config(_) => diagnostic,
    }
}

/// Diagnostic for a module the binary encoder rejected.
pub fn codegen_diagnostic(error: &CodegenError, source_file: &SourceFile) -> WastError {
    let code = match error {
        CodegenError::UnresolvedSymbol(_) => ErrorCode::UNRESOLVED_NAME,
        CodegenError::Unsupported(_) | CodegenError::ValidationFailed(_) => {
            ErrorCode::ENCODING_FAILED
        }
    };
    at(source_file, code, error.to_string(), Span::default())
}

pub fn at(source_file: &SourceFile, code: ErrorCode, message: impl Into<String>, span: Span) -> WastError {
    let line = source_file.line(span.line).unwrap_or_default();
    WastError::new(&source_file.name, code, message, span, line)
}

fn failing_function<'s>(script: &'s Script, table: &CostTable) -> Option<&'s Func> {
    script
        .modules
        .iter()
        .flat_map(|module| module.funcs())
        .find(|func| match function_cost(table, &func.body) {
            Ok(total) => total > u64::from(u32::MAX),
            Err(_) => true,
        })
}
