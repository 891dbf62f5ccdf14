use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of errors stored before the rest are only counted.
pub const MAX_ERRORS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Structure,
    Metering,
}

/// Numeric error code (E100–E399).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax errors (E100–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNTERMINATED: Self = Self(101);
    pub const UNKNOWN_INSTRUCTION: Self = Self(102);
    pub const INVALID_LITERAL: Self = Self(103);
    pub const UNKNOWN_TYPE: Self = Self(104);

    // ── Structure errors (E200–E299) ──
    pub const UNKNOWN_FIELD: Self = Self(200);
    pub const UNRESOLVED_NAME: Self = Self(201);
    pub const MALFORMED_MODULE: Self = Self(202);
    pub const INVALID_JSON: Self = Self(203);
    pub const ENCODING_FAILED: Self = Self(204);

    // ── Metering errors (E300–E399) ──
    pub const DISALLOWED_TYPE: Self = Self(300);
    pub const UNSUPPORTED_INSTRUCTION: Self = Self(301);
    pub const GAS_OVERFLOW: Self = Self(302);
    pub const INVALID_CONFIG: Self = Self(303);

    pub fn category(self) -> ErrorCategory {
        match self.0 {
            200..=299 => ErrorCategory::Structure,
            300..=399 => ErrorCategory::Metering,
            _ => ErrorCategory::Syntax,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Structure => write!(f, "structure"),
            Self::Metering => write!(f, "metering"),
        }
    }
}

/// A structured diagnostic.
///
/// Hosts render these directly; they should never need to parse the
/// message text.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{span}: {code} [{category}] {message}")]
pub struct WastError {
    pub file: String,
    pub code: ErrorCode,
    pub severity: Severity,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The source line the span starts on, empty for synthesized nodes.
    pub source_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl WastError {
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Errors and warnings collected by one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<WastError>,
    pub warnings: Vec<WastError>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl CompileErrors {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A list holding exactly one error.
    pub fn single(error: WastError) -> Self {
        let mut errors = Self::empty();
        errors.push_error(error);
        errors
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// `true` once the stored list is full and front-end stages should stop.
    pub fn is_full(&self) -> bool {
        self.total_errors >= MAX_ERRORS
    }

    /// Add an error, storing at most [`MAX_ERRORS`].
    pub fn push_error(&mut self, error: WastError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    pub fn push_warning(&mut self, warning: WastError) {
        self.warnings.push(warning);
        self.total_warnings += 1;
    }

    /// Append everything from `other`, keeping the storage limit.
    pub fn extend(&mut self, other: CompileErrors) {
        let dropped = other.total_errors - other.errors.len();
        for error in other.errors {
            self.push_error(error);
        }
        self.total_errors += dropped;
        for warning in other.warnings {
            self.push_warning(warning);
        }
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", error.file, error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(code: ErrorCode) -> WastError {
        WastError::new(
            "add.wast",
            code,
            "unknown instruction 'i32.addd'",
            Span::new(3, 5, 3, 13),
            "    (i32.addd (i32.const 1) (i32.const 2))",
        )
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::UNEXPECTED_TOKEN.category(), ErrorCategory::Syntax);
        assert_eq!(ErrorCode::UNKNOWN_TYPE.category(), ErrorCategory::Syntax);
        assert_eq!(ErrorCode::UNRESOLVED_NAME.category(), ErrorCategory::Structure);
        assert_eq!(ErrorCode::DISALLOWED_TYPE.category(), ErrorCategory::Metering);
        assert_eq!(ErrorCode::GAS_OVERFLOW.category(), ErrorCategory::Metering);
    }

    #[test]
    fn test_error_display() {
        let err = sample(ErrorCode::UNKNOWN_INSTRUCTION);
        assert_eq!(err.to_string(), "3:5: E102 [syntax] unknown instruction 'i32.addd'");
    }

    #[test]
    fn test_error_json_shape() {
        let err = sample(ErrorCode::UNKNOWN_INSTRUCTION).with_suggestion("did you mean 'i32.add'?");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains(r#""code":102"#));
        assert!(json.contains(r#""category":"syntax""#));
        assert!(json.contains(r#""line":3"#));
        assert!(json.contains(r#""end_column":13"#));
        assert!(json.contains(r#""suggestion""#));

        let back: WastError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.code, err.code);
        assert_eq!(back.span, err.span);
    }

    #[test]
    fn test_suggestion_omitted_when_absent() {
        let json = serde_json::to_string(&sample(ErrorCode::UNEXPECTED_TOKEN)).unwrap();
        assert!(!json.contains("suggestion"));
    }

    #[test]
    fn test_compile_errors_limit() {
        let mut errs = CompileErrors::empty();
        for _ in 0..25 {
            errs.push_error(sample(ErrorCode::UNEXPECTED_TOKEN));
        }
        assert_eq!(errs.errors.len(), MAX_ERRORS);
        assert_eq!(errs.total_errors, 25);
        assert!(errs.is_full());
    }

    #[test]
    fn test_compile_errors_extend_keeps_totals() {
        let mut first = CompileErrors::single(sample(ErrorCode::UNEXPECTED_TOKEN));
        let mut second = CompileErrors::empty();
        for _ in 0..22 {
            second.push_error(sample(ErrorCode::UNKNOWN_TYPE));
        }
        first.extend(second);
        assert_eq!(first.errors.len(), MAX_ERRORS);
        assert_eq!(first.total_errors, 23);
    }
}
