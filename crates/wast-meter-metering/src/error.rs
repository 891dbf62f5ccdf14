//! Metering error types.

use thiserror::Error;
use wast_meter_types::ast::ValueType;
use wast_meter_types::ErrorCode;

/// Errors that abort a metering pass. None of them are retryable: they
/// describe programs that cannot be metered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeterError {
    /// A type-keyed instruction operates on a float type.
    #[error("disallowed type: {ty} in '{instruction}'")]
    DisallowedType { ty: ValueType, instruction: String },

    /// The cost key has no entry in the cost table.
    #[error("unsupported instruction: {0}")]
    UnsupportedInstruction(String),

    /// A function's total cost does not fit the `u32` charge operand.
    #[error("gas overflow: function '{func}' costs more than {}", u32::MAX)]
    GasOverflow { func: String },

    /// Invalid cost table or environment override.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MeterError {
    /// The diagnostic code reported for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            MeterError::DisallowedType { .. } => ErrorCode::DISALLOWED_TYPE,
            MeterError::UnsupportedInstruction(_) => ErrorCode::UNSUPPORTED_INSTRUCTION,
            MeterError::GasOverflow { .. } => ErrorCode::GAS_OVERFLOW,
            MeterError::Config(_) => ErrorCode::INVALID_CONFIG,
        }
    }
}

/// Metering result type alias.
pub type MeterResult<T> = Result<T, MeterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = MeterError::DisallowedType {
            ty: ValueType::F64,
            instruction: "f64.add".into(),
        };
        assert_eq!(err.to_string(), "disallowed type: f64 in 'f64.add'");
        assert_eq!(
            MeterError::UnsupportedInstruction("i32.frob".into()).to_string(),
            "unsupported instruction: i32.frob"
        );
        assert_eq!(
            MeterError::GasOverflow { func: "$f".into() }.to_string(),
            "gas overflow: function '$f' costs more than 4294967295"
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            MeterError::UnsupportedInstruction(String::new()).code(),
            ErrorCode::UNSUPPORTED_INSTRUCTION
        );
        assert_eq!(MeterError::Config(String::new()).code(), ErrorCode::INVALID_CONFIG);
    }
}
