use thiserror::Error;

use crate::matrix::Dim;

// Unified error type for linop

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KError {
    #[error("executor mismatch in {op}: expected {expected}, found {found}")]
    ExecutorMismatch {
        op: &'static str,
        expected: String,
        found: String,
    },
    #[error("dimension mismatch in {op}: {detail}")]
    DimensionMismatch { op: &'static str, detail: String },
    #[error("index ({row}, {col}) out of range for {size} operand")]
    OutOfRange { row: usize, col: usize, size: Dim },
    #[error("breakdown at iteration {iteration}: {detail}")]
    Breakdown {
        iteration: usize,
        detail: &'static str,
    },
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("invalid sparse structure: {0}")]
    InvalidStructure(String),
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error("unknown option `{0}`")]
    UnknownOption(String),
}

impl KError {
    pub(crate) fn dims(op: &'static str, detail: impl Into<String>) -> Self {
        KError::DimensionMismatch {
            op,
            detail: detail.into(),
        }
    }
}
