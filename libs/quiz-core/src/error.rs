//! Error types for quiz-core.

use thiserror::Error;

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while validating shared types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("empty device id")]
    EmptyDeviceId,

    #[error("device id too long: {len} characters (max {max})")]
    DeviceIdTooLong { len: usize, max: usize },

    #[error("unknown question type: {0}")]
    UnknownQuestionKind(String),
}
