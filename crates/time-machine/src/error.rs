use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimeMachineError {
    #[error("Unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("Source unavailable ({source_name}): {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TimeMachineError {
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        TimeMachineError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

pub type TimeMachineResult<T> = Result<T, TimeMachineError>;
