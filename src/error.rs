use thiserror::Error;

/// Errors surfaced by the store and the query/analytics entry points.
///
/// Legacy conversion never produces one of these: missing fields are filled
/// with defaults instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("event '{id}' not found")]
    NotFound { id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl EngineError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
