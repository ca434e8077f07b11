use thiserror::Error;

/// Errors at the fallible edges of the engine (config, JSON inputs, stores).
///
/// The learning algorithms themselves are total and never return this.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid config: {0}")]
    Config(String),

    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected {0} card")]
    UnexpectedCard(&'static str),
}

pub type EngineResult<T> = Result<T, EngineError>;
