use thiserror::Error;

/// Turn-level errors.
///
/// Tool failures never surface here; they are reported to the model inside
/// the tool results instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("failed to encode tool results: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
