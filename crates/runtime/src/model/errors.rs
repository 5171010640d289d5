use thiserror::Error;

/// Errors from model backend calls.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network: {0}")]
    Network(String),
    #[error("model api: {0}")]
    Api(String),
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}
