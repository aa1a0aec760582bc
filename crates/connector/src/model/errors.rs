use thiserror::Error;

/// Errors from model backend calls.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// A network error occurred during the call.
    #[error("network: {0}")]
    Network(String),

    /// The model server returned an error response.
    #[error("model api: {0}")]
    Api(String),

    /// The model response could not be parsed.
    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    /// The fragment stream broke off.
    #[error("stream: {0}")]
    Stream(String),
}
