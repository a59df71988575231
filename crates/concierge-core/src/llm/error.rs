use thiserror::Error;

/// Errors raised while talking to the hosted model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key was configured for the provider.
    #[error("model provider API key is not configured")]
    MissingApiKey,

    /// Transport-level failure (DNS, TLS, connection reset, ...).
    #[error("HTTP request to model provider failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("model provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider reported an error inside the event stream.
    #[error("model provider error: {0}")]
    Provider(String),

    /// The event stream could not be read or decoded.
    #[error("malformed model stream: {0}")]
    Stream(String),
}
