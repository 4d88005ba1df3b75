use thiserror::Error;

/// Errors surfaced by the inference provider client.
///
/// The engine core never inspects these directly; the invoker folds them
/// into its outcome taxonomy. Variants mirror what the wire can report:
/// quota rejection, any other HTTP error, an undecodable body, transport
/// failure, or failure to read the input file for upload.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 429. `retry_after_ms` comes from the Retry-After header when
    /// the provider sends one.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Any other non-success HTTP status, with the response body.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The provider answered 200 but the body did not decode.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// Underlying transport failure (DNS, refused connection, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The input file could not be read for upload.
    #[error("file error: {0}")]
    File(#[from] std::io::Error),
}
