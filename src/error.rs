use thiserror::Error;

/// Failure classes for a single API request. `NotFound` and exhausted
/// `Transient` failures surface to callers as absence values, never as a
/// batch abort; `RateLimited` is always retried internally.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },
}
