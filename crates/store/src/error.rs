use thiserror::Error;

/// Closed error taxonomy for the store boundary (spec §7). Callers that
/// don't need to match on a specific variant convert this into
/// [`anyhow::Error`] via `?`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("retention expired: {0}")]
    RetentionExpired(String),
}
