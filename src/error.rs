//! Error types
//!
//! One enum per layer: `DirectoryError` for the directory API client,
//! `ProviderError` for content-network queries. Provider errors are always
//! recovered inside the resolver and never escape as hard failures.

use thiserror::Error;

/// Errors from the directory API.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Transport failure or non-2xx response. Carries the raw response body
    /// (or the transport error message) as the user-visible detail.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// The API signalled that the record does not exist.
    #[error("record not found: {owner}/{name}")]
    NotFound { owner: String, name: String },
}

/// Process-setup failures (configuration, logging initialization).
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors from the content network.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No content-network capability in this environment. Expected when
    /// running without a local node; not a failure.
    #[error("content network capability unavailable")]
    CapabilityUnavailable,

    /// The provider-discovery query failed (transport error or malformed
    /// peer record).
    #[error("provider query failed: {0}")]
    QueryFailed(String),

    /// The provider-discovery query exceeded its deadline.
    #[error("provider query timed out after {0:?}")]
    Timeout(std::time::Duration),
}
