//! Common error types for driveup.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for driveup operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No cached credential exists at the given path.
    #[error("No cached credential at {}", .0.display())]
    CacheMiss(PathBuf),

    /// A cached credential exists but cannot be decoded.
    #[error("Cached credential at {} is unreadable: {reason}", path.display())]
    CacheCorrupt { path: PathBuf, reason: String },

    /// The operator-supplied authorization code could not be read.
    #[error("Unable to read authorization code: {0}")]
    UserInput(String),

    /// The token endpoint declined the authorization code or refresh token.
    #[error("Token endpoint rejected the request: {0}")]
    ExchangeRejected(String),

    /// The credential could not be written to the cache.
    #[error("Unable to cache credential at {}: {source}", path.display())]
    PersistFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A remote call failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Client configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The credential cannot authorize requests.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Remote resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote access denied.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error means the credential cache cannot be used and the
    /// web authorization flow should run instead.
    pub fn is_cache_fallback(&self) -> bool {
        matches!(self, Error::CacheMiss(_) | Error::CacheCorrupt { .. })
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
