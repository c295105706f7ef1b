//! Error types for `opendeps-fetch`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while classifying or reading a source location.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid URL '{location}': {message}")]
    InvalidUrl { location: String, message: String },

    /// The location carries a scheme other than `http`, `https` or `file`.
    #[error("unsupported scheme '{scheme}' in '{location}'")]
    UnsupportedScheme { location: String, scheme: String },

    /// The request never produced a response (DNS, connect, TLS, ...).
    #[error("failed to fetch from URL [{url}]: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a non-2xx status.
    #[error("failed to read from URL [{url}]: {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read from {location}: {source}")]
    Read {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the fetched content to its destination failed.
    #[error("failed to write to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
