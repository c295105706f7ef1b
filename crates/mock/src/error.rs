//! Error types for `opendeps-mock`.

use crate::engine::EngineState;
use opendeps_fetch::FetchError;
use opendeps_manifest::ManifestError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MockError {
    /// The manifest or a spec location could not be found or read.
    #[error(transparent)]
    Resolution(#[from] ManifestError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Writing into the staging directory failed.
    #[error("failed to stage {}: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write mock configuration {}: {source}", .path.display())]
    ConfigGeneration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The container engine rejected an operation.
    #[error("container engine failed to {operation}: {message}")]
    Engine {
        operation: &'static str,
        message: String,
    },

    #[error("container {container} did not stop within {}s", .timeout.as_secs())]
    ShutdownTimeout {
        container: String,
        timeout: Duration,
    },

    #[error("invalid engine state for {operation}: expected {expected}, found {actual}")]
    InvalidState {
        operation: &'static str,
        expected: EngineState,
        actual: EngineState,
    },
}

impl MockError {
    pub(crate) fn engine(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Engine {
            operation,
            message: err.to_string(),
        }
    }
}

/// Result type alias for mock operations.
pub type Result<T> = std::result::Result<T, MockError>;
