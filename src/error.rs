//! Error kinds raised while slicing a container.
//!
//! The engine separates failures the caller asked for (a requested binary that does not
//! exist, a `docker cp` that fails) from failures it can absorb while expanding implied
//! dependencies. [`SliceError::is_not_found`] is the switch the dependency walk uses.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SliceError {
    /// An external command exited non-zero (or timed out).
    #[error("command `{command}` failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// A path does not exist inside the container.
    #[error("{path} could not be found in the container")]
    NotFound { path: String },

    /// The dynamic dependency report for a binary could not be obtained.
    #[error("could not list dependencies of {binary}")]
    DependencyQueryFailed {
        binary: String,
        #[source]
        source: Box<SliceError>,
    },

    /// A dependency report line did not have the `name => path` shape.
    #[error("malformed dependency report line: {line:?}")]
    MalformedDependencyReport { line: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid exposed port {value:?}: {reason}")]
    InvalidPort { value: String, reason: String },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("failed to read run manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SliceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SliceError::NotFound { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SliceError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        SliceError::Config {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SliceError>;
