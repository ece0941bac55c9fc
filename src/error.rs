// error.rs - Error taxonomy for artifact reconciliation and rescans

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElevateError {
    /// A companion executable needed for a rewrite is absent. Scoped to one artifact.
    #[error("{name} does not exist at {}", path.display())]
    MissingDependency { name: &'static str, path: PathBuf },

    /// A JSON artifact failed to parse. Fatal for the whole run.
    #[error("malformed JSON in {}: {source}", path.display())]
    MalformedDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A JSON artifact parsed, but is not an object.
    #[error("expected a JSON object in {}", path.display())]
    NotAnObject { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {command}: {source}")]
    RescanSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}")]
    RescanFailed { command: String, status: String },

    #[error("{command} did not finish within {}s", timeout.as_secs())]
    RescanTimedOut { command: String, timeout: Duration },
}

impl ElevateError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ElevateError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that only invalidate the artifact being processed.
    pub fn is_artifact_scoped(&self) -> bool {
        matches!(self, ElevateError::MissingDependency { .. })
    }
}

pub type Result<T> = std::result::Result<T, ElevateError>;
