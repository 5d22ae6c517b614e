use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or executing a sweep.
#[derive(Debug, Error)]
pub enum SweepError {
    /// The sweep description violates an invariant (empty value list, bad label, nbrun 0).
    #[error("invalid sweep config: {0}")]
    InvalidConfig(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The benchmark executable could not be started at all.
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    /// A run exited unsuccessfully while fail-fast was requested.
    #[error("run #{seq} failed (exit code {})", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    RunFailed { seq: usize, code: Option<i32> },
}

impl SweepError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        SweepError::InvalidConfig(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SweepError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;
