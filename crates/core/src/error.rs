//! Error taxonomy for a single script step invocation.
//!
//! The `Display` text of each variant is what ends up in the
//! [`Outcome`](crate::outcome::Outcome) reason and the log sink. File-system
//! variants keep the underlying error as their `source` so operators can log
//! it, while the message itself stays generic.

use crate::outcome::{Outcome, CANCELED_REASON};

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("script content not provided, aborting")]
    MissingScript,

    #[error("cannot create temporary file, aborting")]
    TempFileCreate(#[source] std::io::Error),

    #[error("cannot write script in temporary file, aborting")]
    TempFileWrite(#[source] std::io::Error),

    #[error("cannot rename script to add powershell Extension, aborting")]
    Rename(#[source] std::io::Error),

    #[error("cannot chmod script, aborting")]
    Chmod(#[source] std::io::Error),

    #[error("Failure due to internal error (Worker Path)")]
    WorkerPath(#[source] std::io::Error),

    #[error("Failure due to internal error")]
    Pipe,

    #[error("{0}")]
    Spawn(std::io::Error),

    #[error("{0}")]
    Wait(std::io::Error),

    /// Non-zero exit. Carries the platform's exit status text.
    #[error("{0}")]
    ProcessExit(String),

    #[error("{}", CANCELED_REASON)]
    Cancelled,
}

impl From<ScriptError> for Outcome {
    fn from(err: ScriptError) -> Self {
        Outcome::failure(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
