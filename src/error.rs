//! Typed error taxonomy for library operations.
//!
//! Remote-call failures are reified as explicit variants so callers handle
//! each kind: per-file failures are skipped, transport failures abort one
//! operation, run failures surface as a conversational reply rather than an
//! error. The binary keeps `anyhow` at the boundary; everything here
//! converts into it via `std::error::Error`.

use crate::models::{BatchOutcome, RunState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing registry record or a remote handle the service does not know.
    #[error("not found: {0}")]
    NotFound(String),

    /// Remote call rejected or unreachable after retries.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Some documents in a batch did not ingest. The batch itself was
    /// delivered; the outcome says which counts failed.
    #[error("batch partially failed: {} of {} files did not ingest", .0.failed, .0.total)]
    PartialBatch(BatchOutcome),

    /// A conversational turn ended in a non-completed terminal state.
    #[error("run ended in state {}", .0.as_str())]
    RunFailure(RunState),

    /// No documents to ingest, malformed saved handle, or invalid settings.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
