//! Core data models used throughout vsctl.
//!
//! These types represent the index handle, documents, batch outcomes, and
//! conversation entities that flow between the CLI commands and the remote
//! retrieval and assistant services.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque identifier plus human-readable name for a remote retrieval index.
///
/// Created once by `build`, persisted as the single registry record, and
/// consumed by search, chat, and delete. At most one handle is active at a
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHandle {
    pub id: String,
    pub name: String,
}

/// A local file selected for ingestion: path plus accepted content type.
///
/// Never retained after the upload batch resolves.
#[derive(Debug, Clone)]
pub struct DocumentRef {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: &'static str,
}

/// A document read into memory and staged for upload.
///
/// Buffers are dropped when the batch resolves, on every exit path.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Status of an ingestion batch as reported by the retrieval service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl BatchStatus {
    /// Terminal statuses end the poll loop; no further transitions occur
    /// without a new request.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed
                | BatchStatus::Failed
                | BatchStatus::Cancelled
                | BatchStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Cancelled => "cancelled",
            BatchStatus::Expired => "expired",
        }
    }
}

/// Aggregated per-file outcome of an ingestion batch.
///
/// Invariant: `succeeded + failed + in_progress + cancelled == total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub status: BatchStatus,
    pub succeeded: u64,
    pub failed: u64,
    pub in_progress: u64,
    pub cancelled: u64,
    pub total: u64,
}

impl BatchOutcome {
    /// Outcome for a build that had nothing to upload.
    pub fn empty() -> Self {
        BatchOutcome {
            status: BatchStatus::Completed,
            succeeded: 0,
            failed: 0,
            in_progress: 0,
            cancelled: 0,
            total: 0,
        }
    }

    /// True when the batch reached a terminal state with every file ingested.
    pub fn is_fully_successful(&self) -> bool {
        self.status == BatchStatus::Completed && self.failed == 0 && self.in_progress == 0
    }

    /// Fold files that never reached the service (read or upload failures)
    /// into the counts so they still sum to the number of input documents.
    pub fn absorb_local_failures(&mut self, n: u64) {
        self.failed += n;
        self.total += n;
    }
}

/// A file stored in the remote index, attributable back to its source name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub id: String,
    pub file_name: String,
}

/// A scored content fragment returned by the retrieval service.
///
/// Ephemeral: produced per query, never persisted. The score is reported
/// exactly as the service returned it.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub content: String,
    pub score: f64,
    pub file_id: Option<String>,
    pub file_name: Option<String>,
}

/// Author of a thread message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of a conversation thread, in the order the service lists them
/// (newest first).
#[derive(Debug, Clone)]
pub struct ThreadMessage {
    pub role: Role,
    pub content: String,
}

/// State of a single grounded response generation over a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled | RunState::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Queued => "queued",
            RunState::InProgress => "in_progress",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
            RunState::Expired => "expired",
        }
    }
}
