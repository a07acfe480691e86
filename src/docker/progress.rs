//! Pull progress parsing, grounded on the image manager's streamed JSON status lines.

use serde::{Deserialize, Serialize};

/// One `docker pull --quiet=false` JSON status line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullProgress {
    /// Status message, e.g. `"Downloading"` or `"Pull complete"`.
    pub status: String,
    /// Layer id this line refers to, if any.
    pub id: Option<String>,
    /// Human-readable progress string, e.g. `"[===>] 10MB/20MB"`.
    pub progress: Option<String>,
    /// Structured current/total byte counts, if present.
    pub progress_detail: Option<ProgressDetail>,
}

/// Byte-level progress detail attached to a [`PullProgress`] line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressDetail {
    /// Bytes transferred so far.
    pub current: Option<u64>,
    /// Total bytes expected.
    pub total: Option<u64>,
}

/// A single event surfaced from a running pull: a progress line, or the
/// terminal outcome.
#[derive(Debug, Clone)]
pub enum PullEvent {
    /// A layer reported progress.
    Progress(PullProgress),
    /// The pull finished successfully.
    Complete,
}
