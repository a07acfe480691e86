//! Per-command plays: the procedures the conductor's entry points run.
//!
//! Every play shares a [`PlayContext`] (the environment plus the knobs that
//! govern how containers are reached and how progress is reported) and, for
//! the dependency-ordered plays, runs its per-container body through
//! [`crate::play_executor::execute`].

pub mod clean;
pub mod deptree;
pub mod full_status;
pub mod kill;
pub mod logs;
pub mod pull;
pub mod restart;
pub mod start;
pub mod status;
pub mod stop;

use std::path::PathBuf;

use crate::model::Environment;
use crate::progress::ProgressSink;

/// Shared read-only context every play runs against.
pub struct PlayContext<'a> {
    /// The constructed environment graph.
    pub environment: &'a Environment,
    /// Path to the `docker` binary, passed to each ship's client.
    pub docker_path: PathBuf,
    /// Maximum number of per-container tasks in flight at once.
    pub concurrency: usize,
    /// Destination for executor progress events.
    pub progress: &'a dyn ProgressSink,
}

impl<'a> PlayContext<'a> {
    /// Build a context with the default concurrency (one task per requested
    /// container, i.e. effectively unbounded for typical environment sizes).
    pub fn new(environment: &'a Environment, docker_path: PathBuf, progress: &'a dyn ProgressSink) -> Self {
        Self {
            environment,
            docker_path,
            concurrency: usize::MAX,
            progress,
        }
    }

    /// Override the concurrency limit.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// The textual status line a play reports for one container, shared by
/// `status`, `start`, `stop`, `kill`, and `clean`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    /// `"up"` / `"down"`, optionally with a short container id.
    UpDown {
        /// The container name this line is about.
        container: String,
        /// `"up"` or `"down"`.
        state: &'static str,
        /// First 7 characters of the container id, when running.
        short_id: Option<String>,
    },
    /// A free-form note, e.g. `"already up"`, `"host down"`, `"unchanged"`.
    Note {
        /// The container name this line is about.
        container: String,
        /// The note text.
        text: String,
    },
}
