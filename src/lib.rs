//! # maestro
//!
//! A dependency-aware orchestration engine for Docker container fleets
//! spread across multiple hosts ("ships"). Maestro builds a graph of ships,
//! services, and containers from a declarative environment description,
//! resolves `requires`/`wants_info` edges into a deterministic execution
//! order, and runs bounded-concurrency "plays" — status, pull, start, stop,
//! kill, restart, clean, logs, and dependency-tree inspection — against
//! that graph.
//!
//! Containers are reached over the `docker` CLI binary rather than the
//! HTTP API: remote ships are addressed by pointing the subprocess at a
//! different daemon via `DOCKER_HOST`, so there's no connection pool or TLS
//! stack to manage per host.
//!
//! ## Architecture
//!
//! - [`config`] — `serde`/`serde_yaml` deserialization of the environment
//!   description.
//! - [`model`] — the constructed graph: [`model::Environment`],
//!   [`model::Ship`], [`model::Service`], [`model::Container`].
//! - [`conductor`] — builds the graph from configuration, resolves
//!   dependency and link-variable relations, and exposes the command entry
//!   points plays are built from.
//! - [`planner`] — dependency-aware ordering and cycle detection.
//! - [`play_executor`] — the bounded-concurrency task dispatcher plays run
//!   their per-container bodies through.
//! - [`play`] — the per-command procedures themselves (status, pull, start,
//!   stop, kill, restart, clean, logs, deptree).
//! - [`probe`] — TCP/HTTP/exec readiness checks.
//! - [`docker`] — the `docker` CLI subprocess client.
//! - [`progress`] — the sink plays report per-container progress events to.
//! - [`audit`] — pre/post/error hooks wrapped around every play invocation.
//! - [`error`] — the crate's error taxonomy.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use maestro::conductor::{self, Selector};
//! use maestro::progress::LineProgressSink;
//! use maestro::play::PlayContext;
//!
//! # async fn run() -> maestro::error::Result<()> {
//! const YAML: &str = r#"
//! name: demo
//! ships:
//!   local: { ip: "127.0.0.1" }
//! services: {}
//! "#;
//! let config = maestro::config::parse(YAML)?;
//! let mut environment = conductor::build(&config)?;
//! conductor::resolve_deps(&mut environment)?;
//! conductor::propagate_links(&mut environment)?;
//!
//! let progress = LineProgressSink;
//! let ctx = PlayContext::new(&environment, "docker".into(), &progress);
//! let selector = Selector::default();
//! let report = conductor::status(&ctx, &selector).await?;
//! for line in report {
//!     println!("{line:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod audit;
pub mod conductor;
pub mod config;
pub mod docker;
pub mod error;
pub mod globbing;
pub mod model;
pub mod planner;
pub mod play;
pub mod play_executor;
pub mod probe;
pub mod progress;

pub use conductor::Selector;
pub use error::{MaestroError, Result};
pub use model::Environment;

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
    }
}
