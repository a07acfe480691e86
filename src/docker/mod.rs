//! Docker CLI automation: a subprocess-driving client rather than an HTTP
//! API binding, so that remote ships are reached by pointing the `docker`
//! binary at a different daemon via `DOCKER_HOST` instead of maintaining a
//! connection pool per host.

mod client;
mod executor;
mod progress;

pub use client::{DockerClient, DockerClientConfig, Inspection};
pub use executor::{CommandOutput, ExecutionConfig, ProcessExecutor, StreamingOutput};
pub use progress::{PullEvent, ProgressDetail, PullProgress};
