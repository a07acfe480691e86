//! Error taxonomy for the orchestration engine.
//!
//! Every fallible operation in this crate returns [`MaestroError`], modeled
//! after the five classes described by the orchestration design: configuration
//! problems caught at construction time, dependency-graph cycles, play-level
//! orchestration failures, transient daemon/network errors, and user
//! parameter misuse.

use std::time::Duration;
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MaestroError>;

/// Comprehensive error type for environment construction, planning, and play execution.
#[derive(Debug, Error)]
pub enum MaestroError {
    /// The environment description failed validation at construction time.
    #[error("configuration error: {message}")]
    Configuration {
        /// Details about what failed validation.
        message: String,
    },

    /// A dependency cycle was detected while planning or resolving the graph.
    #[error("dependency cycle detected, involving: {}", names.join(", "))]
    DependencyCycle {
        /// At least one container/service name participating in the cycle.
        names: Vec<String>,
    },

    /// A dependency name referenced by `requires`/`wants_info`/`volumes_from` does not exist.
    #[error("unknown dependency `{name}` referenced by `{from}`")]
    UnknownDependency {
        /// The container or service that made the reference.
        from: String,
        /// The name that could not be resolved.
        name: String,
    },

    /// A play-level failure: the orchestration procedure itself failed for a container.
    #[error("orchestration failed for container `{container}`: {message}")]
    Orchestration {
        /// The container the play was operating on.
        container: String,
        /// Details about the failure.
        message: String,
    },

    /// A transient failure talking to a Docker daemon: timeouts, connection refusal, DNS.
    #[error("transient error contacting ship `{ship}`: {message}")]
    Transient {
        /// The ship whose daemon could not be reached.
        ship: String,
        /// Details about the failure.
        message: String,
    },

    /// The command timed out.
    #[error("command timed out after {timeout:?}: {command}")]
    CommandTimeout {
        /// The command that was run.
        command: String,
        /// The configured timeout.
        timeout: Duration,
    },

    /// A `docker` subprocess exited non-zero.
    #[error("command failed (exit {exit_code}): {command}\nstdout: {stdout}\nstderr: {stderr}")]
    CommandFailed {
        /// The command that was run.
        command: String,
        /// Its exit code.
        exit_code: i32,
        /// Captured stdout.
        stdout: String,
        /// Captured stderr.
        stderr: String,
    },

    /// User misuse of an entry point (e.g. `logs` given multiple containers).
    #[error("parameter error: {message}")]
    Parameter {
        /// Details about the misuse.
        message: String,
    },

    /// Wraps an I/O error encountered spawning or communicating with a subprocess.
    #[error("I/O error during {context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Wraps a YAML deserialization error from the configuration loader boundary.
    #[error("failed to parse environment configuration: {source}")]
    Yaml {
        /// The underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Wraps a JSON parse error, typically from `docker inspect`/`docker pull` output.
    #[error("failed to parse {context} as JSON: {source}")]
    Json {
        /// What was being parsed.
        context: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl MaestroError {
    /// Build a [`MaestroError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Build a [`MaestroError::DependencyCycle`].
    pub fn dependency_cycle(names: Vec<String>) -> Self {
        Self::DependencyCycle { names }
    }

    /// Build a [`MaestroError::UnknownDependency`].
    pub fn unknown_dependency(from: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownDependency {
            from: from.into(),
            name: name.into(),
        }
    }

    /// Build a [`MaestroError::Orchestration`].
    pub fn orchestration(container: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Orchestration {
            container: container.into(),
            message: message.into(),
        }
    }

    /// Build a [`MaestroError::Transient`].
    pub fn transient(ship: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            ship: ship.into(),
            message: message.into(),
        }
    }

    /// Build a [`MaestroError::Parameter`].
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter {
            message: message.into(),
        }
    }

    /// Build a [`MaestroError::CommandFailed`].
    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Build a [`MaestroError::CommandTimeout`].
    pub fn command_timeout(command: impl Into<String>, timeout: Duration) -> Self {
        Self::CommandTimeout {
            command: command.into(),
            timeout,
        }
    }

    /// Build a [`MaestroError::Io`].
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Build a [`MaestroError::Json`].
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Returns true if this error is fail-soft-safe, i.e. represents a single
    /// container/ship's failure rather than a systemic configuration problem.
    pub fn is_per_container(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. }
                | Self::Orchestration { .. }
                | Self::CommandFailed { .. }
                | Self::CommandTimeout { .. }
        )
    }
}

impl From<serde_yaml::Error> for MaestroError {
    fn from(source: serde_yaml::Error) -> Self {
        Self::Yaml { source }
    }
}
