//! High-level Docker facade: one client per ship, pointed at that ship's
//! daemon via `DOCKER_HOST`.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::executor::{CommandOutput, ExecutionConfig, ProcessExecutor};
use super::progress::{PullEvent, PullProgress};
use crate::error::{MaestroError, Result};

/// Configuration for a [`DockerClient`]: which binary to run and which
/// daemon to talk to.
#[derive(Debug, Clone)]
pub struct DockerClientConfig {
    /// Path to the `docker` binary.
    pub docker_path: std::path::PathBuf,
    /// `tcp://host:port` (or `unix://...`) to target a non-default daemon;
    /// `None` talks to the local daemon.
    pub docker_host: Option<String>,
    /// Default per-command timeout.
    pub default_timeout: Duration,
}

impl Default for DockerClientConfig {
    fn default() -> Self {
        Self {
            docker_path: std::path::PathBuf::from("docker"),
            docker_host: None,
            default_timeout: Duration::from_secs(30),
        }
    }
}

/// A parsed `docker inspect` result, trimmed to what orchestration needs.
#[derive(Debug, Clone)]
pub struct Inspection {
    /// The container's full id.
    pub id: String,
    /// `State.Status`: `created`, `running`, `exited`, `paused`, `restarting`, `dead`.
    pub status: String,
    /// `State.Running`.
    pub running: bool,
    /// `State.ExitCode`, meaningful once the container has exited.
    pub exit_code: Option<i32>,
    /// `NetworkSettings.IPAddress`, if attached to the default bridge.
    pub ip_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInspect {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "State")]
    state: RawState,
    #[serde(rename = "NetworkSettings")]
    network_settings: RawNetworkSettings,
}

#[derive(Debug, Deserialize)]
struct RawState {
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Running")]
    running: bool,
    #[serde(rename = "ExitCode")]
    exit_code: i32,
}

#[derive(Debug, Deserialize)]
struct RawNetworkSettings {
    #[serde(rename = "IPAddress")]
    ip_address: String,
}

/// A client for one Docker daemon, driving the `docker` CLI as a subprocess.
#[derive(Debug, Clone)]
pub struct DockerClient {
    executor: ProcessExecutor,
}

impl DockerClient {
    /// Build a client from the given configuration.
    pub fn new(config: DockerClientConfig) -> Self {
        let mut base_environment = HashMap::new();
        if let Some(host) = &config.docker_host {
            base_environment.insert("DOCKER_HOST".to_string(), host.clone());
        }
        let executor = ProcessExecutor::new(config.docker_path, base_environment)
            .with_default_timeout(config.default_timeout);
        Self { executor }
    }

    /// Run an arbitrary `docker` subcommand and return its output.
    pub async fn execute(&self, args: &[String]) -> Result<CommandOutput> {
        self.executor.execute(args, None).await
    }

    fn exec_config(env: &BTreeMap<String, String>) -> ExecutionConfig {
        ExecutionConfig {
            environment: env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ..ExecutionConfig::default()
        }
    }

    /// `docker inspect <name>`, returning `Ok(None)` if the object doesn't exist.
    pub async fn inspect(&self, name: &str) -> Result<Option<Inspection>> {
        let args = vec!["inspect".to_string(), name.to_string()];
        let output = match self.executor.execute(&args, None).await {
            Ok(output) => output,
            Err(MaestroError::CommandFailed { stderr, .. }) if stderr.contains("No such") => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };
        let mut parsed: Vec<RawInspect> = serde_json::from_str(&output.stdout)
            .map_err(|e| MaestroError::json(format!("parsing inspect output for `{name}`"), e))?;
        let raw = match parsed.pop() {
            Some(raw) => raw,
            None => return Ok(None),
        };
        Ok(Some(Inspection {
            id: raw.id,
            status: raw.state.status,
            running: raw.state.running,
            exit_code: if raw.state.running {
                None
            } else {
                Some(raw.state.exit_code)
            },
            ip_address: (!raw.network_settings.ip_address.is_empty())
                .then_some(raw.network_settings.ip_address),
        }))
    }

    /// List container names currently known to the daemon (running or not).
    pub async fn list_containers(&self) -> Result<Vec<String>> {
        let args = vec![
            "ps".to_string(),
            "-a".to_string(),
            "--format".to_string(),
            "{{.Names}}".to_string(),
        ];
        let output = self.executor.execute(&args, None).await?;
        Ok(output
            .stdout
            .lines()
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .collect())
    }

    /// List `(name, status)` pairs in one round trip, so the `status` play
    /// doesn't need to `inspect` every container individually.
    pub async fn list_statuses(&self) -> Result<Vec<(String, String)>> {
        let args = vec![
            "ps".to_string(),
            "-a".to_string(),
            "--format".to_string(),
            "{{.Names}}\t{{.Status}}".to_string(),
        ];
        let output = self.executor.execute(&args, None).await?;
        Ok(output
            .stdout
            .lines()
            .filter_map(|line| line.split_once('\t'))
            .map(|(name, status)| (name.to_string(), status.to_string()))
            .collect())
    }

    /// `docker login -u <username> -p <password> <registry>`.
    ///
    /// Uses `-p` rather than `--password-stdin`: the executor always runs
    /// subprocesses with stdin closed, so there is no pipe to write the
    /// password into.
    pub async fn login(&self, registry: &str, username: &str, password: &str) -> Result<()> {
        let args = vec![
            "login".to_string(),
            "-u".to_string(),
            username.to_string(),
            "-p".to_string(),
            password.to_string(),
            registry.to_string(),
        ];
        self.executor.execute(&args, None).await?;
        Ok(())
    }

    /// Pull an image, invoking `on_event` for each streamed progress line.
    pub async fn pull(&self, image: &str, mut on_event: impl FnMut(PullEvent)) -> Result<()> {
        let args = vec![
            "pull".to_string(),
            "--quiet=false".to_string(),
            image.to_string(),
        ];
        let mut streaming = self.executor.execute_streaming(&args, None).await?;
        while let Some(line) = streaming.stdout.recv().await {
            if let Ok(progress) = serde_json::from_str::<PullProgress>(&line) {
                on_event(PullEvent::Progress(progress));
            }
        }
        streaming
            .done
            .await
            .map_err(|_| MaestroError::orchestration(image, "pull task panicked"))??;
        on_event(PullEvent::Complete);
        Ok(())
    }

    /// `docker create <args...>`, returning the new container id.
    pub async fn create(&self, args: &[String]) -> Result<String> {
        let mut full = vec!["create".to_string()];
        full.extend_from_slice(args);
        let output = self.executor.execute(&full, None).await?;
        Ok(output.stdout.trim().to_string())
    }

    /// `docker start <name>`.
    pub async fn start(&self, name: &str) -> Result<()> {
        self.executor
            .execute(&["start".to_string(), name.to_string()], None)
            .await?;
        Ok(())
    }

    /// `docker stop -t <timeout_secs> <name>`.
    pub async fn stop(&self, name: &str, timeout: Duration) -> Result<()> {
        self.executor
            .execute(
                &[
                    "stop".to_string(),
                    "-t".to_string(),
                    timeout.as_secs().to_string(),
                    name.to_string(),
                ],
                None,
            )
            .await?;
        Ok(())
    }

    /// `docker kill <name>`.
    pub async fn kill(&self, name: &str) -> Result<()> {
        self.executor
            .execute(&["kill".to_string(), name.to_string()], None)
            .await?;
        Ok(())
    }

    /// `docker rm -f <name>`.
    pub async fn remove(&self, name: &str) -> Result<()> {
        self.executor
            .execute(&["rm".to_string(), "-f".to_string(), name.to_string()], None)
            .await?;
        Ok(())
    }

    /// `docker logs [--tail N] <name>`.
    pub async fn logs(&self, name: &str, tail: Option<u32>) -> Result<String> {
        let mut args = vec!["logs".to_string()];
        if let Some(n) = tail {
            args.push("--tail".to_string());
            args.push(n.to_string());
        }
        args.push(name.to_string());
        let output = self.executor.execute(&args, None).await?;
        Ok(output.combined_output())
    }

    /// `docker logs -f --tail N <name>`, streaming lines as they arrive.
    pub async fn logs_follow(&self, name: &str, tail: Option<u32>) -> Result<super::StreamingOutput> {
        let mut args = vec!["logs".to_string(), "-f".to_string()];
        if let Some(n) = tail {
            args.push("--tail".to_string());
            args.push(n.to_string());
        }
        args.push(name.to_string());
        self.executor.execute_streaming(&args, None).await
    }

    /// `docker exec <name> <cmd...>`, with the given environment layered in.
    pub async fn exec(
        &self,
        name: &str,
        cmd: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<CommandOutput> {
        let mut args = vec!["exec".to_string(), name.to_string()];
        args.extend_from_slice(cmd);
        debug!(container = name, "running exec probe");
        self.executor.execute(&args, Some(Self::exec_config(env))).await
    }
}
