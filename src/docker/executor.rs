//! Async process executor for running `docker` as a subprocess.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{MaestroError, Result};

/// A running command whose stdout is streamed line by line as it arrives,
/// used for `docker pull`'s progress output.
pub struct StreamingOutput {
    /// One line of stdout per message.
    pub stdout: mpsc::Receiver<String>,
    /// Resolves once the process exits, with the same semantics as
    /// [`ProcessExecutor::execute`].
    pub done: oneshot::Receiver<Result<CommandOutput>>,
}

/// Configuration for one command execution.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Command timeout (`None` for no timeout).
    pub timeout: Option<Duration>,
    /// Extra environment variables, layered on top of the executor's own
    /// (e.g. a per-ship `DOCKER_HOST`).
    pub environment: HashMap<String, String>,
    /// Whether to capture stdout.
    pub capture_stdout: bool,
    /// Whether to capture stderr.
    pub capture_stderr: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            environment: HashMap::new(),
            capture_stdout: true,
            capture_stderr: true,
        }
    }
}

/// Result of running a command to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Process exit code.
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Whether the exit code was zero.
    pub success: bool,
}

impl CommandOutput {
    fn new(exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            success: exit_code == 0,
        }
    }

    /// Combined stdout+stderr, stdout first.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Runs the `docker` binary with a fixed set of base environment variables
/// (typically `DOCKER_HOST` for a specific ship), layering per-call overrides
/// on top.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    docker_path: std::path::PathBuf,
    base_environment: HashMap<String, String>,
    default_config: ExecutionConfig,
}

impl ProcessExecutor {
    /// Build an executor for the given `docker` binary path, with a fixed
    /// base environment (e.g. `DOCKER_HOST`) applied to every command.
    pub fn new(docker_path: std::path::PathBuf, base_environment: HashMap<String, String>) -> Self {
        Self {
            docker_path,
            base_environment,
            default_config: ExecutionConfig::default(),
        }
    }

    /// Override the default per-command timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_config.timeout = Some(timeout);
        self
    }

    /// Run `docker <args>` and return its collected output, failing on a
    /// non-zero exit code.
    pub async fn execute(&self, args: &[String], config: Option<ExecutionConfig>) -> Result<CommandOutput> {
        let config = config.unwrap_or_else(|| self.default_config.clone());
        let command_str = format!("docker {}", args.join(" "));
        debug!(command = %command_str, "running docker command");

        let mut command = Command::new(&self.docker_path);
        command.args(args);
        command.stdin(Stdio::null());
        command.stdout(if config.capture_stdout {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        command.stderr(if config.capture_stderr {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        for (key, value) in &self.base_environment {
            command.env(key, value);
        }
        for (key, value) in &config.environment {
            command.env(key, value);
        }

        let child = command
            .spawn()
            .map_err(|e| MaestroError::io(format!("failed to spawn `{command_str}`"), e))?;

        let output = match config.timeout {
            Some(duration) => match timeout(duration, Self::wait_for_output(child)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(MaestroError::command_timeout(command_str, duration));
                }
            },
            None => Self::wait_for_output(child).await?,
        };

        trace!(exit_code = output.exit_code, "docker command completed");

        if !output.success {
            return Err(MaestroError::command_failed(
                command_str,
                output.exit_code,
                output.stdout.clone(),
                output.stderr.clone(),
            ));
        }

        Ok(output)
    }

    /// Run `docker <args>`, streaming stdout lines as they're produced
    /// instead of buffering them until exit.
    pub async fn execute_streaming(
        &self,
        args: &[String],
        config: Option<ExecutionConfig>,
    ) -> Result<StreamingOutput> {
        let config = config.unwrap_or_else(|| self.default_config.clone());
        let command_str = format!("docker {}", args.join(" "));
        debug!(command = %command_str, "running streaming docker command");

        let mut command = Command::new(&self.docker_path);
        command.args(args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        for (key, value) in &self.base_environment {
            command.env(key, value);
        }
        for (key, value) in &config.environment {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .map_err(|e| MaestroError::io(format!("failed to spawn `{command_str}`"), e))?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let (stdout_tx, stdout_rx) = mpsc::channel(256);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if stdout_tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            let stderr_text = read_all_lines(stderr).await;
            let result = match child.wait().await {
                Ok(status) => {
                    let exit_code = status.code().unwrap_or(-1);
                    let output = CommandOutput::new(exit_code, String::new(), stderr_text.clone());
                    if output.success {
                        Ok(output)
                    } else {
                        Err(MaestroError::command_failed(
                            command_str,
                            exit_code,
                            String::new(),
                            stderr_text,
                        ))
                    }
                }
                Err(e) => Err(MaestroError::io("failed to wait for docker process", e)),
            };
            let _ = done_tx.send(result);
        });

        Ok(StreamingOutput {
            stdout: stdout_rx,
            done: done_rx,
        })
    }

    async fn wait_for_output(mut child: Child) -> Result<CommandOutput> {
        let stdout_handle = child.stdout.take().map(|stdout| {
            tokio::spawn(async move { read_all_lines(stdout).await })
        });
        let stderr_handle = child.stderr.take().map(|stderr| {
            tokio::spawn(async move { read_all_lines(stderr).await })
        });

        let status = child
            .wait()
            .await
            .map_err(|e| MaestroError::io("failed to wait for docker process", e))?;

        let stdout = match stdout_handle {
            Some(h) => h.await.unwrap_or_default(),
            None => String::new(),
        };
        let stderr = match stderr_handle {
            Some(h) => h.await.unwrap_or_default(),
            None => String::new(),
        };

        Ok(CommandOutput::new(status.code().unwrap_or(-1), stdout, stderr))
    }

    /// Locate a `docker` binary on `PATH`, falling back to common
    /// installation locations.
    pub fn find_docker_binary() -> Result<std::path::PathBuf> {
        if let Ok(path) = which::which("docker") {
            return Ok(path);
        }
        for candidate in ["/usr/bin/docker", "/usr/local/bin/docker", "/opt/homebrew/bin/docker"] {
            let path = std::path::PathBuf::from(candidate);
            if path.is_file() {
                return Ok(path);
            }
        }
        Err(MaestroError::configuration(
            "docker binary not found on PATH or in common install locations",
        ))
    }
}

async fn read_all_lines<R: tokio::io::AsyncRead + Unpin>(reader: R) -> String {
    let mut lines = BufReader::new(reader).lines();
    let mut output = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&line);
    }
    output
}
