//! `docker exec`-based probe, grounded on the health-check command runner.

use super::ProbeContext;

/// A probe that runs a command inside the container and succeeds on exit 0.
#[derive(Debug, Clone)]
pub struct ExecProbe {
    cmd: Vec<String>,
}

impl ExecProbe {
    /// Build a probe from an argv list.
    pub fn new(cmd: Vec<String>) -> Self {
        Self { cmd }
    }

    /// The command this probe runs.
    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }

    /// Run the command via `docker exec`.
    pub async fn test(&self, ctx: &ProbeContext<'_>) -> bool {
        ctx.docker
            .exec(ctx.container_id, &self.cmd, ctx.env)
            .await
            .map(|output| output.success)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_argv() {
        let probe = ExecProbe::new(vec!["true".to_string()]);
        assert_eq!(probe.cmd(), &["true"]);
    }
}
