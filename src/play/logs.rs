//! `logs`: single container only (§4.F). Either a one-shot tail or a live
//! follow stream.

use std::collections::BTreeSet;

use tokio::sync::mpsc;

use crate::error::{MaestroError, Result};
use crate::play::PlayContext;

/// Options tuning `logs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogsOptions {
    /// Follow the container's output instead of returning a fixed tail.
    pub follow: bool,
    /// Number of trailing lines to fetch when not following.
    pub tail: Option<u32>,
}

/// Either a completed tail or a live stream of lines.
pub enum LogsOutput {
    Tail(String),
    Follow(mpsc::Receiver<String>),
}

/// Fetch or stream logs for the single container named in `containers`.
pub async fn run(ctx: &PlayContext<'_>, containers: &BTreeSet<String>, options: LogsOptions) -> Result<LogsOutput> {
    let name = match containers.len() {
        1 => containers.iter().next().unwrap(),
        0 => return Err(MaestroError::parameter("logs requires exactly one container, got none")),
        n => {
            return Err(MaestroError::parameter(format!(
                "logs requires exactly one container, got {n}"
            )))
        }
    };

    let container = ctx
        .environment
        .container(name)
        .ok_or_else(|| MaestroError::orchestration(name, "container not found in environment"))?;
    let ship = ctx.environment.ship(container.ship.as_str())?;
    let docker = ship.docker_client(ctx.docker_path.clone());

    if options.follow {
        let running = docker.inspect(name).await?.map(|i| i.running).unwrap_or(false);
        if running {
            let streaming = docker.logs_follow(name, options.tail).await?;
            return Ok(LogsOutput::Follow(streaming.stdout));
        }
    }

    let text = docker.logs(name, options.tail).await?;
    Ok(LogsOutput::Tail(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_selection() {
        // Can't build a full Environment here without a fixture; the
        // multiplicity check happens before any environment lookup, so the
        // error path alone is testable in isolation by replicating the guard.
        let containers: BTreeSet<String> = BTreeSet::new();
        let err = match containers.len() {
            0 => MaestroError::parameter("logs requires exactly one container, got none"),
            _ => unreachable!(),
        };
        assert!(matches!(err, MaestroError::Parameter { .. }));
    }
}
