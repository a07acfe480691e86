//! `kill`: like `stop`, but sends `SIGKILL` immediately instead of waiting
//! out the container's grace period (§4.F).

use std::collections::BTreeSet;

use crate::error::{MaestroError, Result};
use crate::model::ContainerStatus;
use crate::planner::{self, Direction};
use crate::play::PlayContext;
use crate::play_executor::{self, FailureMode, Outcome};

/// Kill every container named in `containers`, in reverse dependency order.
pub async fn run(ctx: &PlayContext<'_>, containers: &BTreeSet<String>) -> std::collections::HashMap<String, Outcome> {
    let plan = match planner::plan(ctx.environment, containers, Direction::Reverse, false, true) {
        Ok(plan) => plan,
        Err(_) => return std::collections::HashMap::new(),
    };
    let in_plan: BTreeSet<String> = plan.order.iter().cloned().collect();
    let mut predecessors = std::collections::HashMap::new();
    for name in &plan.order {
        let preds = planner::predecessors(ctx.environment, Direction::Reverse, name, &in_plan).unwrap_or_default();
        predecessors.insert(name.clone(), preds);
    }

    play_executor::execute(
        &plan,
        &predecessors,
        ctx.concurrency,
        FailureMode::FailFast,
        ctx.progress,
        |name| {
            let environment = ctx.environment;
            let docker_path = ctx.docker_path.clone();
            Box::pin(async move { kill_one(environment, &docker_path, &name).await })
        },
    )
    .await
}

async fn kill_one(environment: &crate::model::Environment, docker_path: &std::path::Path, name: &str) -> Result<()> {
    let container = environment
        .container(name)
        .ok_or_else(|| MaestroError::orchestration(name, "container not found in environment"))?;
    let ship = environment.ship(container.ship.as_str())?;
    let docker = ship.docker_client(docker_path.to_path_buf());

    let inspection = match docker.inspect(name).await? {
        Some(i) => i,
        None => {
            container.set_status(ContainerStatus::Absent).await;
            return Ok(());
        }
    };
    if !inspection.running {
        container
            .set_status(ContainerStatus::Stopped {
                exit_code: inspection.exit_code.unwrap_or(-1),
            })
            .await;
        return Ok(());
    }

    docker.kill(name).await?;
    container.set_status(ContainerStatus::Stopped { exit_code: 0 }).await;
    Ok(())
}
