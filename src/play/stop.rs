//! `stop`: graceful stop in reverse dependency order (§4.F). Does not remove
//! the container.

use std::collections::BTreeSet;

use crate::error::{MaestroError, Result};
use crate::model::ContainerStatus;
use crate::planner::{self, Direction, Plan};
use crate::play::PlayContext;
use crate::play_executor::{self, FailureMode, Outcome};

/// Stop every container named in `containers`, in reverse dependency order.
pub async fn run(ctx: &PlayContext<'_>, containers: &BTreeSet<String>) -> std::collections::HashMap<String, Outcome> {
    let plan = match planner::plan(ctx.environment, containers, Direction::Reverse, false, true) {
        Ok(plan) => plan,
        Err(_) => return std::collections::HashMap::new(),
    };
    stop_plan(ctx, &plan).await
}

/// Stop every container in an already-computed reverse-order plan; shared
/// with `restart`'s stop phase.
pub(crate) async fn stop_plan(ctx: &PlayContext<'_>, plan: &Plan) -> std::collections::HashMap<String, Outcome> {
    let in_plan: BTreeSet<String> = plan.order.iter().cloned().collect();
    let mut predecessors = std::collections::HashMap::new();
    for name in &plan.order {
        let preds = planner::predecessors(ctx.environment, Direction::Reverse, name, &in_plan).unwrap_or_default();
        predecessors.insert(name.clone(), preds);
    }

    play_executor::execute(
        plan,
        &predecessors,
        ctx.concurrency,
        FailureMode::FailFast,
        ctx.progress,
        |name| {
            let environment = ctx.environment;
            let docker_path = ctx.docker_path.clone();
            Box::pin(async move { stop_one(environment, &docker_path, &name).await })
        },
    )
    .await
}

async fn stop_one(environment: &crate::model::Environment, docker_path: &std::path::Path, name: &str) -> Result<()> {
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

    docker.stop(name, container.stop_timeout).await?;
    container.set_status(ContainerStatus::Stopped { exit_code: 0 }).await;
    Ok(())
}
