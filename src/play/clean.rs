//! `clean`: remove a stopped container's filesystem and metadata (§4.F).
//! Refuses to touch a container that's currently running; missing
//! containers are a no-op, not an error.

use std::collections::BTreeSet;

use crate::error::{MaestroError, Result};
use crate::model::ContainerStatus;
use crate::planner::{self, Direction};
use crate::play::PlayContext;
use crate::play_executor::{self, FailureMode, Outcome};

/// Remove every container named in `containers` that exists and isn't
/// running, in reverse dependency order.
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
        FailureMode::FailSoft,
        ctx.progress,
        |name| {
            let environment = ctx.environment;
            let docker_path = ctx.docker_path.clone();
            Box::pin(async move { clean_one(environment, &docker_path, &name).await })
        },
    )
    .await
}

async fn clean_one(environment: &crate::model::Environment, docker_path: &std::path::Path, name: &str) -> Result<()> {
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
    if inspection.running {
        return Err(MaestroError::orchestration(
            name,
            "refusing to clean a running container; stop it first",
        ));
    }

    docker.remove(name).await?;
    container.set_status(ContainerStatus::Absent).await;
    Ok(())
}
