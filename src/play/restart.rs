//! `restart`: stop (reverse order) then start (forward order), optionally
//! skipping containers whose image hasn't changed and reusing the existing
//! container instead of recreating it (§4.F).

use std::collections::BTreeSet;
use std::time::Duration;

use crate::docker::DockerClient;
use crate::error::{MaestroError, Result};
use crate::model::ContainerStatus;
use crate::planner::{self, Direction};
use crate::play::stop::stop_plan;
use crate::play::PlayContext;
use crate::play_executor::{self, FailureMode, Outcome};
use crate::probe::{LifecycleState, ProbeContext};

/// Options tuning `restart`'s behavior.
#[derive(Debug, Clone, Copy)]
pub struct RestartOptions {
    /// Skip restarting a container whose running image id already matches
    /// the latest local image id for its tag.
    pub only_if_changed: bool,
    /// Re-use the existing container (skip remove+create) instead of
    /// recreating it from scratch.
    pub reuse: bool,
    /// Pull the image before starting, even if present locally.
    pub refresh_images: bool,
    /// Delay between a container's stop completing and its start beginning.
    pub stop_start_delay: Duration,
    /// Delay between successive containers within a phase.
    pub step_delay: Duration,
}

impl Default for RestartOptions {
    fn default() -> Self {
        Self {
            only_if_changed: false,
            reuse: false,
            refresh_images: false,
            stop_start_delay: Duration::ZERO,
            step_delay: Duration::ZERO,
        }
    }
}

/// Restart every container named in `containers`.
pub async fn run(
    ctx: &PlayContext<'_>,
    containers: &BTreeSet<String>,
    options: RestartOptions,
) -> std::collections::HashMap<String, Outcome> {
    let to_restart = match filter_changed(ctx, containers, options.only_if_changed).await {
        Ok(set) => set,
        Err(_) => return std::collections::HashMap::new(),
    };
    if to_restart.is_empty() {
        return std::collections::HashMap::new();
    }

    let reverse_plan = match planner::plan(ctx.environment, &to_restart, Direction::Reverse, false, true) {
        Ok(plan) => plan,
        Err(_) => return std::collections::HashMap::new(),
    };
    let stop_outcomes = stop_plan(ctx, &reverse_plan).await;

    if options.stop_start_delay > Duration::ZERO {
        tokio::time::sleep(options.stop_start_delay).await;
    }

    let forward_plan = match planner::plan(ctx.environment, &to_restart, Direction::Forward, false, true) {
        Ok(plan) => plan,
        Err(_) => return stop_outcomes,
    };
    let in_plan: BTreeSet<String> = forward_plan.order.iter().cloned().collect();
    let mut predecessors = std::collections::HashMap::new();
    for name in &forward_plan.order {
        let preds =
            planner::predecessors(ctx.environment, Direction::Forward, name, &in_plan).unwrap_or_default();
        predecessors.insert(name.clone(), preds);
    }

    let start_outcomes = play_executor::execute(
        &forward_plan,
        &predecessors,
        ctx.concurrency,
        FailureMode::FailFast,
        ctx.progress,
        |name| {
            let environment = ctx.environment;
            let docker_path = ctx.docker_path.clone();
            let step_delay = options.step_delay;
            let reuse = options.reuse;
            let refresh_images = options.refresh_images;
            Box::pin(async move {
                let result = start_one_reused(environment, &docker_path, &name, reuse, refresh_images).await;
                if step_delay > Duration::ZERO {
                    tokio::time::sleep(step_delay).await;
                }
                result
            })
        },
    )
    .await;

    let mut merged = stop_outcomes;
    merged.extend(start_outcomes);
    merged
}

async fn filter_changed(
    ctx: &PlayContext<'_>,
    containers: &BTreeSet<String>,
    only_if_changed: bool,
) -> Result<BTreeSet<String>> {
    if !only_if_changed {
        return Ok(containers.clone());
    }
    let mut result = BTreeSet::new();
    for name in containers {
        let container = ctx
            .environment
            .container(name)
            .ok_or_else(|| MaestroError::orchestration(name, "container not found in environment"))?;
        let ship = ctx.environment.ship(container.ship.as_str())?;
        let docker = ship.docker_client(ctx.docker_path.clone());
        let service = ctx.environment.service(container.service.as_str())?;

        let running_image_id = match docker.inspect(name).await? {
            Some(i) if i.running => running_image_id(&docker, name).await.ok(),
            _ => None,
        };
        let latest_image_id = local_image_id(&docker, &service.image).await.ok();

        match (running_image_id, latest_image_id) {
            (Some(running), Some(latest)) if running == latest => {}
            _ => {
                result.insert(name.clone());
            }
        }
    }
    Ok(result)
}

async fn running_image_id(docker: &DockerClient, name: &str) -> Result<String> {
    let args = vec![
        "inspect".to_string(),
        "--format".to_string(),
        "{{.Image}}".to_string(),
        name.to_string(),
    ];
    Ok(docker.execute(&args).await?.stdout.trim().to_string())
}

async fn local_image_id(docker: &DockerClient, image: &str) -> Result<String> {
    let args = vec![
        "image".to_string(),
        "inspect".to_string(),
        "--format".to_string(),
        "{{.Id}}".to_string(),
        image.to_string(),
    ];
    Ok(docker.execute(&args).await?.stdout.trim().to_string())
}

async fn start_one_reused(
    environment: &crate::model::Environment,
    docker_path: &std::path::Path,
    name: &str,
    reuse: bool,
    refresh_images: bool,
) -> Result<()> {
    let container = environment
        .container(name)
        .ok_or_else(|| MaestroError::orchestration(name, "container not found in environment"))?;
    let ship = environment.ship(container.ship.as_str())?;
    let docker = ship.docker_client(docker_path.to_path_buf());
    let service = environment.service(container.service.as_str())?;

    let exists = docker.inspect(name).await?.is_some();
    if exists && !reuse {
        docker.remove(name).await?;
    }

    if !exists || !reuse {
        if refresh_images {
            docker.pull(&service.image, |_| {}).await?;
        }
        let create_args = super::start::build_create_args_for_restart(container, ship, &service.image);
        docker.create(&create_args).await?;
    }

    docker.start(name).await?;

    let inspection = docker
        .inspect(name)
        .await?
        .ok_or_else(|| MaestroError::orchestration(name, "container vanished immediately after start"))?;

    let probes = container.probes_for(LifecycleState::Running);
    if !probes.is_empty() {
        let probe_ctx = ProbeContext {
            host: ship.control_address(),
            container_id: &inspection.id,
            env: &container.env,
            docker: &docker,
        };
        for probe in probes {
            if !probe
                .test_with_retries(&probe_ctx, 60, crate::probe::DEFAULT_RETRY_DELAY)
                .await
            {
                return Err(MaestroError::orchestration(name, "readiness probe failed after restart"));
            }
        }
    }

    container
        .set_status(ContainerStatus::Running { id: inspection.id })
        .await;
    Ok(())
}
