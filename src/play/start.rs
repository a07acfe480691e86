//! `start`: create (if needed), start, and wait for readiness, in forward
//! dependency order (§4.F).

use std::collections::BTreeSet;
use std::time::Duration;

use crate::docker::DockerClient;
use crate::error::{MaestroError, Result};
use crate::model::{Container, ContainerStatus, Ship};
use crate::planner::{self, Direction, Plan};
use crate::play::PlayContext;
use crate::play_executor::{self, FailureMode, Outcome};
use crate::probe::{LifecycleState, ProbeContext};

const RUNNING_POLL_INTERVAL: Duration = Duration::from_millis(500);
const RUNNING_POLL_RETRIES: u32 = 10;
const PROBE_MAX_ATTEMPTS: u32 = 60;

/// Options that tune how aggressively `start` refreshes images.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Pull the image even if a local copy with the requested tag exists.
    pub refresh_images: bool,
}

/// Start every container named in `containers`, widened and ordered by
/// forward dependency edges already baked into `plan`.
pub async fn run(
    ctx: &PlayContext<'_>,
    plan: &Plan,
    options: StartOptions,
) -> std::collections::HashMap<String, Outcome> {
    let in_plan: BTreeSet<String> = plan.order.iter().cloned().collect();
    let mut predecessors = std::collections::HashMap::new();
    for name in &plan.order {
        let preds = planner::predecessors(ctx.environment, Direction::Forward, name, &in_plan)
            .unwrap_or_default();
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
            let options = options;
            Box::pin(async move { start_one(environment, &docker_path, &name, options).await })
        },
    )
    .await
}

async fn start_one(
    environment: &crate::model::Environment,
    docker_path: &std::path::Path,
    name: &str,
    options: StartOptions,
) -> Result<()> {
    let container = environment
        .container(name)
        .ok_or_else(|| MaestroError::orchestration(name, "container not found in environment"))?;
    let ship = environment.ship(container.ship.as_str())?;
    let docker = ship.docker_client(docker_path.to_path_buf());

    if let Some(id) = already_ready(&docker, ship, container).await? {
        container.set_status(ContainerStatus::Running { id }).await;
        return Ok(());
    }

    if docker.inspect(name).await?.is_some() {
        docker.remove(name).await?;
    }

    let service = environment.service(container.service.as_str())?;
    let needs_pull = options.refresh_images || !has_local_image(&docker, &service.image).await?;
    if needs_pull {
        docker.pull(&service.image, |_event| {}).await?;
    }

    let create_args = build_create_args(container, ship, &service.image);
    let id = docker.create(&create_args).await?;
    docker.start(name).await?;

    wait_for_running(&docker, name).await?;

    let probes = container.probes_for(LifecycleState::Running);
    if !probes.is_empty() {
        let probe_ctx = ProbeContext {
            host: ship.control_address(),
            container_id: &id,
            env: &container.env,
            docker: &docker,
        };
        for probe in probes {
            if !probe
                .test_with_retries(&probe_ctx, PROBE_MAX_ATTEMPTS, crate::probe::DEFAULT_RETRY_DELAY)
                .await
            {
                return Err(MaestroError::orchestration(
                    name,
                    "readiness probe did not pass within the allotted attempts",
                ));
            }
        }
    }

    container.set_status(ContainerStatus::Running { id }).await;
    Ok(())
}

/// `Some(id)` if the container is already running and every `running`-state
/// probe currently passes, in which case `start` is a no-op.
async fn already_ready(docker: &DockerClient, ship: &Ship, container: &Container) -> Result<Option<String>> {
    let inspection = match docker.inspect(container.name.as_str()).await? {
        Some(i) if i.running => i,
        _ => return Ok(None),
    };

    let probes = container.probes_for(LifecycleState::Running);
    if probes.is_empty() {
        return Ok(Some(inspection.id));
    }
    let probe_ctx = ProbeContext {
        host: ship.control_address(),
        container_id: &inspection.id,
        env: &container.env,
        docker,
    };
    for probe in probes {
        if !probe.test(&probe_ctx).await {
            return Ok(None);
        }
    }
    Ok(Some(inspection.id))
}

async fn has_local_image(docker: &DockerClient, image: &str) -> Result<bool> {
    let args = vec!["image".to_string(), "inspect".to_string(), image.to_string()];
    match docker.execute(&args).await {
        Ok(_) => Ok(true),
        Err(MaestroError::CommandFailed { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

async fn wait_for_running(docker: &DockerClient, name: &str) -> Result<()> {
    for attempt in 0..RUNNING_POLL_RETRIES {
        if let Some(inspection) = docker.inspect(name).await? {
            if inspection.running {
                return Ok(());
            }
        }
        if attempt + 1 < RUNNING_POLL_RETRIES {
            tokio::time::sleep(RUNNING_POLL_INTERVAL).await;
        }
    }
    Err(MaestroError::orchestration(
        name,
        "container did not reach the running state in time",
    ))
}

/// Exposed for `restart`'s reuse-aware start phase, which builds the same
/// argument vector but decides separately whether to call `create` at all.
pub(crate) fn build_create_args_for_restart(container: &Container, ship: &Ship, image: &str) -> Vec<String> {
    build_create_args(container, ship, image)
}

fn build_create_args(container: &Container, ship: &Ship, image: &str) -> Vec<String> {
    let mut args = vec![
        "--name".to_string(),
        container.name.to_string(),
        "--hostname".to_string(),
        container.name.to_string(),
    ];

    for (key, value) in &container.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }

    let bind_host = ship.bind_host();
    for port in container.ports.values() {
        args.push("-p".to_string());
        args.push(format!(
            "{}:{}:{}",
            bind_host, port.external.port, port.exposed.port
        ));
    }

    for mount in &container.volumes {
        let mode = match mount.mode {
            crate::model::volumes::Mode::ReadOnly => ":ro",
            crate::model::volumes::Mode::ReadWrite => "",
        };
        args.push("-v".to_string());
        args.push(format!("{}:{}{}", mount.host_path, mount.container_path, mode));
    }
    for path in &container.container_volumes {
        args.push("-v".to_string());
        args.push(path.clone());
    }
    for source in &container.volumes_from {
        args.push("--volumes-from".to_string());
        args.push(source.to_string());
    }

    args.push("--restart".to_string());
    args.push(container.restart_policy.to_string());

    if let Some(shares) = container.cpu_shares {
        args.push("--cpu-shares".to_string());
        args.push(shares.to_string());
    }
    if let Some(mem) = container.mem_limit {
        args.push("-m".to_string());
        args.push(mem.to_string());
    }
    if let Some(memswap) = container.memswap_limit {
        args.push("--memory-swap".to_string());
        args.push(memswap.to_string());
    }
    if container.privileged {
        args.push("--privileged".to_string());
    }
    for dns in &container.dns {
        args.push("--dns".to_string());
        args.push(dns.clone());
    }
    if let Some(workdir) = &container.workdir {
        args.push("-w".to_string());
        args.push(workdir.clone());
    }
    args.push("--stop-timeout".to_string());
    args.push(container.stop_timeout.as_secs().to_string());

    args.push(image.to_string());
    args.extend(container.cmd.iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerName, ServiceName, ShipName};
    use std::collections::BTreeMap;

    fn container() -> Container {
        Container::new(
            ContainerName::new("c1"),
            ServiceName::new("svc"),
            ShipName::new("s1"),
            vec!["redis-server".to_string()],
            BTreeMap::new(),
            BTreeMap::from([("FOO".to_string(), "bar".to_string())]),
            vec![],
            vec![],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn create_args_include_name_env_and_command() {
        let c = container();
        let ship = Ship::new(ShipName::new("s1"), "10.0.0.1").unwrap();
        let args = build_create_args(&c, &ship, "redis:7");
        assert!(args.contains(&"--name".to_string()));
        assert!(args.contains(&"FOO=bar".to_string()));
        assert_eq!(args.last(), Some(&"redis-server".to_string()));
    }
}
