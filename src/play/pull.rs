//! `pull`: fetch each container's service image, logging in first if its
//! registry segment matches a configured credential (§4.F).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use crate::docker::{PullEvent, PullProgress};
use crate::planner::{self, Direction};
use crate::play::PlayContext;
use crate::play_executor::{self, FailureMode, Outcome};

/// Pull the image for every container named in `containers`.
pub async fn run(ctx: &PlayContext<'_>, containers: &BTreeSet<String>) -> std::collections::HashMap<String, Outcome> {
    let plan = match planner::plan(ctx.environment, containers, Direction::Forward, false, true) {
        Ok(plan) => plan,
        Err(_) => return std::collections::HashMap::new(),
    };
    let predecessors = std::collections::HashMap::new();

    play_executor::execute(
        &plan,
        &predecessors,
        ctx.concurrency,
        FailureMode::FailSoft,
        ctx.progress,
        |name| {
            let environment = ctx.environment;
            let docker_path = ctx.docker_path.clone();
            Box::pin(async move { pull_one(environment, &docker_path, &name).await })
        },
    )
    .await
}

async fn pull_one(
    environment: &crate::model::Environment,
    docker_path: &std::path::Path,
    name: &str,
) -> crate::error::Result<()> {
    let container = environment
        .container(name)
        .ok_or_else(|| crate::error::MaestroError::orchestration(name, "container not found in environment"))?;
    let service = environment.service(container.service.as_str())?;
    let ship = environment.ship(container.ship.as_str())?;
    let docker = ship.docker_client(docker_path.to_path_buf());

    let details = service.image_details();
    if let Some(registry_name) = registry_segment(&details.repository) {
        if let Some(auth) = environment.registries.get(registry_name) {
            docker.login(registry_name, &auth.username, &auth.password).await?;
        }
    }

    let progress: Arc<Mutex<BTreeMap<String, f64>>> = Arc::new(Mutex::new(BTreeMap::new()));
    let progress_for_closure = progress.clone();
    docker
        .pull(&service.image, move |event| {
            if let PullEvent::Progress(p) = event {
                let mut layers = progress_for_closure.lock().expect("pull progress mutex poisoned");
                layers.insert(layer_key(&p), layer_percent(&p));
            }
        })
        .await?;

    Ok(())
}

fn layer_key(p: &PullProgress) -> String {
    p.id.clone().unwrap_or_else(|| p.status.clone())
}

fn layer_percent(p: &PullProgress) -> f64 {
    if p.status == "Download complete" || p.status == "Pull complete" {
        return 100.0;
    }
    match &p.progress_detail {
        Some(detail) => match (detail.current, detail.total) {
            (Some(current), Some(total)) if total > 0 => (current as f64 / total as f64) * 100.0,
            _ => 0.0,
        },
        None => 0.0,
    }
}

/// The registry segment of a repository, when it looks like `host[:port]/...`
/// rather than a bare Docker Hub repository name.
fn registry_segment(repository: &str) -> Option<&str> {
    let (first, rest) = repository.split_once('/')?;
    if first.contains('.') || first.contains(':') || first == "localhost" {
        Some(first)
    } else {
        None
    }
}
