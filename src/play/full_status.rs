//! `full_status`: per-container inspect plus `running`-state probes (§4.F).

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::model::ContainerStatus;
use crate::planner::{self, Direction, Plan};
use crate::play::{PlayContext, ReportLine};
use crate::play_executor::{self, FailureMode};
use crate::probe::{LifecycleState, ProbeContext};

/// Inspect and probe every container named in `containers`, up to
/// `ctx.concurrency` at a time.
pub async fn run(ctx: &PlayContext<'_>, containers: &BTreeSet<String>) -> Vec<ReportLine> {
    let plan = match planner::plan(ctx.environment, containers, Direction::Forward, false, true) {
        Ok(plan) => plan,
        Err(_) => return Vec::new(),
    };
    let predecessors = std::collections::HashMap::new();
    let lines = Arc::new(Mutex::new(Vec::new()));

    play_executor::execute(
        &plan,
        &predecessors,
        ctx.concurrency,
        FailureMode::FailSoft,
        ctx.progress,
        |name| {
            let environment = ctx.environment;
            let docker_path = ctx.docker_path.clone();
            let lines = lines.clone();
            Box::pin(async move {
                let line = check_one(environment, &docker_path, &name).await;
                lines.lock().expect("full_status report mutex poisoned").push(line);
                Ok(())
            })
        },
    )
    .await;

    let mut lines = Arc::try_unwrap(lines).map(Mutex::into_inner).unwrap().unwrap();
    lines.sort_by(|a, b| key(a).cmp(key(b)));
    lines
}

fn key(line: &ReportLine) -> &str {
    match line {
        ReportLine::UpDown { container, .. } => container,
        ReportLine::Note { container, .. } => container,
    }
}

async fn check_one(environment: &crate::model::Environment, docker_path: &std::path::Path, name: &str) -> ReportLine {
    let container = match environment.container(name) {
        Some(c) => c,
        None => {
            return ReportLine::Note {
                container: name.to_string(),
                text: "unknown container".to_string(),
            }
        }
    };
    let ship = match environment.ship(container.ship.as_str()) {
        Ok(s) => s,
        Err(_) => {
            return ReportLine::Note {
                container: name.to_string(),
                text: "host down".to_string(),
            }
        }
    };
    let docker = ship.docker_client(docker_path.to_path_buf());

    let inspection = match docker.inspect(name).await {
        Ok(Some(i)) => i,
        Ok(None) => {
            container.set_status(ContainerStatus::Absent).await;
            return ReportLine::UpDown {
                container: name.to_string(),
                state: "down",
                short_id: None,
            };
        }
        Err(_) => {
            return ReportLine::Note {
                container: name.to_string(),
                text: "host down".to_string(),
            }
        }
    };

    if !inspection.running {
        container
            .set_status(ContainerStatus::Stopped {
                exit_code: inspection.exit_code.unwrap_or(-1),
            })
            .await;
        return ReportLine::UpDown {
            container: name.to_string(),
            state: "down",
            short_id: None,
        };
    }

    container
        .set_status(ContainerStatus::Running {
            id: inspection.id.clone(),
        })
        .await;

    let probes = container.probes_for(LifecycleState::Running);
    let ready = if probes.is_empty() {
        true
    } else {
        let probe_ctx = ProbeContext {
            host: ship.control_address(),
            container_id: &inspection.id,
            env: &container.env,
            docker: &docker,
        };
        let mut all_pass = true;
        for probe in probes {
            if !probe.test(&probe_ctx).await {
                all_pass = false;
                break;
            }
        }
        all_pass
    };

    ReportLine::UpDown {
        container: name.to_string(),
        state: if ready { "up" } else { "down" },
        short_id: Some(inspection.id.chars().take(7).collect()),
    }
}
