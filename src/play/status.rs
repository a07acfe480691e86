//! `status`: a fast, ship-grouped up/down report (§4.F).
//!
//! Unlike the other plays this one does not go through the executor — it
//! lists each ship's containers once and classifies every requested
//! container against that single listing, so an environment with many
//! containers on few ships costs one `docker ps` per ship rather than one
//! `inspect` per container.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::play::{PlayContext, ReportLine};

/// Report status for every container named in `containers`, grouped by ship.
pub async fn run(ctx: &PlayContext<'_>, containers: &BTreeSet<String>) -> Vec<ReportLine> {
    let mut by_ship: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for name in containers {
        if let Some(container) = ctx.environment.container(name) {
            by_ship
                .entry(container.ship.to_string())
                .or_default()
                .push(name.clone());
        }
    }

    let mut lines = Vec::new();
    for (ship_name, names) in by_ship {
        match list_ship_statuses(ctx, &ship_name).await {
            Ok(listing) => {
                for name in names {
                    lines.push(classify(&name, &listing));
                }
            }
            Err(_) => {
                for name in names {
                    lines.push(ReportLine::Note {
                        container: name,
                        text: "host down".to_string(),
                    });
                }
            }
        }
    }
    lines.sort_by(line_key);
    lines
}

fn line_key(line: &ReportLine) -> String {
    match line {
        ReportLine::UpDown { container, .. } => container.clone(),
        ReportLine::Note { container, .. } => container.clone(),
    }
}

async fn list_ship_statuses(ctx: &PlayContext<'_>, ship_name: &str) -> Result<BTreeMap<String, String>> {
    let ship = ctx.environment.ship(ship_name)?;
    let docker = ship.docker_client(ctx.docker_path.clone());
    Ok(docker.list_statuses().await?.into_iter().collect())
}

fn classify(name: &str, listing: &BTreeMap<String, String>) -> ReportLine {
    match listing.get(name) {
        Some(status) if status.starts_with("Up") => ReportLine::UpDown {
            container: name.to_string(),
            state: "up",
            short_id: None,
        },
        _ => ReportLine::UpDown {
            container: name.to_string(),
            state: "down",
            short_id: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_up_status() {
        let mut listing = BTreeMap::new();
        listing.insert("c1".to_string(), "Up 3 minutes".to_string());
        let line = classify("c1", &listing);
        assert!(matches!(line, ReportLine::UpDown { state: "up", .. }));
    }

    #[test]
    fn classify_missing_is_down() {
        let listing = BTreeMap::new();
        let line = classify("c1", &listing);
        assert!(matches!(line, ReportLine::UpDown { state: "down", .. }));
    }

    #[test]
    fn classify_exited_is_down() {
        let mut listing = BTreeMap::new();
        listing.insert("c1".to_string(), "Exited (0) 2 hours ago".to_string());
        let line = classify("c1", &listing);
        assert!(matches!(line, ReportLine::UpDown { state: "down", .. }));
    }
}
