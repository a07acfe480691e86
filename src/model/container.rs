//! Containers: a concrete instance of a service placed on a ship.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::RwLock;

use super::ids::{ContainerName, ServiceName, ShipName};
use super::ports::PortSpec;
use super::restart::RestartPolicy;
use super::volumes::BindMount;
use crate::error::{MaestroError, Result};
use crate::probe::{LifecycleState, Probe};

/// The last status this orchestrator observed for a container, cached until
/// the owning task refreshes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    /// No container by this name exists on the ship.
    Absent,
    /// A container exists but isn't running.
    Stopped {
        /// Its last exit code.
        exit_code: i32,
    },
    /// A container is running.
    Running {
        /// Its id, for display as `id[:7]`.
        id: String,
    },
}

impl ContainerStatus {
    /// Short display form used by the `status` play: `"up"`/`"down"`.
    pub fn up_down(&self) -> &'static str {
        match self {
            ContainerStatus::Running { .. } => "up",
            _ => "down",
        }
    }

    /// The first 7 characters of the container id, if running.
    pub fn short_id(&self) -> Option<&str> {
        match self {
            ContainerStatus::Running { id } => Some(&id[..id.len().min(7)]),
            _ => None,
        }
    }

    /// Whether the container is currently running.
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running { .. })
    }
}

/// A concrete Docker container instance.
#[derive(Debug)]
pub struct Container {
    /// Unique name, across the whole environment.
    pub name: ContainerName,
    /// The service this container belongs to.
    pub service: ServiceName,
    /// The ship this container is placed on.
    pub ship: ShipName,
    /// Command to run (empty uses the image's default).
    pub cmd: Vec<String>,
    /// Named port mappings.
    pub ports: BTreeMap<String, PortSpec>,
    /// Fully resolved environment (service base env overlaid with
    /// container-specific env, plus synthesized vars and link vars).
    pub env: BTreeMap<String, String>,
    /// Bind mounts.
    pub volumes: Vec<BindMount>,
    /// Container-only volume paths (no host bind).
    pub container_volumes: Vec<String>,
    /// Other containers on the same ship whose volumes this one inherits.
    pub volumes_from: Vec<ContainerName>,
    /// Working directory inside the container.
    pub workdir: Option<String>,
    /// Whether the container runs privileged.
    pub privileged: bool,
    /// Extra DNS servers.
    pub dns: Vec<String>,
    /// Grace period given to `docker stop`.
    pub stop_timeout: Duration,
    /// CPU shares (relative weight).
    pub cpu_shares: Option<u64>,
    /// Memory limit in bytes.
    pub mem_limit: Option<u64>,
    /// Memory+swap limit in bytes.
    pub memswap_limit: Option<u64>,
    /// Restart policy.
    pub restart_policy: RestartPolicy,
    /// Readiness probes, keyed by the lifecycle state they apply to.
    pub lifecycle: BTreeMap<LifecycleState, Vec<Probe>>,
    status: RwLock<ContainerStatus>,
}

impl Container {
    /// Build a container, validating the bind-mount/container-volume
    /// disjointness invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: ContainerName,
        service: ServiceName,
        ship: ShipName,
        cmd: Vec<String>,
        ports: BTreeMap<String, PortSpec>,
        env: BTreeMap<String, String>,
        volumes: Vec<BindMount>,
        container_volumes: Vec<String>,
        volumes_from: Vec<ContainerName>,
    ) -> Result<Self> {
        let mut seen = std::collections::BTreeSet::new();
        for mount in &volumes {
            if !seen.insert(mount.container_path.as_str()) {
                return Err(MaestroError::configuration(format!(
                    "container `{name}` binds `{}` more than once",
                    mount.container_path
                )));
            }
        }
        for path in &container_volumes {
            if !seen.insert(path.as_str()) {
                return Err(MaestroError::configuration(format!(
                    "container `{name}` declares `{path}` as both a bind mount and a container volume"
                )));
            }
        }

        Ok(Self {
            name,
            service,
            ship,
            cmd,
            ports,
            env,
            volumes,
            container_volumes,
            volumes_from,
            workdir: None,
            privileged: false,
            dns: Vec::new(),
            stop_timeout: Duration::from_secs(10),
            cpu_shares: None,
            mem_limit: None,
            memswap_limit: None,
            restart_policy: RestartPolicy::default(),
            lifecycle: BTreeMap::new(),
            status: RwLock::new(ContainerStatus::Absent),
        })
    }

    /// All local paths this container claims inside the container
    /// filesystem: bind-mount destinations plus container-only volumes.
    pub fn claimed_paths(&self) -> impl Iterator<Item = &str> {
        self.volumes
            .iter()
            .map(|m| m.container_path.as_str())
            .chain(self.container_volumes.iter().map(String::as_str))
    }

    /// Read the cached status.
    pub async fn status(&self) -> ContainerStatus {
        self.status.read().await.clone()
    }

    /// Overwrite the cached status; called only by this container's own
    /// in-flight task.
    pub async fn set_status(&self, status: ContainerStatus) {
        *self.status.write().await = status;
    }

    /// Readiness probes for the given lifecycle state, in declared order.
    pub fn probes_for(&self, state: LifecycleState) -> &[Probe] {
        self.lifecycle
            .get(&state)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Container {}

impl PartialOrd for Container {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Container {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ContainerName {
        ContainerName::new(s)
    }

    #[test]
    fn rejects_overlapping_bind_and_container_volume() {
        let result = Container::new(
            name("c1"),
            ServiceName::new("svc"),
            ShipName::new("ship"),
            vec![],
            BTreeMap::new(),
            BTreeMap::new(),
            vec![BindMount {
                host_path: "/host".into(),
                container_path: "/data".into(),
                mode: super::super::volumes::Mode::ReadWrite,
            }],
            vec!["/data".into()],
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn orders_by_name() {
        let a = Container::new(
            name("a"),
            ServiceName::new("svc"),
            ShipName::new("ship"),
            vec![],
            BTreeMap::new(),
            BTreeMap::new(),
            vec![],
            vec![],
            vec![],
        )
        .unwrap();
        let b = Container::new(
            name("b"),
            ServiceName::new("svc"),
            ShipName::new("ship"),
            vec![],
            BTreeMap::new(),
            BTreeMap::new(),
            vec![],
            vec![],
            vec![],
        )
        .unwrap();
        assert!(a < b);
    }

    #[tokio::test]
    async fn status_round_trips() {
        let c = Container::new(
            name("a"),
            ServiceName::new("svc"),
            ShipName::new("ship"),
            vec![],
            BTreeMap::new(),
            BTreeMap::new(),
            vec![],
            vec![],
            vec![],
        )
        .unwrap();
        assert_eq!(c.status().await, ContainerStatus::Absent);
        c.set_status(ContainerStatus::Running { id: "abcdef0123".into() })
            .await;
        assert_eq!(c.status().await.up_down(), "up");
        assert_eq!(c.status().await.short_id(), Some("abcdef0"));
    }
}
