//! The root aggregate: ships, services, containers, and registries for one
//! orchestration run.

use std::collections::{BTreeMap, BTreeSet};

use super::container::Container;
use super::ids::{ContainerName, ServiceName, ShipName};
use super::registry::RegistryAuth;
use super::ship::Ship;
use super::service::Service;
use crate::error::{MaestroError, Result};

/// The fully constructed environment: every ship, service, and container
/// this process knows about.
#[derive(Debug)]
pub struct Environment {
    /// Environment name, surfaced as `MAESTRO_ENVIRONMENT_NAME`.
    pub name: String,
    /// Configuration schema version (1 or 2).
    pub schema: u32,
    /// Ships, keyed by name.
    pub ships: BTreeMap<ShipName, Ship>,
    /// Services, keyed by name.
    pub services: BTreeMap<ServiceName, Service>,
    /// Registry auth records, keyed by registry name.
    pub registries: BTreeMap<String, RegistryAuth>,
}

impl Environment {
    /// Build an empty environment.
    pub fn new(name: impl Into<String>, schema: u32) -> Self {
        Self {
            name: name.into(),
            schema,
            ships: BTreeMap::new(),
            services: BTreeMap::new(),
            registries: BTreeMap::new(),
        }
    }

    /// Look up a ship by name.
    pub fn ship(&self, name: &str) -> Result<&Ship> {
        self.ships
            .get(name)
            .ok_or_else(|| MaestroError::configuration(format!("unknown ship `{name}`")))
    }

    /// Look up a service by name.
    pub fn service(&self, name: &str) -> Result<&Service> {
        self.services
            .get(name)
            .ok_or_else(|| MaestroError::configuration(format!("unknown service `{name}`")))
    }

    /// Find a container by name across all services.
    pub fn container(&self, name: &str) -> Option<&Container> {
        self.services.values().find_map(|s| s.container(name))
    }

    /// Iterate every container in the environment, service by service.
    pub fn all_containers(&self) -> impl Iterator<Item = &Container> {
        self.services.values().flat_map(Service::containers)
    }

    /// The full transitive closure of `name`'s `requires` set: `name`'s
    /// direct dependencies, their dependencies, and so on. Does not include
    /// `name` itself.
    pub fn transitive_requires(&self, name: &str) -> Result<BTreeSet<ServiceName>> {
        let mut closure = BTreeSet::new();
        let mut pending = vec![self.service(name)?.name.clone()];
        while let Some(current) = pending.pop() {
            let service = self.service(current.as_str())?;
            for dep in &service.requires {
                if closure.insert(dep.clone()) {
                    pending.push(dep.clone());
                }
            }
        }
        Ok(closure)
    }

    /// Validate the cross-container `volumes_from` invariants: every target
    /// must exist, and the claimed-path sets of a source and each of its
    /// sharers must be mutually disjoint.
    pub fn validate_volume_sharing(&self) -> Result<()> {
        for container in self.all_containers() {
            for source_name in &container.volumes_from {
                let source = self.container(source_name.as_str()).ok_or_else(|| {
                    MaestroError::configuration(format!(
                        "container `{}` has volumes_from `{source_name}`, which does not exist",
                        container.name
                    ))
                })?;
                let source_paths: std::collections::BTreeSet<&str> =
                    source.claimed_paths().collect();
                for path in container.claimed_paths() {
                    if source_paths.contains(path) {
                        return Err(MaestroError::configuration(format!(
                            "container `{}` and its volumes_from source `{}` both claim `{path}`",
                            container.name, source_name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ports::PortSpec;
    use crate::model::volumes::{BindMount, Mode};

    fn container(name: &str, volumes: Vec<BindMount>, volumes_from: Vec<ContainerName>) -> Container {
        Container::new(
            ContainerName::new(name),
            ServiceName::new("svc"),
            ShipName::new("ship"),
            vec![],
            BTreeMap::<String, PortSpec>::new(),
            BTreeMap::new(),
            volumes,
            vec![],
            volumes_from,
        )
        .unwrap()
    }

    #[test]
    fn missing_volumes_from_target_is_error() {
        let mut env = Environment::new("e", 2);
        let mut svc = Service::new(ServiceName::new("svc"), "img", 2);
        svc.add_container(container("c1", vec![], vec![ContainerName::new("nope")]))
            .unwrap();
        env.services.insert(svc.name.clone(), svc);
        assert!(env.validate_volume_sharing().is_err());
    }

    #[test]
    fn disjoint_volumes_are_accepted() {
        let mut env = Environment::new("e", 2);
        let mut svc = Service::new(ServiceName::new("svc"), "img", 2);
        svc.add_container(container(
            "source",
            vec![BindMount {
                host_path: "/h".into(),
                container_path: "/a".into(),
                mode: Mode::ReadWrite,
            }],
            vec![],
        ))
        .unwrap();
        svc.add_container(container("sharer", vec![], vec![ContainerName::new("source")]))
            .unwrap();
        env.services.insert(svc.name.clone(), svc);
        assert!(env.validate_volume_sharing().is_ok());
    }

    #[test]
    fn transitive_requires_follows_the_whole_chain() {
        let mut env = Environment::new("e", 2);
        let a = Service::new(ServiceName::new("a"), "img:a", 2);
        let mut b = Service::new(ServiceName::new("b"), "img:b", 2);
        let mut c = Service::new(ServiceName::new("c"), "img:c", 2);
        b.requires.insert(ServiceName::new("a"));
        c.requires.insert(ServiceName::new("b"));
        env.services.insert(a.name.clone(), a);
        env.services.insert(b.name.clone(), b);
        env.services.insert(c.name.clone(), c);

        let closure = env.transitive_requires("c").unwrap();
        assert_eq!(
            closure,
            std::collections::BTreeSet::from([ServiceName::new("a"), ServiceName::new("b")])
        );
    }

    #[test]
    fn overlapping_volumes_from_is_error() {
        let mut env = Environment::new("e", 2);
        let mut svc = Service::new(ServiceName::new("svc"), "img", 2);
        svc.add_container(container(
            "source",
            vec![BindMount {
                host_path: "/h".into(),
                container_path: "/a".into(),
                mode: Mode::ReadWrite,
            }],
            vec![],
        ))
        .unwrap();
        svc.add_container(container(
            "sharer",
            vec![BindMount {
                host_path: "/h2".into(),
                container_path: "/a".into(),
                mode: Mode::ReadWrite,
            }],
            vec![ContainerName::new("source")],
        ))
        .unwrap();
        env.services.insert(svc.name.clone(), svc);
        assert!(env.validate_volume_sharing().is_err());
    }
}
