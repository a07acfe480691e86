//! Dependency-aware planning: transitive closure and topological ordering
//! over the service dependency graph, applied to a set of containers.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{MaestroError, Result};
use crate::model::{Environment, ServiceName};

/// Which edge direction to follow when gathering or ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow `requires`: a container's predecessors are its dependencies.
    Forward,
    /// Follow `needed_for`: a container's predecessors are its dependents.
    Reverse,
}

fn edges<'a>(environment: &'a Environment, direction: Direction, service: &ServiceName) -> &'a BTreeSet<ServiceName> {
    let svc = environment
        .services
        .get(service)
        .expect("service referenced by a container must exist");
    match direction {
        Direction::Forward => &svc.requires,
        Direction::Reverse => &svc.needed_for,
    }
}

/// Starting from `seed`, repeatedly union in the containers of every
/// dependency service (by `direction`) until no more are added.
pub fn gather(
    environment: &Environment,
    seed: &BTreeSet<String>,
    direction: Direction,
) -> Result<BTreeSet<String>> {
    let mut result: BTreeSet<String> = seed.clone();
    let mut frontier: Vec<String> = seed.iter().cloned().collect();

    while let Some(name) = frontier.pop() {
        let container = environment.container(&name).ok_or_else(|| {
            MaestroError::unknown_dependency("gather", name.clone())
        })?;
        for dep_service in edges(environment, direction, &container.service) {
            let svc = environment.service(dep_service.as_str())?;
            for dep_container in svc.containers() {
                let dep_name = dep_container.name.to_string();
                if result.insert(dep_name.clone()) {
                    frontier.push(dep_name);
                }
            }
        }
    }

    Ok(result)
}

/// An ordered execution plan: containers in an order that respects
/// dependency edges for the chosen direction.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Container names, in execution order.
    pub order: Vec<String>,
}

/// Produce an ordered plan over `seed`, widened by [`gather`] when
/// `with_dependencies` is set, honoring `direction`.
///
/// When `ignore_dependencies` is set the returned order still respects
/// dependency edges (ordering correctness is never optional) but `seed` is
/// not widened beyond what the caller asked for, even if `with_dependencies`
/// was also requested — the two flags are mutually exclusive in practice,
/// and `ignore_dependencies` wins when both are passed.
pub fn plan(
    environment: &Environment,
    seed: &BTreeSet<String>,
    direction: Direction,
    with_dependencies: bool,
    ignore_dependencies: bool,
) -> Result<Plan> {
    let working_set = if ignore_dependencies {
        seed.clone()
    } else if with_dependencies {
        gather(environment, seed, direction)?
    } else {
        seed.clone()
    };

    let mut ordered: Vec<String> = Vec::with_capacity(working_set.len());
    let mut ordered_set: BTreeSet<String> = BTreeSet::new();
    let mut pending: BTreeSet<String> = working_set.clone();

    // Dependency sets per container, restricted to the working set, computed
    // once up front.
    let mut deps: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for name in &working_set {
        let singleton: BTreeSet<String> = std::iter::once(name.clone()).collect();
        let mut d = gather(environment, &singleton, direction)?;
        d.remove(name);
        d.retain(|n| working_set.contains(n));
        deps.insert(name.clone(), d);
    }

    while !pending.is_empty() {
        let mut progressed = Vec::new();
        for name in &pending {
            if deps[name].is_subset(&ordered_set) {
                progressed.push(name.clone());
            }
        }
        if progressed.is_empty() {
            let mut stuck: Vec<String> = pending.into_iter().collect();
            stuck.sort();
            return Err(MaestroError::dependency_cycle(stuck));
        }
        progressed.sort();
        for name in progressed {
            pending.remove(&name);
            ordered_set.insert(name.clone());
            ordered.push(name);
        }
    }

    Ok(Plan { order: ordered })
}

/// Expand a predecessor list for `container_name`, as the play executor
/// needs it to build its task dependency graph — the subset of `plan.order`
/// that must complete before `container_name` can run.
pub fn predecessors(
    environment: &Environment,
    direction: Direction,
    container_name: &str,
    in_plan: &BTreeSet<String>,
) -> Result<BTreeSet<String>> {
    let singleton: BTreeSet<String> = std::iter::once(container_name.to_string()).collect();
    let mut deps = gather(environment, &singleton, direction)?;
    deps.remove(container_name);
    deps.retain(|n| in_plan.contains(n));
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerName, Service, Ship};
    use std::collections::BTreeMap;

    fn env_with_chain() -> Environment {
        let mut env = Environment::new("e", 2);
        env.ships
            .insert(ShipNameAlias::new("s1"), Ship::new(ShipNameAlias::new("s1"), "10.0.0.1").unwrap());

        let mut svc_a = Service::new(ServiceName::new("a"), "img", 2);
        svc_a
            .add_container(make_container("a1", "a", "s1"))
            .unwrap();

        let mut svc_b = Service::new(ServiceName::new("b"), "img", 2);
        svc_b.requires.insert(ServiceName::new("a"));
        svc_b
            .add_container(make_container("b1", "b", "s1"))
            .unwrap();

        env.services.insert(svc_a.name.clone(), svc_a);
        env.services.insert(svc_b.name.clone(), svc_b);

        // wire the inverse edge, as the conductor's resolve_deps would.
        env.services
            .get_mut(&ServiceName::new("a"))
            .unwrap()
            .needed_for
            .insert(ServiceName::new("b"));

        env
    }

    type ShipNameAlias = crate::model::ShipName;

    fn make_container(name: &str, service: &str, ship: &str) -> crate::model::Container {
        crate::model::Container::new(
            ContainerName::new(name),
            ServiceName::new(service),
            ShipNameAlias::new(ship),
            vec![],
            BTreeMap::new(),
            BTreeMap::new(),
            vec![],
            vec![],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn forward_plan_orders_dependency_first() {
        let env = env_with_chain();
        let seed: BTreeSet<String> = std::iter::once("b1".to_string()).collect();
        let result = plan(&env, &seed, Direction::Forward, true, false).unwrap();
        assert_eq!(result.order, vec!["a1".to_string(), "b1".to_string()]);
    }

    #[test]
    fn ignore_dependencies_keeps_seed_only() {
        let env = env_with_chain();
        let seed: BTreeSet<String> = std::iter::once("b1".to_string()).collect();
        let result = plan(&env, &seed, Direction::Forward, true, true).unwrap();
        assert_eq!(result.order, vec!["b1".to_string()]);
    }

    #[test]
    fn cycle_is_detected() {
        let mut env = env_with_chain();
        // Make it cyclic: a also requires b.
        env.services
            .get_mut(&ServiceName::new("a"))
            .unwrap()
            .requires
            .insert(ServiceName::new("b"));

        let seed: BTreeSet<String> = ["a1".to_string(), "b1".to_string()].into_iter().collect();
        let err = plan(&env, &seed, Direction::Forward, true, false).unwrap_err();
        assert!(matches!(err, MaestroError::DependencyCycle { .. }));
    }

    #[test]
    fn gather_is_idempotent_closure() {
        let env = env_with_chain();
        let seed: BTreeSet<String> = std::iter::once("b1".to_string()).collect();
        let gathered = gather(&env, &seed, Direction::Forward).unwrap();
        assert!(gathered.contains("a1"));
        assert!(gathered.contains("b1"));
    }
}
