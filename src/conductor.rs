//! The conductor: builds the environment graph from parsed configuration,
//! resolves dependency and link-variable relations, and exposes the command
//! entry points plays are built from.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ContainerConfig, EnvironmentConfig, ServiceConfig};
use crate::error::{MaestroError, Result};
use crate::model::service::basename;
use crate::model::{Container, ContainerName, Environment, RegistryAuth, ServiceName, Ship, ShipName};
use crate::planner::{self, Direction};
use crate::play::{self, PlayContext};
use crate::play_executor::Outcome;
use crate::probe::Probe;

/// Build an [`Environment`] from a parsed configuration tree: ships first,
/// then services, then containers.
pub fn build(config: &EnvironmentConfig) -> Result<Environment> {
    let schema = config.schema.unwrap_or(1);
    let mut environment = Environment::new(config.name.clone(), schema);

    for (name, raw_ship) in &config.ships {
        let ship_name = ShipName::new(name.clone());
        let mut ship = Ship::new(ship_name.clone(), raw_ship.ip.clone())?;
        ship.endpoint = raw_ship.endpoint.clone();
        ship.docker_port = raw_ship.docker_port.unwrap_or(2375);
        ship.docker_version = raw_ship.docker_version.clone();
        ship.timeout_seconds = raw_ship.timeout_seconds.unwrap_or(30);
        ship.bind_to_ip = raw_ship.bind_to_ip.unwrap_or(false);
        environment.ships.insert(ship_name, ship);
    }

    for (registry_name, raw) in &config.registries {
        let auth = RegistryAuth::new(raw.username.clone(), raw.password.clone())?;
        environment.registries.insert(registry_name.clone(), auth);
    }

    for (service_name, raw_service) in &config.services {
        let service = build_service(&environment, service_name, raw_service, schema)?;
        environment
            .services
            .insert(ServiceName::new(service_name.clone()), service);
    }

    environment.validate_volume_sharing()?;

    Ok(environment)
}

fn build_service(
    environment: &Environment,
    service_name: &str,
    raw: &ServiceConfig,
    schema: u32,
) -> Result<crate::model::Service> {
    let mut service = crate::model::Service::new(ServiceName::new(service_name), raw.image.clone(), schema);
    for (key, value) in &raw.env {
        service.env.insert(key.clone(), value.clone());
    }

    for dep in &raw.requires {
        service.requires.insert(ServiceName::new(dep.clone()));
    }
    for dep in &raw.wants_info {
        service.wants_info.insert(ServiceName::new(dep.clone()));
    }

    for (container_name, raw_container) in &raw.containers {
        if !environment.ships.contains_key(raw_container.ship.as_str()) {
            return Err(MaestroError::unknown_dependency(container_name, &raw_container.ship));
        }
        let container = build_container(
            container_name,
            service_name,
            raw_container,
            &service.env,
            schema,
        )?;
        service.add_container(container)?;
    }

    Ok(service)
}

fn build_container(
    container_name: &str,
    service_name: &str,
    raw: &ContainerConfig,
    service_env: &BTreeMap<String, String>,
    schema: u32,
) -> Result<Container> {
    let mut ports = BTreeMap::new();
    for (port_name, raw_port) in &raw.ports {
        ports.insert(port_name.clone(), raw_port.resolve()?);
    }

    let mut volumes = Vec::new();
    for (key, value) in &raw.volumes {
        volumes.push(crate::model::volumes::resolve_volume(key, value, schema)?);
    }

    let mut env: BTreeMap<String, String> = service_env.clone();
    for (key, value) in &raw.env {
        env.insert(key.clone(), value.clone());
    }

    let volumes_from = raw
        .volumes_from
        .iter()
        .map(|s| ContainerName::new(s.clone()))
        .collect();

    let mut container = Container::new(
        ContainerName::new(container_name),
        ServiceName::new(service_name),
        ShipName::new(raw.ship.clone()),
        raw.cmd.clone(),
        ports,
        env,
        volumes,
        raw.container_volumes.clone(),
        volumes_from,
    )?;

    container.workdir = raw.workdir.clone();
    container.privileged = raw.privileged.unwrap_or(false);
    container.dns = raw.dns.clone();
    if let Some(secs) = raw.stop_timeout {
        container.stop_timeout = std::time::Duration::from_secs(secs);
    }
    container.cpu_shares = raw.cpu_shares;
    if let Some(raw_mem) = &raw.mem_limit {
        container.mem_limit = Some(crate::model::limits::parse_limit(raw_mem)?);
    }
    if let Some(raw_mem) = &raw.memswap_limit {
        container.memswap_limit = Some(crate::model::limits::parse_limit(raw_mem)?);
    }
    if let Some(raw_policy) = raw.restart_policy.clone() {
        container.restart_policy = raw_policy.into();
    }

    for (state, raw_probes) in &raw.lifecycle {
        let mut probes = Vec::new();
        for raw_probe in raw_probes {
            probes.push(Probe::from_spec(raw_probe, &container.ports)?);
        }
        container.lifecycle.insert(*state, probes);
    }

    Ok(container)
}

/// Wire `requires`/`wants_info` into the inverse `needed_for` edges.
pub fn resolve_deps(environment: &mut Environment) -> Result<()> {
    let mut inverse: BTreeMap<ServiceName, BTreeSet<ServiceName>> = BTreeMap::new();
    for (name, service) in &environment.services {
        for dep in &service.requires {
            if !environment.services.contains_key(dep) {
                return Err(MaestroError::unknown_dependency(name.to_string(), dep.to_string()));
            }
            inverse.entry(dep.clone()).or_default().insert(name.clone());
        }
        for dep in &service.wants_info {
            if !environment.services.contains_key(dep) {
                return Err(MaestroError::unknown_dependency(name.to_string(), dep.to_string()));
            }
        }
    }
    for (name, needed_for) in inverse {
        if let Some(service) = environment.services.get_mut(&name) {
            service.needed_for = needed_for;
        }
    }
    Ok(())
}

/// For each container, compute its synthesized and link environment
/// variables: `MAESTRO_ENVIRONMENT_NAME`/`SERVICE_NAME`/`CONTAINER_NAME`/
/// `CONTAINER_HOST_ADDRESS`, plus vars describing every `requires` and
/// `wants_info` target.
pub fn propagate_links(environment: &mut Environment) -> Result<()> {
    // Compute link vars per service first (read-only pass), then apply.
    let mut per_container_links: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    for container in environment.all_containers() {
        let mut vars = BTreeMap::new();
        vars.insert("MAESTRO_ENVIRONMENT_NAME".to_string(), environment.name.clone());
        vars.insert("SERVICE_NAME".to_string(), container.service.to_string());
        vars.insert("CONTAINER_NAME".to_string(), container.name.to_string());
        let ship = environment.ship(container.ship.as_str())?;
        vars.insert("CONTAINER_HOST_ADDRESS".to_string(), ship.ip.clone());

        let service = environment.service(container.service.as_str())?;
        add_service_link_vars(environment, service, &mut vars, true)?;

        for dep_name in environment.transitive_requires(container.service.as_str())? {
            let dep_service = environment.service(dep_name.as_str())?;
            add_service_link_vars(environment, dep_service, &mut vars, false)?;
        }
        for dep_name in &service.wants_info {
            let dep_service = environment.service(dep_name.as_str())?;
            add_service_link_vars(environment, dep_service, &mut vars, false)?;
        }

        per_container_links.insert(container.name.to_string(), vars);
    }

    for (name, vars) in per_container_links {
        let container = environment
            .services
            .values_mut()
            .find_map(|s| s.containers_mut().iter_mut().find(|c| c.name.as_str() == name.as_str()))
            .expect("container must still exist");
        container.env.extend(vars);
    }

    Ok(())
}

/// Add `dep_service`'s link vars to `vars`. `add_internal` also emits
/// `..._INTERNAL_PORT`, which only applies to a container's own service —
/// dependency links (`requires`/`wants_info`) never expose the internal
/// (exposed-in-container) port, only the externally published one.
fn add_service_link_vars(
    environment: &Environment,
    dep_service: &crate::model::Service,
    vars: &mut BTreeMap<String, String>,
    add_internal: bool,
) -> Result<()> {
    let service_base = basename(dep_service.name.as_str());
    vars.insert(
        format!("{service_base}_INSTANCES"),
        dep_service.instance_names().join(","),
    );
    for dep_container in dep_service.containers() {
        let ship = environment.ship(dep_container.ship.as_str())?;
        let container_base = basename(dep_container.name.as_str());
        vars.insert(format!("{service_base}_{container_base}_HOST"), ship.ip.clone());
        for (port_name, port_spec) in &dep_container.ports {
            let port_base = basename(port_name);
            vars.insert(
                format!("{service_base}_{container_base}_{port_base}_PORT"),
                port_spec.external.port.to_string(),
            );
            if add_internal {
                vars.insert(
                    format!("{service_base}_{container_base}_{port_base}_INTERNAL_PORT"),
                    port_spec.exposed.port.to_string(),
                );
            }
        }
    }
    Ok(())
}

/// A mixed list of names, classified into the services and containers it
/// named directly (before any `expand_services` widening).
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    /// Service names given directly in `things`.
    pub services: BTreeSet<String>,
    /// Container names given directly in `things`, plus (when expanded) the
    /// containers of every named service.
    pub containers: BTreeSet<String>,
}

/// Classify a mixed list of service/container names; a name matching
/// neither is an error. When `expand_services` is set, every named
/// service's containers are folded into `containers` (bare service names
/// otherwise only appear in `services`, e.g. for `deptree`).
pub fn containers_or_services(
    environment: &Environment,
    names: &[String],
    expand_services: bool,
) -> Result<Expansion> {
    let mut expansion = Expansion::default();
    for name in names {
        if environment.services.contains_key(name.as_str()) {
            expansion.services.insert(name.clone());
        } else if environment.container(name).is_some() {
            expansion.containers.insert(name.clone());
        } else {
            return Err(MaestroError::configuration(format!(
                "`{name}` is neither a known service nor a known container"
            )));
        }
    }
    if expand_services {
        for service_name in &expansion.services {
            let service = environment.service(service_name)?;
            for c in service.containers() {
                expansion.containers.insert(c.name.to_string());
            }
        }
    }
    Ok(expansion)
}

/// `things` empty and `expand_all` not set: destructive plays refuse to run
/// against "everything"; non-destructive plays default to every service not
/// already excluded.
pub fn default_things(environment: &Environment, expand_all: bool, destructive: bool) -> Result<Vec<String>> {
    if expand_all {
        return Ok(environment.services.keys().map(ServiceName::to_string).collect());
    }
    if destructive {
        return Err(MaestroError::parameter(
            "refusing to run a destructive command against an empty selection; pass --all or name targets explicitly",
        ));
    }
    Ok(environment.services.keys().map(ServiceName::to_string).collect())
}

/// Apply `container_filter`/`ship_filter` glob patterns (after expansion).
pub fn apply_filters(
    environment: &Environment,
    names: BTreeSet<String>,
    container_filter: Option<&str>,
    ship_filter: Option<&str>,
) -> Result<BTreeSet<String>> {
    let container_glob = container_filter.map(crate::globbing::Glob::compile).transpose()?;
    let ship_glob = ship_filter.map(crate::globbing::Glob::compile).transpose()?;

    let mut result = BTreeSet::new();
    for name in names {
        if let Some(glob) = &container_glob {
            if !glob.matches(&name) {
                continue;
            }
        }
        if let Some(glob) = &ship_glob {
            let container = environment
                .container(&name)
                .ok_or_else(|| MaestroError::configuration(format!("unknown container `{name}`")))?;
            if !glob.matches(container.ship.as_str()) {
                continue;
            }
        }
        result.insert(name);
    }
    Ok(result)
}

/// Shared selection arguments every entry point in this section accepts
/// (§4.G). `things` empty means "let the play pick a default"; see
/// [`default_things`].
#[derive(Debug, Clone, Default)]
pub struct Selector {
    pub things: Vec<String>,
    pub with_dependencies: bool,
    pub ignore_dependencies: bool,
    pub expand_services: bool,
    pub expand_all: bool,
    pub container_filter: Option<String>,
    pub ship_filter: Option<String>,
}

/// Resolve a [`Selector`] to the final set of container names a
/// container-granular play should act on.
fn resolve_containers(environment: &Environment, selector: &Selector, destructive: bool) -> Result<BTreeSet<String>> {
    let things = if selector.things.is_empty() {
        default_things(environment, selector.expand_all, destructive)?
    } else {
        selector.things.clone()
    };
    let expansion = containers_or_services(environment, &things, true)?;
    let _ = selector.expand_services; // expansion to containers is required for these plays regardless
    apply_filters(
        environment,
        expansion.containers,
        selector.container_filter.as_deref(),
        selector.ship_filter.as_deref(),
    )
}

/// Resolve a [`Selector`] to root service names, for `deptree`, which works
/// at the service level rather than the container level.
fn resolve_services(environment: &Environment, selector: &Selector) -> Result<BTreeSet<String>> {
    let things = if selector.things.is_empty() {
        default_things(environment, true, false)?
    } else {
        selector.things.clone()
    };
    let expansion = containers_or_services(environment, &things, false)?;
    if expansion.services.is_empty() {
        return Err(MaestroError::parameter("deptree requires at least one service name"));
    }
    Ok(expansion.services)
}

/// `status`: one line per container, from a single `docker ps` per ship.
pub async fn status(ctx: &PlayContext<'_>, selector: &Selector) -> Result<Vec<play::ReportLine>> {
    let containers = resolve_containers(ctx.environment, selector, false)?;
    Ok(play::status::run(ctx, &containers).await)
}

/// `full_status`: like `status`, but also runs each running container's
/// readiness probes once.
pub async fn full_status(ctx: &PlayContext<'_>, selector: &Selector) -> Result<Vec<play::ReportLine>> {
    let containers = resolve_containers(ctx.environment, selector, false)?;
    Ok(play::full_status::run(ctx, &containers).await)
}

/// `pull`: pull each service's image, logging in to its registry first if
/// the image reference names one.
pub async fn pull(ctx: &PlayContext<'_>, selector: &Selector) -> Result<std::collections::HashMap<String, Outcome>> {
    let containers = resolve_containers(ctx.environment, selector, false)?;
    Ok(play::pull::run(ctx, &containers).await)
}

/// `start`: create (if needed), start, and wait for readiness, in forward
/// dependency order.
pub async fn start(
    ctx: &PlayContext<'_>,
    selector: &Selector,
    options: play::start::StartOptions,
) -> Result<std::collections::HashMap<String, Outcome>> {
    let containers = resolve_containers(ctx.environment, selector, false)?;
    let plan = planner::plan(
        ctx.environment,
        &containers,
        Direction::Forward,
        selector.with_dependencies,
        selector.ignore_dependencies,
    )?;
    Ok(play::start::run(ctx, &plan, options).await)
}

/// `stop`: graceful stop in reverse dependency order. Destructive: an empty
/// selection without `expand_all` is a [`MaestroError::Parameter`].
pub async fn stop(ctx: &PlayContext<'_>, selector: &Selector) -> Result<std::collections::HashMap<String, Outcome>> {
    let containers = resolve_containers(ctx.environment, selector, true)?;
    Ok(play::stop::run(ctx, &containers).await)
}

/// `kill`: like `stop`, but `SIGKILL` immediately. Destructive.
pub async fn kill(ctx: &PlayContext<'_>, selector: &Selector) -> Result<std::collections::HashMap<String, Outcome>> {
    let containers = resolve_containers(ctx.environment, selector, true)?;
    Ok(play::kill::run(ctx, &containers).await)
}

/// `restart`: stop then start, honoring `only_if_changed`/`reuse`/delays.
/// Destructive.
pub async fn restart(
    ctx: &PlayContext<'_>,
    selector: &Selector,
    options: play::restart::RestartOptions,
) -> Result<std::collections::HashMap<String, Outcome>> {
    let containers = resolve_containers(ctx.environment, selector, true)?;
    Ok(play::restart::run(ctx, &containers, options).await)
}

/// `clean`: remove stopped containers; missing containers are no-ops.
pub async fn clean(ctx: &PlayContext<'_>, selector: &Selector) -> Result<std::collections::HashMap<String, Outcome>> {
    let containers = resolve_containers(ctx.environment, selector, false)?;
    Ok(play::clean::run(ctx, &containers).await)
}

/// `logs`: fetch or follow the single named container's output.
pub async fn logs(
    ctx: &PlayContext<'_>,
    selector: &Selector,
    options: play::logs::LogsOptions,
) -> Result<play::logs::LogsOutput> {
    let containers = resolve_containers(ctx.environment, selector, false)?;
    play::logs::run(ctx, &containers, options).await
}

/// `deptree`: each root service's `requires` subtree.
pub fn deptree(environment: &Environment, selector: &Selector, recursive: bool) -> Result<Vec<play::deptree::TreeLine>> {
    let roots = resolve_services(environment, selector)?;
    play::deptree::run(environment, &roots, recursive)
}

/// `dump`: render the resolved environment for inspection — ships, services,
/// containers, and the link variables propagated onto each container's env.
pub fn dump(environment: &Environment) -> String {
    let mut out = String::new();
    out.push_str(&format!("environment: {}\n", environment.name));
    out.push_str("ships:\n");
    for (name, ship) in &environment.ships {
        out.push_str(&format!("  {name}: {}\n", ship.ip));
    }
    out.push_str("services:\n");
    for (name, service) in &environment.services {
        out.push_str(&format!("  {name}: {}\n", service.image));
        for container in service.containers() {
            out.push_str(&format!("    {}@{}\n", container.name, container.ship));
            for (key, value) in &container.env {
                out.push_str(&format!("      {key}={value}\n"));
            }
        }
    }
    out
}

/// The fixed command list `complete` offers at position 2.
const COMMANDS: &[&str] = &[
    "status", "dump", "pull", "start", "stop", "kill", "restart", "clean", "logs", "deptree", "complete",
];

/// `complete(tokens) -> candidates`: the command list at position 2, the
/// union of service and container names afterward, filtered by the prefix
/// of the last token (§6).
pub fn complete(environment: &Environment, tokens: &[String]) -> Vec<String> {
    let prefix = tokens.last().map(String::as_str).unwrap_or("");
    let candidates: Vec<String> = if tokens.len() <= 2 {
        COMMANDS.iter().map(|s| s.to_string()).collect()
    } else {
        let mut names: BTreeSet<String> = environment.services.keys().map(ServiceName::to_string).collect();
        names.extend(environment.all_containers().map(|c| c.name.to_string()));
        names.into_iter().collect()
    };
    candidates.into_iter().filter(|c| c.starts_with(prefix)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
name: test
ships:
  s1: { ip: "10.0.0.1" }
services:
  db:
    image: "postgres:16"
    containers:
      db1: { ship: s1 }
  web:
    image: "nginx:1.27"
    requires: [db]
    containers:
      web1: { ship: s1 }
"#;

    fn environment() -> Environment {
        let config = crate::config::parse(YAML).unwrap();
        let mut env = build(&config).unwrap();
        resolve_deps(&mut env).unwrap();
        env
    }

    #[test]
    fn classifies_service_and_container_names() {
        let env = environment();
        let expansion =
            containers_or_services(&env, &["db".to_string(), "web1".to_string()], false).unwrap();
        assert_eq!(expansion.services, BTreeSet::from(["db".to_string()]));
        assert_eq!(expansion.containers, BTreeSet::from(["web1".to_string()]));
    }

    #[test]
    fn expand_services_folds_in_service_containers() {
        let env = environment();
        let expansion = containers_or_services(&env, &["db".to_string()], true).unwrap();
        assert!(expansion.containers.contains("db1"));
    }

    #[test]
    fn unknown_name_is_an_error() {
        let env = environment();
        assert!(containers_or_services(&env, &["nope".to_string()], false).is_err());
    }

    #[test]
    fn default_things_refuses_empty_destructive_selection() {
        let env = environment();
        assert!(matches!(
            default_things(&env, false, true),
            Err(MaestroError::Parameter { .. })
        ));
    }

    #[test]
    fn default_things_allows_empty_non_destructive_selection() {
        let env = environment();
        let things = default_things(&env, false, false).unwrap();
        assert_eq!(things.len(), 2);
    }

    #[test]
    fn apply_filters_matches_by_ship_glob() {
        let env = environment();
        let names = BTreeSet::from(["db1".to_string(), "web1".to_string()]);
        let filtered = apply_filters(&env, names, Some("db*"), None).unwrap();
        assert_eq!(filtered, BTreeSet::from(["db1".to_string()]));
    }
}
