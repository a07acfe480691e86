//! End-to-end coverage of the config -> conductor pipeline: parsing a YAML
//! environment description, resolving dependency edges, propagating link
//! variables, and rendering a dependency tree, all without a live Docker
//! daemon.

use std::io::Write;

use maestro::conductor::{self, Selector};
use maestro::config;

const YAML: &str = r#"
name: demo
ships:
  ship1:
    ip: "10.0.0.1"
  ship2:
    ip: "10.0.0.2"
services:
  db:
    image: "postgres:16"
    containers:
      db1:
        ship: ship1
        ports:
          pg: 5432
  web:
    image: "nginx:1.27"
    requires: [db]
    containers:
      web1:
        ship: ship2
        env:
          FOO: bar
"#;

fn build_environment() -> maestro::Environment {
    let config = config::parse(YAML).expect("valid yaml");
    let mut environment = conductor::build(&config).expect("builds");
    conductor::resolve_deps(&mut environment).expect("resolves");
    conductor::propagate_links(&mut environment).expect("propagates");
    environment
}

#[test]
fn builds_ships_services_and_containers() {
    let environment = build_environment();
    assert_eq!(environment.ships.len(), 2);
    assert_eq!(environment.services.len(), 2);
    assert!(environment.container("db1").is_some());
    assert!(environment.container("web1").is_some());
}

#[test]
fn link_vars_reach_the_dependent_container() {
    let environment = build_environment();
    let web1 = environment.container("web1").unwrap();
    assert_eq!(web1.env.get("FOO"), Some(&"bar".to_string()));
    assert!(web1.env.contains_key("DB_DB1_PG_PORT"));
    assert_eq!(web1.env.get("SERVICE_NAME"), Some(&"web".to_string()));
    // Dependency links never carry the internal-facing port, only the
    // externally published one.
    assert!(!web1.env.contains_key("DB_DB1_PG_INTERNAL_PORT"));
}

#[test]
fn a_container_gets_its_own_services_link_vars() {
    let environment = build_environment();
    let db1 = environment.container("db1").unwrap();
    assert!(db1.env.contains_key("DB_INSTANCES"));
    assert_eq!(db1.env.get("DB_DB1_HOST"), Some(&"10.0.0.1".to_string()));
    assert!(db1.env.contains_key("DB_DB1_PG_PORT"));
    assert!(db1.env.contains_key("DB_DB1_PG_INTERNAL_PORT"));
}

#[test]
fn transitive_requires_targets_receive_link_vars_too() {
    let chained = r#"
name: demo
ships:
  ship1: { ip: "10.0.0.1" }
services:
  db:
    image: "postgres:16"
    containers:
      db1:
        ship: ship1
        ports:
          pg: 5432
  web:
    image: "nginx:1.27"
    requires: [db]
    containers:
      web1: { ship: ship1 }
  cache:
    image: "redis:7"
    requires: [web]
    containers:
      cache1: { ship: ship1 }
"#;
    let config = config::parse(chained).expect("valid yaml");
    let mut environment = conductor::build(&config).expect("builds");
    conductor::resolve_deps(&mut environment).expect("resolves");
    conductor::propagate_links(&mut environment).expect("propagates");

    let cache1 = environment.container("cache1").unwrap();
    assert!(cache1.env.contains_key("DB_DB1_PG_PORT"), "cache should see db, its dependency's dependency");
    assert!(cache1.env.contains_key("WEB_INSTANCES"));
}

#[test]
fn needed_for_is_the_inverse_of_requires() {
    let environment = build_environment();
    let db = environment.service("db").unwrap();
    assert!(db.needed_for.iter().any(|s| s.as_str() == "web"));
}

#[test]
fn deptree_reports_the_requires_chain() {
    let environment = build_environment();
    let selector = Selector {
        things: vec!["web".to_string()],
        ..Selector::default()
    };
    let lines = conductor::deptree(&environment, &selector, false).expect("deptree");
    assert_eq!(lines[0].service, "web");
    assert!(lines.iter().any(|l| l.service == "db"));
}

#[test]
fn unknown_dependency_is_rejected() {
    let broken = r#"
name: demo
ships:
  ship1: { ip: "10.0.0.1" }
services:
  web:
    image: "nginx:1.27"
    requires: [nonexistent]
"#;
    let config = config::parse(broken).unwrap();
    let mut environment = conductor::build(&config).unwrap();
    assert!(conductor::resolve_deps(&mut environment).is_err());
}

#[test]
fn duplicate_yaml_keys_are_a_parse_error() {
    let dup = "name: demo\nname: demo2\nservices: {}\n";
    assert!(config::parse(dup).is_err());
}

#[test]
fn config_parses_from_a_file_on_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(YAML.as_bytes()).expect("write");
    let contents = std::fs::read_to_string(file.path()).expect("read back");
    let config = config::parse(&contents).expect("valid yaml from disk");
    assert_eq!(config.name, "demo");
}

#[test]
fn container_filter_and_ship_filter_compose() {
    let environment = build_environment();
    let selector = Selector {
        things: vec!["db".to_string(), "web".to_string()],
        ship_filter: Some("ship1".to_string()),
        ..Selector::default()
    };
    // Filters are exercised indirectly through `apply_filters`, used by every
    // container-granular entry point; deptree bypasses it since it's
    // service-granular, so assert directly against the lower-level helper.
    let expansion = conductor::containers_or_services(&environment, &selector.things, true).unwrap();
    let filtered =
        conductor::apply_filters(&environment, expansion.containers, None, selector.ship_filter.as_deref())
            .unwrap();
    assert_eq!(filtered, std::collections::BTreeSet::from(["db1".to_string()]));
}
