//! YAML-deserializable mirror of the environment description (§6).
//!
//! Templating, `include_services` merging, and the CLI surface are the
//! loader's job and live outside this crate; this module owns only the
//! shape `serde_yaml` deserializes into and the duplicate-key check YAML
//! itself doesn't give us for free.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{MaestroError, Result};
use crate::model::ports::RawPortSpec;
use crate::model::restart::RawRestartPolicy;
use crate::model::volumes::RawVolumeValue;
use crate::probe::{LifecycleState, RawProbeSpec};

/// Top-level environment description.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment name.
    pub name: String,
    /// Ships, keyed by name.
    #[serde(default)]
    pub ships: BTreeMap<String, RawShipConfig>,
    /// Services, keyed by name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
    /// Registry credentials, keyed by registry name.
    #[serde(default)]
    pub registries: BTreeMap<String, RawRegistryConfig>,
    /// Configuration schema version; defaults to 1 when absent.
    #[serde(rename = "__maestro", default)]
    pub maestro: Option<MaestroBlock>,
    /// Resolved convenience accessor; see [`EnvironmentConfig::schema`].
    #[serde(skip)]
    pub schema: Option<u32>,
}

/// The `__maestro` control block.
#[derive(Debug, Clone, Deserialize)]
pub struct MaestroBlock {
    /// Schema version: 1 or 2.
    pub schema: u32,
}

/// One ship entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawShipConfig {
    /// Host IP.
    pub ip: String,
    /// Optional distinct control address.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Docker daemon port, defaults to 2375.
    #[serde(default)]
    pub docker_port: Option<u16>,
    /// Expected Docker version string.
    #[serde(default)]
    pub docker_version: Option<String>,
    /// Per-command timeout in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Whether published ports default to binding `ip` instead of `0.0.0.0`.
    #[serde(default)]
    pub bind_to_ip: Option<bool>,
}

/// One registry credential entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRegistryConfig {
    /// Registry username.
    pub username: String,
    /// Registry password.
    pub password: String,
}

/// One service entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Image reference.
    pub image: String,
    /// Base environment, merged into every container.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Hard dependency service names.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Soft dependency service names.
    #[serde(default)]
    pub wants_info: Vec<String>,
    /// Container instances, keyed by name, in declaration order.
    #[serde(default)]
    pub containers: indexmap_like::OrderedMap<ContainerConfig>,
}

/// One container entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerConfig {
    /// The ship this container is placed on.
    pub ship: String,
    /// Command, given as a bare string or an argv list.
    #[serde(default)]
    pub cmd: Vec<String>,
    /// Named port mappings.
    #[serde(default)]
    pub ports: BTreeMap<String, RawPortSpec>,
    /// Container-specific environment, overlaid on the service's base env.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Bind mounts.
    #[serde(default)]
    pub volumes: BTreeMap<String, RawVolumeValue>,
    /// Container-only volume paths.
    #[serde(default)]
    pub container_volumes: Vec<String>,
    /// Names of sibling containers (same ship) whose volumes to inherit.
    #[serde(default)]
    pub volumes_from: Vec<String>,
    /// Working directory.
    #[serde(default)]
    pub workdir: Option<String>,
    /// Whether to run privileged.
    #[serde(default)]
    pub privileged: Option<bool>,
    /// Extra DNS servers.
    #[serde(default)]
    pub dns: Vec<String>,
    /// `docker stop` grace period, in seconds.
    #[serde(default)]
    pub stop_timeout: Option<u64>,
    /// CPU shares.
    #[serde(default)]
    pub cpu_shares: Option<u64>,
    /// Memory limit string, e.g. `"512m"`.
    #[serde(default)]
    pub mem_limit: Option<String>,
    /// Memory+swap limit string.
    #[serde(default)]
    pub memswap_limit: Option<String>,
    /// Restart policy.
    #[serde(default)]
    pub restart_policy: Option<RawRestartPolicy>,
    /// Readiness probes, by lifecycle state.
    #[serde(default)]
    pub lifecycle: BTreeMap<LifecycleState, Vec<RawProbeSpec>>,
}

/// Minimal order-preserving map used only for `containers:`, where
/// declaration order feeds `{SERVICE}_INSTANCES`. A dependency like
/// `indexmap` would do this more generally; this is the one place order
/// matters, so a small local type stands in for it.
pub mod indexmap_like {
    use serde::de::{Deserializer, MapAccess, Visitor};
    use serde::Deserialize;
    use std::fmt;
    use std::marker::PhantomData;

    /// An insertion-ordered `name -> value` map.
    #[derive(Debug, Clone, Default)]
    pub struct OrderedMap<V>(Vec<(String, V)>);

    impl<V> OrderedMap<V> {
        /// Iterate in declaration order.
        pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
            self.0.iter().map(|(k, v)| (k, v))
        }
    }

    impl<'a, V> IntoIterator for &'a OrderedMap<V> {
        type Item = (&'a String, &'a V);
        type IntoIter = Box<dyn Iterator<Item = (&'a String, &'a V)> + 'a>;
        fn into_iter(self) -> Self::IntoIter {
            Box::new(self.iter())
        }
    }

    impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            struct MapVisitor<V>(PhantomData<V>);

            impl<'de, V: Deserialize<'de>> Visitor<'de> for MapVisitor<V> {
                type Value = OrderedMap<V>;

                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("a mapping")
                }

                fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
                where
                    A: MapAccess<'de>,
                {
                    let mut entries = Vec::new();
                    while let Some((key, value)) = map.next_entry::<String, V>()? {
                        entries.push((key, value));
                    }
                    Ok(OrderedMap(entries))
                }
            }

            deserializer.deserialize_map(MapVisitor(PhantomData))
        }
    }
}

impl EnvironmentConfig {
    /// The resolved schema version: the `__maestro.schema` block if present,
    /// defaulting to 1.
    pub fn schema_version(&self) -> u32 {
        self.maestro.as_ref().map(|b| b.schema).unwrap_or(1)
    }
}

/// Parse an environment description, rejecting duplicate keys in any
/// mapping (YAML itself doesn't consider this an error; this crate does).
pub fn parse(yaml: &str) -> Result<EnvironmentConfig> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    check_no_duplicate_keys(&value)?;
    let mut config: EnvironmentConfig = serde_yaml::from_value(value)?;
    config.schema = Some(config.schema_version());
    Ok(config)
}

fn check_no_duplicate_keys(value: &serde_yaml::Value) -> Result<()> {
    match value {
        serde_yaml::Value::Mapping(map) => {
            let mut seen = std::collections::HashSet::new();
            for key in map.keys() {
                let rendered = serde_yaml::to_string(key).unwrap_or_default();
                if !seen.insert(rendered.clone()) {
                    return Err(MaestroError::configuration(format!(
                        "duplicate key `{}` in environment description",
                        rendered.trim()
                    )));
                }
            }
            for value in map.values() {
                check_no_duplicate_keys(value)?;
            }
            Ok(())
        }
        serde_yaml::Value::Sequence(seq) => {
            for item in seq {
                check_no_duplicate_keys(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_environment() {
        let yaml = r#"
name: demo
ships:
  s1:
    ip: 10.0.0.1
services:
  a:
    image: "redis:7"
    containers:
      a1:
        ship: s1
"#;
        let config = parse(yaml).unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.schema, Some(1));
        assert_eq!(config.services["a"].image, "redis:7");
    }

    #[test]
    fn duplicate_top_level_key_is_rejected() {
        let yaml = "name: a\nname: b\n";
        assert!(parse(yaml).is_err());
    }

    #[test]
    fn schema_two_block_is_honored() {
        let yaml = r#"
name: demo
__maestro:
  schema: 2
"#;
        let config = parse(yaml).unwrap();
        assert_eq!(config.schema, Some(2));
    }

    #[test]
    fn container_order_is_preserved() {
        let yaml = r#"
name: demo
ships:
  s1: { ip: 10.0.0.1 }
services:
  a:
    image: redis
    containers:
      second: { ship: s1 }
      first: { ship: s1 }
"#;
        let config = parse(yaml).unwrap();
        let names: Vec<&String> = config.services["a"].containers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["second", "first"]);
    }
}
