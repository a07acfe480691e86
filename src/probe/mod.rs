//! Lifecycle readiness probes: TCP, HTTP, and exec-style checks.
//!
//! A [`Probe`] is the validated, ready-to-run form of a `lifecycle` entry
//! from the environment description. Construction (via [`Probe::from_spec`])
//! resolves named port references against a container's port table and
//! fails with [`MaestroError::Configuration`] on anything invalid, so that a
//! bad probe spec is caught at build time rather than mid-play.

mod exec;
mod http;
mod tcp;

pub use exec::ExecProbe;
pub use http::HttpProbe;
pub use tcp::TcpProbe;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::docker::DockerClient;
use crate::error::{MaestroError, Result};
use crate::model::ports::{PortSpec, Protocol};

/// Default delay between probe retry attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// The lifecycle state a probe is associated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// The container should be running.
    Running,
    /// The container should be stopped.
    Stopped,
}

/// Raw (pre-validation) shape of one lifecycle probe entry, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawProbeSpec {
    /// `{type: tcp, port: http}`
    Tcp {
        /// Name of the port entry to connect to.
        port: String,
    },
    /// `{type: http, port: http, path: /health, method: GET}`
    Http {
        /// Name of the port entry to connect to (optional; defaults to the
        /// container's sole named port when there is exactly one).
        #[serde(default)]
        port: Option<String>,
        /// Request path, defaults to `/`.
        #[serde(default)]
        path: Option<String>,
        /// HTTP method, defaults to `GET`.
        #[serde(default)]
        method: Option<String>,
        /// URL scheme, defaults to `http`.
        #[serde(default)]
        scheme: Option<String>,
        /// Optional regex the response body must match.
        #[serde(default)]
        regex: Option<String>,
        /// Whether to verify TLS certificates (only relevant for `https`).
        #[serde(default = "default_true")]
        tls_verify: bool,
    },
    /// `{type: exec, cmd: ["curl", "-f", "http://localhost/"]}`
    Exec {
        /// The command to run inside the container.
        cmd: RawCmd,
    },
}

fn default_true() -> bool {
    true
}

/// A command given either as a single string (shell-split is NOT performed;
/// it is passed through as a single argument to `sh -c`) or as an argv list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCmd {
    /// `cmd: "curl -f http://localhost/"`
    Str(String),
    /// `cmd: ["curl", "-f", "http://localhost/"]`
    List(Vec<String>),
}

impl RawCmd {
    fn into_argv(self) -> Vec<String> {
        match self {
            RawCmd::Str(s) => vec!["sh".to_string(), "-c".to_string(), s],
            RawCmd::List(v) => v,
        }
    }
}

/// A validated, executable readiness probe.
#[derive(Debug, Clone)]
pub enum Probe {
    /// TCP connect probe.
    Tcp(TcpProbe),
    /// HTTP request probe.
    Http(HttpProbe),
    /// `docker exec` probe.
    Exec(ExecProbe),
}

/// Everything a probe needs to actually run against a live container.
pub struct ProbeContext<'a> {
    /// The host/IP to connect to for TCP and HTTP probes (the ship's address).
    pub host: &'a str,
    /// The running container's id, for exec probes.
    pub container_id: &'a str,
    /// The container's computed environment, stringified for exec probes.
    pub env: &'a BTreeMap<String, String>,
    /// The Docker client to use for exec probes.
    pub docker: &'a DockerClient,
}

impl Probe {
    /// Validate a raw spec against a container's port table and build an
    /// executable probe.
    pub fn from_spec(raw: &RawProbeSpec, ports: &BTreeMap<String, PortSpec>) -> Result<Self> {
        match raw {
            RawProbeSpec::Tcp { port } => {
                let spec = lookup_port(ports, port)?;
                if spec.exposed.protocol != Protocol::Tcp {
                    return Err(MaestroError::configuration(format!(
                        "tcp probe on port `{port}` requires a tcp port, found {}",
                        spec.exposed.protocol
                    )));
                }
                Ok(Probe::Tcp(TcpProbe::new(spec.external.port)))
            }
            RawProbeSpec::Http {
                port,
                path,
                method,
                scheme,
                regex,
                tls_verify,
            } => {
                let resolved_port = match port {
                    Some(name) => lookup_port(ports, name)?.external.port,
                    None => single_port(ports)?.external.port,
                };
                let probe = HttpProbe::new(resolved_port)
                    .path(path.clone().unwrap_or_else(|| "/".to_string()))
                    .method(method.clone().unwrap_or_else(|| "GET".to_string()))
                    .scheme(scheme.clone().unwrap_or_else(|| "http".to_string()))
                    .tls_verify(*tls_verify);
                let probe = match regex {
                    Some(pattern) => probe.regex(pattern)?,
                    None => probe,
                };
                Ok(Probe::Http(probe))
            }
            RawProbeSpec::Exec { cmd } => {
                Ok(Probe::Exec(ExecProbe::new(cmd.clone().into_argv())))
            }
        }
    }

    /// Run the probe once.
    pub async fn test(&self, ctx: &ProbeContext<'_>) -> bool {
        match self {
            Probe::Tcp(p) => p.test(ctx.host).await,
            Probe::Http(p) => p.test(ctx.host).await,
            Probe::Exec(p) => p.test(ctx).await,
        }
    }

    /// Run the probe up to `max_attempts` times, sleeping `delay` between
    /// failures. Returns true as soon as one attempt succeeds.
    pub async fn test_with_retries(
        &self,
        ctx: &ProbeContext<'_>,
        max_attempts: u32,
        delay: Duration,
    ) -> bool {
        for attempt in 0..max_attempts.max(1) {
            if self.test(ctx).await {
                return true;
            }
            if attempt + 1 < max_attempts {
                tokio::time::sleep(delay).await;
            }
        }
        false
    }
}

fn lookup_port<'a>(ports: &'a BTreeMap<String, PortSpec>, name: &str) -> Result<&'a PortSpec> {
    ports
        .get(name)
        .ok_or_else(|| MaestroError::configuration(format!("probe references unknown port `{name}`")))
}

fn single_port(ports: &BTreeMap<String, PortSpec>) -> Result<&PortSpec> {
    if ports.len() == 1 {
        Ok(ports.values().next().unwrap())
    } else {
        Err(MaestroError::configuration(
            "http probe has no `port` and the container does not expose exactly one port",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ports::RawPortSpec;

    fn ports() -> BTreeMap<String, PortSpec> {
        let raw: RawPortSpec = serde_yaml::from_str("80").unwrap();
        let mut m = BTreeMap::new();
        m.insert("http".to_string(), raw.resolve().unwrap());
        m
    }

    #[test]
    fn tcp_probe_resolves_port() {
        let raw: RawProbeSpec = serde_yaml::from_str("type: tcp\nport: http").unwrap();
        let probe = Probe::from_spec(&raw, &ports()).unwrap();
        assert!(matches!(probe, Probe::Tcp(_)));
    }

    #[test]
    fn tcp_probe_unknown_port_fails() {
        let raw: RawProbeSpec = serde_yaml::from_str("type: tcp\nport: nope").unwrap();
        assert!(Probe::from_spec(&raw, &ports()).is_err());
    }

    #[test]
    fn http_probe_defaults_to_single_port() {
        let raw: RawProbeSpec = serde_yaml::from_str("type: http").unwrap();
        let probe = Probe::from_spec(&raw, &ports()).unwrap();
        assert!(matches!(probe, Probe::Http(_)));
    }

    #[test]
    fn exec_probe_str_cmd_wraps_in_shell() {
        let raw: RawProbeSpec = serde_yaml::from_str("type: exec\ncmd: \"true\"").unwrap();
        match Probe::from_spec(&raw, &ports()).unwrap() {
            Probe::Exec(p) => assert_eq!(p.cmd(), &["sh", "-c", "true"]),
            _ => panic!("expected exec probe"),
        }
    }

    #[test]
    fn unknown_type_fails_deserialize() {
        let result: std::result::Result<RawProbeSpec, _> =
            serde_yaml::from_str("type: bogus");
        assert!(result.is_err());
    }
}
