//! Ships: reachable Docker daemons.

use std::time::Duration;

use super::ids::ShipName;
use crate::docker::{DockerClient, DockerClientConfig};
use crate::error::{MaestroError, Result};

/// SSH tunnel configuration used to reach a ship whose Docker daemon isn't
/// directly exposed on the network.
#[derive(Debug, Clone)]
pub struct SshTunnel {
    /// Remote user to connect as.
    pub user: String,
    /// Path to a private key, if not using agent auth.
    pub key: Option<String>,
    /// SSH port, default 22.
    pub port: u16,
}

impl Default for SshTunnel {
    fn default() -> Self {
        Self {
            user: String::new(),
            key: None,
            port: 22,
        }
    }
}

/// A Docker daemon the orchestrator drives.
#[derive(Debug, Clone)]
pub struct Ship {
    /// Unique name.
    pub name: ShipName,
    /// Host IP, used both for client connections and exposed to dependents
    /// as `CONTAINER_HOST_ADDRESS`.
    pub ip: String,
    /// A distinct control address, when the daemon isn't reachable at `ip`.
    pub endpoint: Option<String>,
    /// Docker daemon port.
    pub docker_port: u16,
    /// Expected Docker daemon version, for informational display only.
    pub docker_version: Option<String>,
    /// Per-command timeout for this ship's client.
    pub timeout_seconds: u64,
    /// SSH tunnel parameters, when set up by the caller out of band.
    pub ssh_tunnel: Option<SshTunnel>,
    /// When true, port bindings default to `ip` instead of `0.0.0.0`.
    pub bind_to_ip: bool,
}

impl Ship {
    /// Build a ship, validating that `name` and `ip` are non-empty.
    pub fn new(name: ShipName, ip: impl Into<String>) -> Result<Self> {
        let ip = ip.into();
        if name.as_str().is_empty() {
            return Err(MaestroError::configuration("ship name cannot be empty"));
        }
        if ip.is_empty() {
            return Err(MaestroError::configuration(format!(
                "ship `{name}` has an empty ip"
            )));
        }
        Ok(Self {
            name,
            ip,
            endpoint: None,
            docker_port: 2375,
            docker_version: None,
            timeout_seconds: 30,
            ssh_tunnel: None,
            bind_to_ip: false,
        })
    }

    /// The address this ship's Docker daemon is actually reached at.
    pub fn control_address(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(&self.ip)
    }

    /// The default bind host for published ports.
    pub fn bind_host(&self) -> &str {
        if self.bind_to_ip {
            &self.ip
        } else {
            "0.0.0.0"
        }
    }

    /// Build a client pointed at this ship's daemon.
    pub fn docker_client(&self, docker_path: std::path::PathBuf) -> DockerClient {
        DockerClient::new(DockerClientConfig {
            docker_path,
            docker_host: Some(format!(
                "tcp://{}:{}",
                self.control_address(),
                self.docker_port
            )),
            default_timeout: Duration::from_secs(self.timeout_seconds),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_host_defaults_to_wildcard() {
        let ship = Ship::new(ShipName::new("s1"), "10.0.0.5").unwrap();
        assert_eq!(ship.bind_host(), "0.0.0.0");
    }

    #[test]
    fn bind_host_honors_bind_to_ip() {
        let mut ship = Ship::new(ShipName::new("s1"), "10.0.0.5").unwrap();
        ship.bind_to_ip = true;
        assert_eq!(ship.bind_host(), "10.0.0.5");
    }

    #[test]
    fn control_address_falls_back_to_ip() {
        let ship = Ship::new(ShipName::new("s1"), "10.0.0.5").unwrap();
        assert_eq!(ship.control_address(), "10.0.0.5");
    }

    #[test]
    fn empty_ip_is_rejected() {
        assert!(Ship::new(ShipName::new("s1"), "").is_err());
    }
}
