//! Port specification parsing (§6): integer, string, and mapping forms.

use serde::Deserialize;

use crate::error::{MaestroError, Result};

/// A transport protocol for a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

impl Protocol {
    fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(MaestroError::configuration(format!(
                "unknown port protocol `{other}`"
            ))),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// A `port/proto` pair, e.g. `80/tcp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortProto {
    /// The numeric port.
    pub port: u16,
    /// The protocol.
    pub protocol: Protocol,
}

impl std::fmt::Display for PortProto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

fn parse_port_proto(raw: &str, default_proto: Protocol) -> Result<PortProto> {
    let (port_part, proto) = match raw.split_once('/') {
        Some((p, proto)) => (p, Protocol::parse(proto)?),
        None => (raw, default_proto),
    };
    let port: u16 = port_part
        .trim()
        .parse()
        .map_err(|_| MaestroError::configuration(format!("invalid port number `{port_part}`")))?;
    Ok(PortProto {
        port,
        protocol: proto,
    })
}

/// A fully resolved port mapping for one named port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    /// The container-side (exposed) port/proto.
    pub exposed: PortProto,
    /// The host-side bind address.
    pub external_ip: String,
    /// The host-side (external) port/proto.
    pub external: PortProto,
}

/// Raw YAML shapes a named port entry may take.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPortSpec {
    /// A bare integer: `80`.
    Int(u16),
    /// A string: `"80"`, `"80/udp"`, or `"8080:80"`.
    Str(String),
    /// A mapping: `{exposed: "80/tcp", external: ["10.0.0.1", 8080]}`.
    Map {
        /// The exposed (container-side) port spec.
        exposed: String,
        /// The external (host-side) spec: an IP, or `[ip, port]`.
        external: RawExternal,
    },
}

/// The `external` field of a mapping-form port spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawExternal {
    /// Just a bind IP; the port mirrors the exposed port.
    Ip(String),
    /// `[ip, port]`.
    IpPort(String, serde_yaml::Value),
}

impl RawPortSpec {
    /// Resolve this raw spec into a [`PortSpec`].
    pub fn resolve(&self) -> Result<PortSpec> {
        match self {
            RawPortSpec::Int(n) => {
                let exposed = PortProto {
                    port: *n,
                    protocol: Protocol::Tcp,
                };
                Ok(PortSpec {
                    exposed: exposed.clone(),
                    external_ip: "0.0.0.0".to_string(),
                    external: exposed,
                })
            }
            RawPortSpec::Str(s) => Self::resolve_str(s),
            RawPortSpec::Map { exposed, external } => {
                let exposed = parse_port_proto(exposed, Protocol::Tcp)?;
                let (external_ip, external_port_raw) = match external {
                    RawExternal::Ip(ip) => (ip.clone(), None),
                    RawExternal::IpPort(ip, port) => (ip.clone(), Some(port)),
                };
                let external = match external_port_raw {
                    None => exposed.clone(),
                    Some(value) => {
                        let raw_str = match value {
                            serde_yaml::Value::Number(n) => n.to_string(),
                            serde_yaml::Value::String(s) => s.clone(),
                            other => {
                                return Err(MaestroError::configuration(format!(
                                    "invalid external port value: {other:?}"
                                )))
                            }
                        };
                        parse_port_proto(&raw_str, exposed.protocol)?
                    }
                };
                if exposed.protocol != external.protocol {
                    return Err(MaestroError::configuration(
                        "exposed and external port protocols must match",
                    ));
                }
                Ok(PortSpec {
                    exposed,
                    external_ip,
                    external,
                })
            }
        }
    }

    fn resolve_str(s: &str) -> Result<PortSpec> {
        if let Some((a, b)) = s.split_once(':') {
            let exposed = parse_port_proto(a, Protocol::Tcp)?;
            let external = parse_port_proto(b, exposed.protocol)?;
            if exposed.protocol != external.protocol {
                return Err(MaestroError::configuration(
                    "exposed and external port protocols must match",
                ));
            }
            Ok(PortSpec {
                exposed: exposed.clone(),
                external_ip: "0.0.0.0".to_string(),
                external,
            })
        } else {
            let exposed = parse_port_proto(s, Protocol::Tcp)?;
            Ok(PortSpec {
                exposed: exposed.clone(),
                external_ip: "0.0.0.0".to_string(),
                external: exposed,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(yaml: &str) -> PortSpec {
        let raw: RawPortSpec = serde_yaml::from_str(yaml).unwrap();
        raw.resolve().unwrap()
    }

    #[test]
    fn integer_form() {
        let spec = resolve("80");
        assert_eq!(spec.exposed.to_string(), "80/tcp");
        assert_eq!(spec.external.to_string(), "80/tcp");
        assert_eq!(spec.external_ip, "0.0.0.0");
    }

    #[test]
    fn string_with_protocol() {
        let spec = resolve("\"53/udp\"");
        assert_eq!(spec.exposed.protocol, Protocol::Udp);
        assert_eq!(spec.exposed.port, 53);
    }

    #[test]
    fn string_mapping_form() {
        let spec = resolve("\"8080:80\"");
        assert_eq!(spec.exposed.port, 8080);
        assert_eq!(spec.external.port, 80);
    }

    #[test]
    fn mapping_form_with_port() {
        let spec = resolve("exposed: \"80/tcp\"\nexternal: [\"10.0.0.1\", 8080]");
        assert_eq!(spec.external_ip, "10.0.0.1");
        assert_eq!(spec.external.port, 8080);
    }

    #[test]
    fn mapping_form_ip_only() {
        let spec = resolve("exposed: \"80/tcp\"\nexternal: \"10.0.0.1\"");
        assert_eq!(spec.external_ip, "10.0.0.1");
        assert_eq!(spec.external.port, 80);
    }

    #[test]
    fn protocol_mismatch_is_error() {
        let raw: RawPortSpec = serde_yaml::from_str("\"80/tcp:81/udp\"").unwrap();
        assert!(raw.resolve().is_err());
    }

    #[test]
    fn round_trip_preserves_tuple() {
        let spec = resolve("exposed: \"80/tcp\"\nexternal: [\"1.2.3.4\", 8080]");
        assert_eq!(
            (
                spec.exposed.port,
                spec.exposed.protocol,
                spec.external_ip.as_str(),
                spec.external.port,
                spec.external.protocol
            ),
            (80, Protocol::Tcp, "1.2.3.4", 8080, Protocol::Tcp)
        );
    }
}
