//! Volume specification parsing (§6), schema 1 and schema 2.

use serde::Deserialize;

use crate::error::{MaestroError, Result};

/// Bind-mount access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Read-write (default).
    ReadWrite,
    /// Read-only.
    ReadOnly,
}

impl Mode {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "rw" => Ok(Self::ReadWrite),
            "ro" => Ok(Self::ReadOnly),
            other => Err(MaestroError::configuration(format!(
                "invalid volume mode `{other}`, expected `rw` or `ro`"
            ))),
        }
    }
}

/// A single resolved bind mount: host path to container path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    /// Path on the host (ship) filesystem.
    pub host_path: String,
    /// Path inside the container.
    pub container_path: String,
    /// Access mode.
    pub mode: Mode,
}

/// Raw YAML shape of one volume entry's value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawVolumeValue {
    /// Bare path: `"/outside": "/inside"`.
    Path(String),
    /// `{target: "/inside", mode: "ro"}`.
    Detailed {
        /// Target path (meaning depends on schema direction).
        target: Option<String>,
        /// Access mode, defaults to `rw`.
        #[serde(default)]
        mode: Option<String>,
    },
    /// A list is invalid (no multi-bind).
    List(Vec<serde_yaml::Value>),
}

/// Parse one `key: value` volume entry for the given schema version.
///
/// Schema 2: `key` is the host path, `value` is the container path (or
/// detailed mapping). Schema 1 inverts the direction: `key` is the container
/// path, `value` is the host path.
pub fn resolve_volume(key: &str, value: &RawVolumeValue, schema: u32) -> Result<BindMount> {
    let (other_path, mode) = match value {
        RawVolumeValue::Path(p) => (p.clone(), Mode::ReadWrite),
        RawVolumeValue::Detailed { target, mode } => {
            let target = target.clone().ok_or_else(|| {
                MaestroError::configuration("volume mapping missing `target`")
            })?;
            let mode = match mode {
                Some(m) => Mode::parse(m)?,
                None => Mode::ReadWrite,
            };
            (target, mode)
        }
        RawVolumeValue::List(_) => {
            return Err(MaestroError::configuration(
                "volume specification cannot be a list (no multi-bind)",
            ))
        }
    };

    if schema <= 1 {
        // schema 1: `container_path: host_path`
        Ok(BindMount {
            host_path: other_path,
            container_path: key.to_string(),
            mode,
        })
    } else {
        // schema 2: `host_path: container_path`
        Ok(BindMount {
            host_path: key.to_string(),
            container_path: other_path,
            mode,
        })
    }
}
