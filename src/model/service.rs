//! Services: a named group of container instances sharing an image.

use std::collections::BTreeSet;

use super::container::Container;
use super::ids::ServiceName;
use crate::error::{MaestroError, Result};

/// A service's image, split into repository and tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDetails {
    /// Everything before the final `:tag`.
    pub repository: String,
    /// The tag, defaulting to `latest` when none was given.
    pub tag: String,
}

/// A logical grouping of container instances sharing an image.
#[derive(Debug)]
pub struct Service {
    /// Unique name.
    pub name: ServiceName,
    /// Image reference, e.g. `registry:5000/repo:tag`.
    pub image: String,
    /// Base environment, merged into (and overridable by) each container's
    /// own env.
    pub env: std::collections::BTreeMap<String, String>,
    /// Configuration schema version this service was parsed under.
    pub schema: u32,
    /// Hard dependencies: services that must be up before this one starts.
    pub requires: BTreeSet<ServiceName>,
    /// Soft dependencies: services this one only wants link vars from.
    pub wants_info: BTreeSet<ServiceName>,
    /// Inverse of `requires`, computed during graph resolution.
    pub needed_for: BTreeSet<ServiceName>,
    /// Owned containers, in declaration order.
    containers: Vec<Container>,
}

impl Service {
    /// Build an empty service for the given name and image.
    pub fn new(name: ServiceName, image: impl Into<String>, schema: u32) -> Self {
        Self {
            name,
            image: image.into(),
            env: std::collections::BTreeMap::new(),
            schema,
            requires: BTreeSet::new(),
            wants_info: BTreeSet::new(),
            needed_for: BTreeSet::new(),
            containers: Vec::new(),
        }
    }

    /// Split `image` into repository and tag, splitting on the final `:`
    /// only when the suffix after it contains no `/` (so a registry port
    /// like `host:5000/repo` isn't mistaken for a tag).
    pub fn image_details(&self) -> ImageDetails {
        match self.image.rfind(':') {
            Some(idx) if !self.image[idx + 1..].contains('/') => ImageDetails {
                repository: self.image[..idx].to_string(),
                tag: self.image[idx + 1..].to_string(),
            },
            _ => ImageDetails {
                repository: self.image.clone(),
                tag: "latest".to_string(),
            },
        }
    }

    /// Append a container, rejecting a duplicate name within the service.
    pub fn add_container(&mut self, container: Container) -> Result<()> {
        if self.containers.iter().any(|c| c.name == container.name) {
            return Err(MaestroError::configuration(format!(
                "duplicate container name `{}` in service `{}`",
                container.name, self.name
            )));
        }
        self.containers.push(container);
        Ok(())
    }

    /// Containers in declaration order.
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// Mutable access to containers in declaration order, for link-variable
    /// propagation after construction.
    pub fn containers_mut(&mut self) -> &mut [Container] {
        &mut self.containers
    }

    /// Look up a container owned by this service.
    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.name.as_str() == name)
    }

    /// Container names in declaration order, for `{SERVICE}_INSTANCES`.
    pub fn instance_names(&self) -> Vec<String> {
        self.containers.iter().map(|c| c.name.to_string()).collect()
    }
}

/// Uppercase a name and replace non-alphanumerics with `_`, as used for
/// link-variable prefixes.
pub fn basename(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}
