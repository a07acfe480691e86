//! The entity model: ships, services, containers, and the value types their
//! configuration parses into.

pub mod container;
pub mod environment;
pub mod ids;
pub mod limits;
pub mod ports;
pub mod registry;
pub mod restart;
pub mod ship;
pub mod service;
pub mod volumes;

pub use container::{Container, ContainerStatus};
pub use environment::Environment;
pub use ids::{ContainerName, ServiceName, ShipName};
pub use registry::RegistryAuth;
pub use restart::{RestartPolicy, RestartPolicyName};
pub use service::{basename, ImageDetails, Service};
pub use ship::{Ship, SshTunnel};
