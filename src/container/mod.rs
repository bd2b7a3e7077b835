//! Container integration: the concrete resource type this crate ships.
//!
//! The generic machinery (comparison, property tables, reconciler,
//! convergence engine) knows nothing about containers. This module binds it
//! to one real resource type:
//!
//! - [`container_property_table`] declares every container property with its
//!   shape, default comparison, mutability and capability gate
//! - [`ContainerSpec`] is the typed desired-state configuration and projects
//!   itself onto canonical property keys
//! - [`observe_container`] flattens a runtime's inspect document into the
//!   same canonical keys
//!
//! A [`ResourceDriver`](crate::convergence::ResourceDriver) implementation
//! against a concrete runtime API is the only piece left to the caller.

mod config;
mod observed;
mod properties;

pub use config::{ContainerSpec, DeviceMapping, NetworkAttachment, RestartPolicy, Ulimit};
pub use observed::observe_container;
pub use properties::{
    baseline_property_table, container_property_table, ApiCapabilities, ApiVersion,
};

/// Appends the default `/tcp` protocol to a bare port key. Port keys are
/// compared in `port/protocol` form on both sides.
pub(crate) fn normalize_port_key(port: &str) -> String {
    if port.contains('/') {
        port.to_string()
    } else {
        format!("{port}/tcp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_port_key() {
        assert_eq!(normalize_port_key("80"), "80/tcp");
        assert_eq!(normalize_port_key("80/tcp"), "80/tcp");
        assert_eq!(normalize_port_key("53/udp"), "53/udp");
    }
}
