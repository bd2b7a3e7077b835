//! The driver trait: the boundary between the convergence engine and the
//! external system.
//!
//! A [`ResourceDriver`] wraps whatever client talks to the real system (a
//! container daemon, a cloud API, a device inventory) behind blocking
//! request/response calls. The engine never caches what a driver returns
//! across steps; observed state is fetched fresh immediately before each
//! comparison because the engine itself may have just mutated the resource.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reconciler::{DesiredState, ObservedState};

/// A resource as fetched from the external system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedResource {
    /// Identifier assigned by the external system.
    pub id: String,
    /// Reconcilable properties, keyed by canonical property name.
    pub properties: ObservedState,
    /// Whether the resource is currently running.
    #[serde(default)]
    pub running: bool,
    /// Whether the resource is currently paused.
    #[serde(default)]
    pub paused: bool,
}

impl ObservedResource {
    /// Creates a stopped, unpaused resource with the given properties.
    pub fn new(id: impl Into<String>, properties: ObservedState) -> Self {
        Self {
            id: id.into(),
            properties,
            running: false,
            paused: false,
        }
    }
}

/// Synchronous boundary to the external system.
///
/// Lifecycle operations (`fetch`, `create`, `update`, `remove`) must be
/// implemented by every driver. The run-state operations default to an
/// [`Error::Unsupported`] so drivers for resources without a run state only
/// implement the lifecycle subset; the engine never calls a run-state
/// operation unless the requested target state demands it.
///
/// A driver whose system refuses to stop or remove paused resources should
/// return [`Error::ResourcePaused`] for that refusal; the engine reacts by
/// unpausing and retrying within a fixed budget.
pub trait ResourceDriver {
    /// Fetches the resource by name. `Ok(None)` when it does not exist.
    fn fetch(&mut self, name: &str) -> Result<Option<ObservedResource>>;

    /// Creates the resource from the desired configuration and returns it as
    /// freshly observed.
    fn create(&mut self, name: &str, desired: &DesiredState) -> Result<ObservedResource>;

    /// Applies an in-place update of the named properties, taking their new
    /// values from the desired configuration.
    fn update(&mut self, id: &str, desired: &DesiredState, properties: &[String]) -> Result<()>;

    /// Removes the resource. `force` requests removal without the system's
    /// graceful-shutdown courtesies, for systems that distinguish the two.
    fn remove(&mut self, id: &str, force: bool) -> Result<()>;

    /// Starts the resource.
    fn start(&mut self, id: &str) -> Result<()> {
        let _ = id;
        Err(Error::Unsupported("start".to_string()))
    }

    /// Stops the resource, waiting up to `timeout` seconds for a graceful
    /// shutdown when given.
    fn stop(&mut self, id: &str, timeout: Option<u32>) -> Result<()> {
        let _ = (id, timeout);
        Err(Error::Unsupported("stop".to_string()))
    }

    /// Pauses the resource.
    fn pause(&mut self, id: &str) -> Result<()> {
        let _ = id;
        Err(Error::Unsupported("pause".to_string()))
    }

    /// Unpauses the resource.
    fn unpause(&mut self, id: &str) -> Result<()> {
        let _ = id;
        Err(Error::Unsupported("unpause".to_string()))
    }
}
