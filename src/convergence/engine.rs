//! The convergence engine.
//!
//! Drives a resource from whatever state it is in toward a requested
//! [`TargetState`], consuming the reconciler's output to decide between the
//! three remedies: create, update in place, or destroy and recreate. One
//! `converge` call is one pass: it executes to completion or aborts on the
//! first driver failure, reporting whatever actions were already taken.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::convergence::driver::{ObservedResource, ResourceDriver};
use crate::diff::DifferenceTracker;
use crate::error::{Error, Result};
use crate::reconciler::{DesiredState, Reconciler};

/// Number of unpause attempts granted when the system keeps refusing to stop
/// or remove a paused resource. Exceeding it is fatal.
const UNPAUSE_RETRY_BUDGET: u32 = 3;

/// The state a resource should be driven toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    /// The resource exists with the desired configuration; its run state is
    /// left alone.
    Present,
    /// The resource exists and is running.
    Started,
    /// The resource exists and is not running.
    Stopped,
    /// The resource does not exist.
    Absent,
}

impl std::fmt::Display for TargetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetState::Present => "present",
            TargetState::Started => "started",
            TargetState::Stopped => "stopped",
            TargetState::Absent => "absent",
        };
        f.write_str(s)
    }
}

/// Options governing one convergence pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvergeOptions {
    /// Record what would change without calling any mutating driver
    /// operation.
    #[serde(default)]
    pub check_mode: bool,
    /// Include a before/after projection of the differences in the report.
    #[serde(default)]
    pub diff_mode: bool,
    /// Destroy and recreate the resource even when no difference demands it.
    #[serde(default)]
    pub force_recreate: bool,
    /// Seconds to wait for a graceful stop.
    #[serde(default)]
    pub stop_timeout: Option<u32>,
    /// Pass `force` to the driver's remove call.
    #[serde(default)]
    pub force_remove: bool,
    /// Desired paused flag, enforced only for [`TargetState::Started`].
    /// `None` leaves the paused state alone.
    #[serde(default)]
    pub paused: Option<bool>,
}

/// A remedial step taken (or, in check mode, that would have been taken)
/// during a convergence pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Resource was created.
    Created { name: String },
    /// Resource was started.
    Started { id: String },
    /// Resource was stopped.
    Stopped { id: String },
    /// Resource was removed.
    Removed { id: String, force: bool },
    /// Named properties were updated in place.
    Updated { id: String, properties: Vec<String> },
    /// Resource was paused.
    Paused { id: String },
    /// Resource was unpaused.
    Unpaused { id: String },
}

/// Before/after projection of the recorded differences, included in the
/// report when diff mode is on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    /// Observed values of the differing properties.
    pub before: IndexMap<String, Value>,
    /// Desired values of the differing properties.
    pub after: IndexMap<String, Value>,
}

/// Outcome of one convergence pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// True when anything was (or, in check mode, would have been) changed.
    pub changed: bool,
    /// The remedial steps in execution order.
    pub actions: Vec<Action>,
    /// Every difference recorded during the pass, including run-state and
    /// existence transitions.
    pub differences: DifferenceTracker,
    /// Before/after projection, present in diff mode.
    pub diff: Option<StateDelta>,
    /// The resource as last observed. `None` when the target state is absent
    /// or the resource was created in check mode.
    pub resource: Option<ObservedResource>,
    /// When this report was generated.
    pub generated_at: DateTime<Utc>,
}

/// Drives resources toward a target state through a [`ResourceDriver`].
pub struct ConvergenceEngine<D: ResourceDriver> {
    driver: D,
    reconciler: Reconciler,
    options: ConvergeOptions,
    actions: Vec<Action>,
    tracker: DifferenceTracker,
    changed: bool,
}

impl<D: ResourceDriver> ConvergenceEngine<D> {
    /// Creates an engine with default options.
    pub fn new(driver: D, reconciler: Reconciler) -> Self {
        Self {
            driver,
            reconciler,
            options: ConvergeOptions::default(),
            actions: Vec::new(),
            tracker: DifferenceTracker::new(),
            changed: false,
        }
    }

    /// Sets the options for subsequent passes.
    pub fn with_options(mut self, options: ConvergeOptions) -> Self {
        self.options = options;
        self
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the wrapped driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// The actions accumulated by the most recent pass. Populated even when
    /// the pass aborted with an error, so operators can inspect what was
    /// already done before re-running.
    pub fn last_actions(&self) -> &[Action] {
        &self.actions
    }

    /// Runs one convergence pass.
    ///
    /// Fetches the resource, reconciles it against the desired configuration,
    /// issues the remedial driver calls the differences demand and converges
    /// the run state toward `target`. Any driver failure aborts the pass
    /// immediately; no rollback is attempted.
    pub fn converge(
        &mut self,
        name: &str,
        target: TargetState,
        desired: &DesiredState,
    ) -> Result<ConvergenceReport> {
        self.actions.clear();
        self.tracker = DifferenceTracker::new();
        self.changed = false;
        info!(
            resource = name,
            target = %target,
            check_mode = self.options.check_mode,
            "starting convergence pass"
        );

        let resource = match target {
            TargetState::Absent => {
                if let Some(existing) = self.driver.fetch(name)? {
                    self.absent(existing)?;
                }
                None
            }
            _ => self.present(name, target, desired)?,
        };

        let diff = if self.options.diff_mode {
            let (before, after) = self.tracker.before_after();
            Some(StateDelta { before, after })
        } else {
            None
        };

        info!(
            resource = name,
            changed = self.changed,
            actions = self.actions.len(),
            "convergence pass finished"
        );
        Ok(ConvergenceReport {
            changed: self.changed,
            actions: self.actions.clone(),
            differences: self.tracker.clone(),
            diff,
            resource,
            generated_at: Utc::now(),
        })
    }

    /// Converges toward an existing resource with the desired configuration.
    fn present(
        &mut self,
        name: &str,
        target: TargetState,
        desired: &DesiredState,
    ) -> Result<Option<ObservedResource>> {
        let fetched = self.driver.fetch(name)?;
        let (was_running, was_paused) = fetched
            .as_ref()
            .map(|r| (r.running, r.paused))
            .unwrap_or((false, false));

        let mut resource = match fetched {
            None => {
                debug!(resource = name, "no resource found");
                self.tracker.add("exists", true, false);
                self.create_resource(name, desired)?
            }
            Some(existing) => {
                let outcome = self.reconciler.reconcile(desired, &existing.properties);
                if self.options.force_recreate || outcome.requires_recreate() {
                    debug!(
                        resource = name,
                        forced = self.options.force_recreate,
                        properties = ?outcome.recreate_properties(),
                        "resource must be recreated"
                    );
                    self.tracker.merge(outcome.into_differences());
                    if existing.running {
                        self.stop_resource(&existing.id)?;
                    }
                    self.remove_resource(&existing.id)?;
                    self.create_resource(name, desired)?
                } else if outcome.changed() {
                    let properties = outcome.update_properties().to_vec();
                    self.tracker.merge(outcome.into_differences());
                    self.update_resource(&existing.id, desired, &properties)?;
                    if self.options.check_mode {
                        Some(existing)
                    } else {
                        // One re-fetch and re-compare after the update; a
                        // still-differing result is reported, never re-applied.
                        let refreshed = self.refetch(name, "update")?;
                        let after = self.reconciler.reconcile(desired, &refreshed.properties);
                        if after.changed() {
                            warn!(
                                resource = name,
                                properties = ?after.update_properties(),
                                "properties still differ after in-place update"
                            );
                        }
                        Some(refreshed)
                    }
                } else {
                    debug!(resource = name, "configuration matches");
                    Some(existing)
                }
            }
        };

        // Run-state convergence. Skipped when creation was elided by check
        // mode; the diff entries below still fire for existing resources in
        // check mode, without driver calls.
        let run_state = resource.as_ref().map(|r| (r.id.clone(), r.running));
        if let Some((id, running)) = run_state {
            match target {
                TargetState::Started if !running => {
                    self.tracker.add("running", true, was_running);
                    self.start_resource(&id)?;
                    resource = self.refresh(resource, name)?;
                }
                TargetState::Stopped if running => {
                    self.tracker.add("running", false, was_running);
                    self.stop_resource(&id)?;
                    resource = self.refresh(resource, name)?;
                }
                _ => {}
            }
        }

        if target == TargetState::Started {
            if let Some(want_paused) = self.options.paused {
                let pause_state = resource.as_ref().map(|r| (r.id.clone(), r.paused));
                if let Some((id, currently_paused)) = pause_state {
                    if currently_paused != want_paused {
                        self.tracker.add("paused", want_paused, was_paused);
                        self.set_paused(&id, want_paused)?;
                        resource = self.refresh(resource, name)?;
                    }
                }
            }
        }

        Ok(resource)
    }

    /// Converges toward the resource not existing.
    fn absent(&mut self, existing: ObservedResource) -> Result<()> {
        if existing.running {
            self.tracker.add("running", false, true);
            self.stop_resource(&existing.id)?;
        }
        self.tracker.add("exists", false, true);
        self.remove_resource(&existing.id)?;
        Ok(())
    }

    fn create_resource(
        &mut self,
        name: &str,
        desired: &DesiredState,
    ) -> Result<Option<ObservedResource>> {
        info!(resource = name, "creating resource");
        self.actions.push(Action::Created {
            name: name.to_string(),
        });
        self.changed = true;
        if self.options.check_mode {
            return Ok(None);
        }
        let created = self.driver.create(name, desired)?;
        Ok(Some(created))
    }

    fn update_resource(
        &mut self,
        id: &str,
        desired: &DesiredState,
        properties: &[String],
    ) -> Result<()> {
        info!(resource = id, ?properties, "updating resource in place");
        self.actions.push(Action::Updated {
            id: id.to_string(),
            properties: properties.to_vec(),
        });
        self.changed = true;
        if !self.options.check_mode {
            self.driver.update(id, desired, properties)?;
        }
        Ok(())
    }

    fn start_resource(&mut self, id: &str) -> Result<()> {
        info!(resource = id, "starting resource");
        self.actions.push(Action::Started { id: id.to_string() });
        self.changed = true;
        if !self.options.check_mode {
            self.driver.start(id)?;
        }
        Ok(())
    }

    fn stop_resource(&mut self, id: &str) -> Result<()> {
        info!(resource = id, "stopping resource");
        self.actions.push(Action::Stopped { id: id.to_string() });
        self.changed = true;
        if !self.options.check_mode {
            let timeout = self.options.stop_timeout;
            self.with_unpause_retry("stop", id, |driver| driver.stop(id, timeout))?;
        }
        Ok(())
    }

    fn remove_resource(&mut self, id: &str) -> Result<()> {
        let force = self.options.force_remove;
        info!(resource = id, force, "removing resource");
        self.actions.push(Action::Removed {
            id: id.to_string(),
            force,
        });
        self.changed = true;
        if !self.options.check_mode {
            self.with_unpause_retry("remove", id, |driver| driver.remove(id, force))?;
        }
        Ok(())
    }

    fn set_paused(&mut self, id: &str, paused: bool) -> Result<()> {
        info!(resource = id, paused, "changing paused state");
        self.actions.push(if paused {
            Action::Paused { id: id.to_string() }
        } else {
            Action::Unpaused { id: id.to_string() }
        });
        self.changed = true;
        if !self.options.check_mode {
            if paused {
                self.driver.pause(id)?;
            } else {
                self.driver.unpause(id)?;
            }
        }
        Ok(())
    }

    /// Retries an operation that the system refuses while the resource is
    /// paused, unpausing between attempts. The budget is fixed; a resource
    /// that some other actor keeps pausing must not trap the pass in a loop.
    fn with_unpause_retry<F>(&mut self, operation: &str, id: &str, mut call: F) -> Result<()>
    where
        F: FnMut(&mut D) -> Result<()>,
    {
        let mut unpauses: u32 = 0;
        loop {
            match call(&mut self.driver) {
                Ok(()) => return Ok(()),
                Err(Error::ResourcePaused { .. }) => {
                    if unpauses == UNPAUSE_RETRY_BUDGET {
                        return Err(Error::StuckPaused {
                            operation: operation.to_string(),
                            id: id.to_string(),
                            attempts: unpauses,
                        });
                    }
                    unpauses += 1;
                    debug!(
                        resource = id,
                        operation,
                        attempt = unpauses,
                        "resource is paused, unpausing and retrying"
                    );
                    self.driver.unpause(id)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetches the resource again after a mutating call, outside check mode.
    fn refresh(
        &mut self,
        current: Option<ObservedResource>,
        name: &str,
    ) -> Result<Option<ObservedResource>> {
        if self.options.check_mode {
            return Ok(current);
        }
        self.driver.fetch(name)
    }

    /// Fetches a resource that is expected to exist.
    fn refetch(&mut self, name: &str, operation: &str) -> Result<ObservedResource> {
        match self.driver.fetch(name)? {
            Some(resource) => Ok(resource),
            None => Err(Error::driver(
                operation,
                format!("resource '{}' disappeared during the pass", name),
            )),
        }
    }
}
