//! The reconciler: desired state vs observed state.
//!
//! [`Reconciler::reconcile`] walks a validated [`PropertyTable`] in
//! declaration order, compares each property of a [`DesiredState`] against an
//! [`ObservedState`] with the configured strategy, and records mismatches in
//! a [`DifferenceTracker`]. The result also carries the recreate-vs-update
//! classification of the mismatched properties, a pure mutability lookup that
//! drives the convergence state machine in [`crate::convergence`].
//!
//! Properties without a desired value are not enforced: absence means "do not
//! care", which is what makes a reconciliation pass idempotent from the
//! caller's point of view.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::compare::{canonicalize, compare_values, normalize_observed};
use crate::diff::DifferenceTracker;
use crate::property::{Mutability, PropertyTable};

/// The resource configuration requested by the caller.
///
/// Absence of a key means "not specified" and is distinct from a present but
/// empty value; unspecified properties are never enforced. An explicit null
/// value is treated as unspecified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesiredState(IndexMap<String, Value>);

impl DesiredState {
    /// Creates an empty desired state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Returns the value for a property, if specified.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// True when the property has a non-null desired value.
    pub fn specifies(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|v| !v.is_null())
    }

    /// Number of specified properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is specified.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the properties in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl From<IndexMap<String, Value>> for DesiredState {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

/// The resource configuration reported by the external system.
///
/// Always fetched fresh immediately before a comparison; absent values are
/// normalized per property shape during reconciliation, so a system that
/// reports "no entries" as null or a missing key does not produce spurious
/// diffs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservedState(IndexMap<String, Value>);

impl ObservedState {
    /// Creates an empty observed state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Returns the reported value for a property.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Number of reported properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the properties in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl From<IndexMap<String, Value>> for ObservedState {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reconciliation {
    differences: DifferenceTracker,
    recreate: Vec<String>,
    update: Vec<String>,
}

impl Reconciliation {
    /// True when any property mismatched.
    pub fn changed(&self) -> bool {
        !self.differences.is_empty()
    }

    /// The recorded differences, in property declaration order.
    pub fn differences(&self) -> &DifferenceTracker {
        &self.differences
    }

    /// Consumes the reconciliation, returning its tracker.
    pub fn into_differences(self) -> DifferenceTracker {
        self.differences
    }

    /// True when at least one mismatched property cannot be fixed in place.
    pub fn requires_recreate(&self) -> bool {
        !self.recreate.is_empty()
    }

    /// Names of mismatched properties that force a destroy-and-recreate.
    pub fn recreate_properties(&self) -> &[String] {
        &self.recreate
    }

    /// Names of mismatched properties fixable through an in-place update.
    pub fn update_properties(&self) -> &[String] {
        &self.update
    }
}

/// Compares desired against observed state over a property table.
#[derive(Debug, Clone)]
pub struct Reconciler {
    table: PropertyTable,
}

impl Reconciler {
    /// Creates a reconciler over an already-validated table.
    pub fn new(table: PropertyTable) -> Self {
        Self { table }
    }

    /// The table this reconciler walks.
    pub fn table(&self) -> &PropertyTable {
        &self.table
    }

    /// Runs one comparison pass.
    ///
    /// Walks the specs in declaration order; skips properties that are
    /// unsupported, have no desired value, or whose declared `requires`
    /// anchor has no desired value. Observed values are normalized per shape
    /// before comparison; mismatched values are canonicalized (unordered
    /// collections sorted) before recording, so diff reports are
    /// deterministic across runs.
    pub fn reconcile(&self, desired: &DesiredState, observed: &ObservedState) -> Reconciliation {
        let mut result = Reconciliation::default();

        for spec in self.table.specs() {
            if !spec.supported {
                trace!(property = %spec.name, "skipping unsupported property");
                continue;
            }
            let desired_value = match desired.get(&spec.name) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };
            if let Some(anchor) = &spec.requires {
                if !desired.specifies(anchor) {
                    trace!(
                        property = %spec.name,
                        anchor = %anchor,
                        "skipping property, its anchor is not specified"
                    );
                    continue;
                }
            }

            let observed_value = normalize_observed(spec.shape, observed.get(&spec.name));
            let matched = compare_values(desired_value, &observed_value, spec.shape, spec.strategy);
            trace!(
                property = %spec.name,
                strategy = %spec.strategy,
                shape = %spec.shape,
                matched,
                "compared property"
            );
            if matched {
                continue;
            }

            result.differences.add(
                spec.name.clone(),
                canonicalize(spec.shape, desired_value),
                canonicalize(spec.shape, &observed_value),
            );
            match spec.mutability {
                Mutability::RequiresRecreate => result.recreate.push(spec.name.clone()),
                Mutability::UpdatableInPlace => result.update.push(spec.name.clone()),
            }
        }

        result
    }
}
