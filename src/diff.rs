//! Difference tracking and diff reporting.
//!
//! A [`DifferenceTracker`] accumulates the named mismatches found during a
//! reconciliation pass. It stays deliberately dumb: it records what it is
//! given, in the order it is given, and projects the result into the report
//! formats the surrounding tooling expects (a machine-readable entry list, a
//! before/after document pair for diff mode, a unified text diff for humans).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use tracing::debug;

/// One mismatch between a desired and an observed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    /// Property name.
    pub property: String,
    /// The value requested by the caller.
    pub desired: Value,
    /// The value reported by the external system.
    pub observed: Value,
}

/// An entry of the structured diff report.
///
/// `parameter` carries the desired value and `active` the observed one,
/// matching the field names of the wider tooling's diff output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Property name.
    pub property: String,
    /// Desired value.
    pub parameter: Value,
    /// Observed value.
    pub active: Value,
}

/// Ordered accumulator of property differences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DifferenceTracker {
    differences: Vec<Difference>,
}

impl DifferenceTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a difference.
    ///
    /// A property is expected to be added at most once per pass. A second
    /// `add` for the same property overwrites the recorded values in place,
    /// keeping the property's original position, so the tracker stays total
    /// instead of panicking on a caller bug.
    pub fn add(
        &mut self,
        property: impl Into<String>,
        desired: impl Into<Value>,
        observed: impl Into<Value>,
    ) {
        let property = property.into();
        let desired = desired.into();
        let observed = observed.into();
        if let Some(existing) = self
            .differences
            .iter_mut()
            .find(|d| d.property == property)
        {
            debug!(property = %property, "difference recorded twice, overwriting");
            existing.desired = desired;
            existing.observed = observed;
            return;
        }
        self.differences.push(Difference {
            property,
            desired,
            observed,
        });
    }

    /// Appends another tracker's differences, preserving their order. Entries
    /// for an already-recorded property overwrite in place.
    pub fn merge(&mut self, other: DifferenceTracker) {
        for diff in other.differences {
            self.add(diff.property, diff.desired, diff.observed);
        }
    }

    /// True when no differences have been recorded.
    pub fn is_empty(&self) -> bool {
        self.differences.is_empty()
    }

    /// Number of recorded differences.
    pub fn len(&self) -> usize {
        self.differences.len()
    }

    /// True when a difference has been recorded for `property`.
    pub fn has_difference_for(&self, property: &str) -> bool {
        self.differences.iter().any(|d| d.property == property)
    }

    /// Iterates the differences in recording order.
    pub fn iter(&self) -> std::slice::Iter<'_, Difference> {
        self.differences.iter()
    }

    /// Projects the differences into the structured report format. Pure
    /// projection, no business logic.
    pub fn report(&self) -> Vec<DiffEntry> {
        self.differences
            .iter()
            .map(|d| DiffEntry {
                property: d.property.clone(),
                parameter: d.desired.clone(),
                active: d.observed.clone(),
            })
            .collect()
    }

    /// Projects the differences into a before/after document pair: before
    /// holds the observed values, after the desired ones. Feeds diff-mode
    /// output.
    pub fn before_after(&self) -> (IndexMap<String, Value>, IndexMap<String, Value>) {
        let mut before = IndexMap::new();
        let mut after = IndexMap::new();
        for diff in &self.differences {
            before.insert(diff.property.clone(), diff.observed.clone());
            after.insert(diff.property.clone(), diff.desired.clone());
        }
        (before, after)
    }

    /// Renders the before/after documents as a human-readable unified diff.
    pub fn render_unified(&self) -> String {
        let (before, after) = self.before_after();
        let old = serde_json::to_string_pretty(&before).unwrap_or_default();
        let new = serde_json::to_string_pretty(&after).unwrap_or_default();

        let diff = TextDiff::from_lines(&old, &new);
        let mut output = String::new();
        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                ChangeTag::Insert => '+',
                ChangeTag::Delete => '-',
                ChangeTag::Equal => ' ',
            };
            output.push(sign);
            output.push_str(change.value().trim_end());
            output.push('\n');
        }
        output
    }
}

impl<'a> IntoIterator for &'a DifferenceTracker {
    type Item = &'a Difference;
    type IntoIter = std::slice::Iter<'a, Difference>;

    fn into_iter(self) -> Self::IntoIter {
        self.differences.iter()
    }
}
