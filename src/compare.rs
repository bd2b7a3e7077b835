//! Value comparison strategies.
//!
//! The comparator decides whether a desired property value and an observed
//! property value are equivalent. How "equivalent" is judged depends on two
//! axes configured per property:
//!
//! - the [`ValueShape`] of the property (scalar, ordered list, set, dict,
//!   set of dicts), and
//! - the [`CompareStrategy`] (strict, ignore, allow more present).
//!
//! [`compare_values`] is a pure function over already-fetched data: given a
//! valid shape/strategy combination it cannot fail at runtime. The one invalid
//! combination, [`CompareStrategy::AllowMorePresent`] on a
//! [`ValueShape::Scalar`], is rejected eagerly when a property table is built
//! (see [`crate::property`]), never at comparison time.
//!
//! Values are [`serde_json::Value`] so the comparator stays agnostic to where
//! desired and observed state came from.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// ============================================================================
// Strategy and Shape
// ============================================================================

/// How a property's desired and observed values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareStrategy {
    /// Values must be equivalent: exact for scalars and dicts, ordered for
    /// lists, order-independent for sets.
    Strict,
    /// Differences are never reported. Used to suppress properties the caller
    /// does not want to enforce.
    Ignore,
    /// The observed value may carry more than the desired value: extra set
    /// elements, extra dict keys, extra entries in matched dicts. Only valid
    /// for collection shapes.
    AllowMorePresent,
}

impl CompareStrategy {
    /// Returns true if this strategy can be applied to values of the given
    /// shape. `AllowMorePresent` has no meaning for a scalar, which cannot be
    /// a superset of another value.
    pub fn valid_for(self, shape: ValueShape) -> bool {
        !(self == CompareStrategy::AllowMorePresent && shape == ValueShape::Scalar)
    }

    /// Returns the canonical string form.
    pub fn as_str(self) -> &'static str {
        match self {
            CompareStrategy::Strict => "strict",
            CompareStrategy::Ignore => "ignore",
            CompareStrategy::AllowMorePresent => "allow_more_present",
        }
    }
}

impl fmt::Display for CompareStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompareStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(CompareStrategy::Strict),
            "ignore" => Ok(CompareStrategy::Ignore),
            "allow_more_present" => Ok(CompareStrategy::AllowMorePresent),
            other => Err(Error::UnknownStrategy(other.to_string())),
        }
    }
}

/// The shape of a property's value, which constrains how it is compared and
/// how absent observed values are defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueShape {
    /// A single value: string, number or boolean.
    #[serde(rename = "value")]
    Scalar,
    /// A sequence whose element order is significant.
    #[serde(rename = "list")]
    OrderedList,
    /// A collection whose element order is not significant.
    #[serde(rename = "set")]
    Set,
    /// A key-value mapping.
    #[serde(rename = "dict")]
    Dict,
    /// An order-insignificant collection of mappings.
    #[serde(rename = "set(dict)")]
    SetOfDict,
}

impl ValueShape {
    /// Returns the canonical string form.
    pub fn as_str(self) -> &'static str {
        match self {
            ValueShape::Scalar => "value",
            ValueShape::OrderedList => "list",
            ValueShape::Set => "set",
            ValueShape::Dict => "dict",
            ValueShape::SetOfDict => "set(dict)",
        }
    }

    /// Returns true for the shapes whose absent observed value defaults to an
    /// empty array.
    fn is_sequence(self) -> bool {
        matches!(
            self,
            ValueShape::OrderedList | ValueShape::Set | ValueShape::SetOfDict
        )
    }
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "value" => Ok(ValueShape::Scalar),
            "list" => Ok(ValueShape::OrderedList),
            "set" => Ok(ValueShape::Set),
            "dict" => Ok(ValueShape::Dict),
            "set(dict)" => Ok(ValueShape::SetOfDict),
            other => Err(Error::UnknownShape(other.to_string())),
        }
    }
}

// ============================================================================
// Comparison
// ============================================================================

/// Compares a desired value against an observed value.
///
/// Returns true when the values match under the given shape and strategy.
/// Null on either side stands for "no value": two nulls match, a null against
/// an empty collection matches for the collection shapes, and a null desired
/// side never constrains an `AllowMorePresent` comparison.
pub fn compare_values(
    desired: &Value,
    observed: &Value,
    shape: ValueShape,
    strategy: CompareStrategy,
) -> bool {
    match strategy {
        CompareStrategy::Ignore => true,
        _ if desired.is_null() || observed.is_null() => {
            null_sided_match(desired, observed, shape, strategy)
        }
        CompareStrategy::Strict => strict_match(desired, observed, shape),
        CompareStrategy::AllowMorePresent => superset_match(desired, observed, shape),
    }
}

/// Comparison when at least one side is null.
fn null_sided_match(
    desired: &Value,
    observed: &Value,
    shape: ValueShape,
    strategy: CompareStrategy,
) -> bool {
    if desired.is_null() && observed.is_null() {
        return true;
    }
    if shape == ValueShape::Scalar {
        return false;
    }
    if strategy == CompareStrategy::AllowMorePresent && desired.is_null() {
        return true;
    }
    // Null and an empty collection are equivalent for collection shapes.
    let present = if desired.is_null() { observed } else { desired };
    match present {
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
        _ => false,
    }
}

fn strict_match(desired: &Value, observed: &Value, shape: ValueShape) -> bool {
    match shape {
        ValueShape::Scalar | ValueShape::OrderedList | ValueShape::Dict => desired == observed,
        ValueShape::Set | ValueShape::SetOfDict => {
            match (desired.as_array(), observed.as_array()) {
                (Some(a), Some(b)) => multiset_eq(a, b),
                // Misshapen operands degrade to plain equality.
                _ => desired == observed,
            }
        }
    }
}

fn superset_match(desired: &Value, observed: &Value, shape: ValueShape) -> bool {
    match shape {
        // Rejected at table build; equality if called directly.
        ValueShape::Scalar => desired == observed,
        ValueShape::OrderedList => match (desired.as_array(), observed.as_array()) {
            (Some(a), Some(b)) => is_subsequence(a, b),
            _ => desired == observed,
        },
        ValueShape::Set => match (desired.as_array(), observed.as_array()) {
            (Some(a), Some(b)) => a.iter().all(|item| b.contains(item)),
            _ => desired == observed,
        },
        ValueShape::Dict => match (desired.as_object(), observed.as_object()) {
            (Some(a), Some(b)) => a.iter().all(|(k, v)| b.get(k) == Some(v)),
            _ => desired == observed,
        },
        ValueShape::SetOfDict => match (desired.as_array(), observed.as_array()) {
            (Some(a), Some(b)) => a
                .iter()
                .all(|entry| b.iter().any(|candidate| entry_subsumed(entry, candidate))),
            _ => desired == observed,
        },
    }
}

/// True when `candidate` carries at least every entry of `desired_entry`.
/// Non-object operands fall back to equality.
fn entry_subsumed(desired_entry: &Value, candidate: &Value) -> bool {
    match (desired_entry.as_object(), candidate.as_object()) {
        (Some(d), Some(c)) => d.iter().all(|(k, v)| c.get(k) == Some(v)),
        _ => desired_entry == candidate,
    }
}

/// Equality as multisets: same length and same elements with the same
/// multiplicities, regardless of order.
fn multiset_eq(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut sorted_a: Vec<&Value> = a.iter().collect();
    let mut sorted_b: Vec<&Value> = b.iter().collect();
    sorted_a.sort_by(|x, y| value_cmp(x, y));
    sorted_b.sort_by(|x, y| value_cmp(x, y));
    sorted_a == sorted_b
}

/// True when `a` occurs within `b` as an order-preserving subsequence.
fn is_subsequence(a: &[Value], b: &[Value]) -> bool {
    let mut rest = b.iter();
    a.iter().all(|item| rest.any(|candidate| candidate == item))
}

// ============================================================================
// Normalization
// ============================================================================

/// Defaults an absent observed value per shape before comparison, so that a
/// system reporting "no entries" as null does not produce spurious diffs
/// against an empty desired collection.
pub fn normalize_observed(shape: ValueShape, value: Option<&Value>) -> Value {
    match value {
        Some(v) if !v.is_null() => v.clone(),
        _ if shape.is_sequence() => Value::Array(Vec::new()),
        _ if shape == ValueShape::Dict => Value::Object(Map::new()),
        _ => Value::Null,
    }
}

/// Normalizes a value for display in a diff report.
///
/// Members of order-insignificant collections are sorted under a stable total
/// order so recorded diffs are deterministic and reproducible across runs.
/// Other shapes pass through unchanged.
pub fn canonicalize(shape: ValueShape, value: &Value) -> Value {
    match (shape, value) {
        (ValueShape::Set | ValueShape::SetOfDict, Value::Array(items)) => {
            let mut sorted = items.clone();
            sorted.sort_by(value_cmp);
            Value::Array(sorted)
        }
        _ => value.clone(),
    }
}

/// Total order over JSON values.
///
/// Values of different types order by type rank (null, bool, number, string,
/// array, object); same-type values compare structurally. Objects compare by
/// their key-sorted entry lists, which is what makes sorting a set of dicts
/// deterministic. The order refines equality: two values compare `Equal` iff
/// they are `==`, so sorting two arrays of the same multiset aligns them
/// element for element.
pub fn value_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => number_cmp(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xi, yi) in x.iter().zip(y.iter()) {
                match value_cmp(xi, yi) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            let mut ex: Vec<(&String, &Value)> = x.iter().collect();
            let mut ey: Vec<(&String, &Value)> = y.iter().collect();
            ex.sort_by(|l, r| l.0.cmp(r.0));
            ey.sort_by(|l, r| l.0.cmp(r.0));
            for ((kx, vx), (ky, vy)) in ex.iter().zip(ey.iter()) {
                match kx.cmp(ky).then_with(|| value_cmp(vx, vy)) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            ex.len().cmp(&ey.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

fn number_cmp(a: &serde_json::Number, b: &serde_json::Number) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x.cmp(&y);
    }
    let x = a.as_f64().unwrap_or(0.0);
    let y = b.as_f64().unwrap_or(0.0);
    // Equal-valued numbers in mixed representations (1 vs 1.0) order
    // integer-first; `Equal` here must coincide with serde_json `==`.
    x.partial_cmp(&y)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.is_f64().cmp(&b.is_f64()))
}
