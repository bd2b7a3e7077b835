//! Fuzz target for value comparison and canonical ordering.
//!
//! This fuzzer tests the comparison primitives with arbitrary values,
//! including values whose structure does not match the declared shape.

#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

use converge::compare::{canonicalize, compare_values, value_cmp, CompareStrategy, ValueShape};

/// Arbitrary scalar for fuzzing
#[derive(Debug, Clone, Arbitrary)]
enum FuzzScalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FuzzScalar {
    fn as_value(&self) -> Value {
        match self {
            FuzzScalar::Null => Value::Null,
            FuzzScalar::Bool(b) => Value::Bool(*b),
            FuzzScalar::Int(n) => Value::from(*n),
            // NaN and infinities have no JSON representation.
            FuzzScalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FuzzScalar::Text(s) => Value::from(s.clone()),
        }
    }
}

/// Arbitrary value of bounded depth for fuzzing
#[derive(Debug, Clone, Arbitrary)]
enum FuzzValue {
    Scalar(FuzzScalar),
    List(Vec<FuzzScalar>),
    Map(Vec<(String, FuzzScalar)>),
    ListOfMaps(Vec<Vec<(String, FuzzScalar)>>),
}

impl FuzzValue {
    fn as_value(&self) -> Value {
        match self {
            FuzzValue::Scalar(s) => s.as_value(),
            FuzzValue::List(items) => Value::Array(items.iter().map(FuzzScalar::as_value).collect()),
            FuzzValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.as_value()))
                    .collect(),
            ),
            FuzzValue::ListOfMaps(dicts) => Value::Array(
                dicts
                    .iter()
                    .map(|entries| {
                        Value::Object(
                            entries
                                .iter()
                                .map(|(k, v)| (k.clone(), v.as_value()))
                                .collect(),
                        )
                    })
                    .collect(),
            ),
        }
    }
}

/// Arbitrary shape for fuzzing
#[derive(Debug, Clone, Copy, Arbitrary)]
enum FuzzShape {
    Scalar,
    OrderedList,
    Set,
    SetOfDict,
    Dict,
}

impl FuzzShape {
    fn as_shape(self) -> ValueShape {
        match self {
            FuzzShape::Scalar => ValueShape::Scalar,
            FuzzShape::OrderedList => ValueShape::OrderedList,
            FuzzShape::Set => ValueShape::Set,
            FuzzShape::SetOfDict => ValueShape::SetOfDict,
            FuzzShape::Dict => ValueShape::Dict,
        }
    }
}

/// Arbitrary strategy for fuzzing
#[derive(Debug, Clone, Copy, Arbitrary)]
enum FuzzStrategy {
    Strict,
    AllowMorePresent,
    Ignore,
}

impl FuzzStrategy {
    fn as_strategy(self) -> CompareStrategy {
        match self {
            FuzzStrategy::Strict => CompareStrategy::Strict,
            FuzzStrategy::AllowMorePresent => CompareStrategy::AllowMorePresent,
            FuzzStrategy::Ignore => CompareStrategy::Ignore,
        }
    }
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut unstructured = Unstructured::new(data);

    let Ok(desired) = FuzzValue::arbitrary(&mut unstructured) else {
        return;
    };
    let Ok(observed) = FuzzValue::arbitrary(&mut unstructured) else {
        return;
    };
    let desired = desired.as_value();
    let observed = observed.as_value();

    // Every shape/strategy combination must accept every value, including
    // values that do not match the declared shape.
    for shape in [
        FuzzShape::Scalar,
        FuzzShape::OrderedList,
        FuzzShape::Set,
        FuzzShape::SetOfDict,
        FuzzShape::Dict,
    ] {
        for strategy in [
            FuzzStrategy::Strict,
            FuzzStrategy::AllowMorePresent,
            FuzzStrategy::Ignore,
        ] {
            let matched = compare_values(
                &desired,
                &observed,
                shape.as_shape(),
                strategy.as_strategy(),
            );

            // Ignore matches everything.
            if matches!(strategy, FuzzStrategy::Ignore) {
                assert!(matched);
            }

            // A value always satisfies itself.
            assert!(compare_values(
                &desired,
                &desired,
                shape.as_shape(),
                strategy.as_strategy(),
            ));
        }

        // Canonicalization is idempotent for every shape.
        let once = canonicalize(shape.as_shape(), &desired);
        let twice = canonicalize(shape.as_shape(), &once);
        assert_eq!(once, twice);
    }

    // The canonical ordering must be a total order.
    let ordering = value_cmp(&desired, &observed);
    assert_eq!(ordering.reverse(), value_cmp(&observed, &desired));
    assert_eq!(value_cmp(&desired, &desired), std::cmp::Ordering::Equal);
});
