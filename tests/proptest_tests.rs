//! Property-based tests for Converge using proptest.
//!
//! These tests probe the comparison primitives and the difference tracker
//! with randomly generated values to find edge cases: unexpected panics,
//! violated algebraic properties (reflexivity, permutation invariance,
//! monotonicity), and ordering inconsistencies.

use converge::compare::{canonicalize, value_cmp};
use converge::prelude::*;
use proptest::collection::vec;
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// Strategies for generating test data
// ============================================================================

/// Strategy for generating short identifier-like strings.
fn short_string() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9_=./-]{0,12}").unwrap()
}

/// Strategy for generating arbitrary JSON values, bounded in depth and size.
fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        short_string().prop_map(Value::String),
    ];

    leaf.prop_recursive(
        3,  // depth
        32, // max nodes
        8,  // items per collection
        |inner| {
            prop_oneof![
                vec(inner.clone(), 0..5).prop_map(Value::Array),
                vec((short_string(), inner), 0..5).prop_map(|pairs| {
                    let mut map = serde_json::Map::new();
                    for (k, v) in pairs {
                        map.insert(k, v);
                    }
                    Value::Object(map)
                }),
            ]
        },
    )
}

/// Strategy for generating one of the five value shapes.
fn value_shape() -> impl Strategy<Value = ValueShape> {
    prop_oneof![
        Just(ValueShape::Scalar),
        Just(ValueShape::OrderedList),
        Just(ValueShape::Set),
        Just(ValueShape::Dict),
        Just(ValueShape::SetOfDict),
    ]
}

/// Strategy for generating one of the three comparison strategies.
fn compare_strategy() -> impl Strategy<Value = CompareStrategy> {
    prop_oneof![
        Just(CompareStrategy::Strict),
        Just(CompareStrategy::Ignore),
        Just(CompareStrategy::AllowMorePresent),
    ]
}

/// Strategy for generating a scalar set member. The numeric pools are small
/// and overlapping so integer and float spellings of the same value (2 vs
/// 2.0) land in the same set often.
fn scalar_member() -> impl Strategy<Value = Value> {
    prop_oneof![
        short_string().prop_map(Value::String),
        any::<bool>().prop_map(Value::Bool),
        (-4i64..=4).prop_map(|n| json!(n)),
        (-4i64..=4).prop_map(|n| json!(n as f64)),
        (0u32..=8).prop_map(|n| json!(f64::from(n) / 2.0)),
    ]
}

/// Strategy for generating a scalar set together with a permutation of it.
fn set_and_permutation() -> impl Strategy<Value = (Vec<Value>, Vec<Value>)> {
    vec(scalar_member(), 0..8).prop_flat_map(|items| {
        let original = Just(items.clone());
        (original, Just(items).prop_shuffle())
    })
}

// ============================================================================
// Comparison properties
// ============================================================================

mod comparison {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        /// Property: comparing arbitrary values never panics, whatever the
        /// shape and strategy claim about them
        #[test]
        fn comparing_arbitrary_values_never_panics(
            a in json_value(),
            b in json_value(),
            shape in value_shape(),
            strategy in compare_strategy(),
        ) {
            let _ = compare_values(&a, &b, shape, strategy);
        }

        /// Property: every value matches itself under every shape and strategy
        #[test]
        fn comparison_is_reflexive(
            v in json_value(),
            shape in value_shape(),
            strategy in compare_strategy(),
        ) {
            prop_assert!(compare_values(&v, &v, shape, strategy));
        }

        /// Property: ignore matches any pair of values
        #[test]
        fn ignore_matches_everything(
            a in json_value(),
            b in json_value(),
            shape in value_shape(),
        ) {
            prop_assert!(compare_values(&a, &b, shape, CompareStrategy::Ignore));
        }

        /// Property: strict set comparison is permutation invariant, also
        /// when members mix numeric representations
        #[test]
        fn strict_set_is_permutation_invariant(
            (original, shuffled) in set_and_permutation(),
        ) {
            prop_assert!(compare_values(
                &Value::Array(original),
                &Value::Array(shuffled),
                ValueShape::Set,
                CompareStrategy::Strict,
            ));
        }

        /// Property: adding entries to the observed side breaks strict but
        /// not allow_more_present
        #[test]
        fn superset_matches_only_allow_more_present(
            base in vec("[a-z]{1,6}", 0..6),
            extra in vec("[A-Z]{1,6}", 1..4),
        ) {
            // Uppercase extras cannot collide with the lowercase base.
            let desired = json!(base);
            let mut grown = base.clone();
            grown.extend(extra);
            let observed = json!(grown);

            prop_assert!(compare_values(
                &desired,
                &observed,
                ValueShape::Set,
                CompareStrategy::AllowMorePresent,
            ));
            prop_assert!(!compare_values(
                &desired,
                &observed,
                ValueShape::Set,
                CompareStrategy::Strict,
            ));
        }

        /// Property: any prefix of a matching desired set still matches
        /// under allow_more_present
        #[test]
        fn allow_more_present_is_monotone(
            (items, keep) in vec(short_string(), 1..8)
                .prop_flat_map(|v| { let len = v.len(); (Just(v), 0..=len) }),
        ) {
            let desired = json!(items[..keep]);
            let observed = json!(items);
            prop_assert!(compare_values(
                &desired,
                &observed,
                ValueShape::Set,
                CompareStrategy::AllowMorePresent,
            ));
        }

        /// Property: an unreported collection behaves exactly like an empty
        /// one
        #[test]
        fn null_observed_equals_empty_collection(
            items in vec(short_string(), 0..5),
            strategy in prop_oneof![
                Just(CompareStrategy::Strict),
                Just(CompareStrategy::AllowMorePresent),
            ],
        ) {
            let desired = json!(items);
            let against_null =
                compare_values(&desired, &Value::Null, ValueShape::Set, strategy);
            let against_empty =
                compare_values(&desired, &json!([]), ValueShape::Set, strategy);
            prop_assert_eq!(against_null, against_empty);
        }
    }
}

// ============================================================================
// Canonical ordering properties
// ============================================================================

mod ordering {
    use super::*;
    use std::cmp::Ordering;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        /// Property: the canonical order never panics and is antisymmetric
        #[test]
        fn value_order_reverses(a in json_value(), b in json_value()) {
            prop_assert_eq!(value_cmp(&a, &b), value_cmp(&b, &a).reverse());
        }

        /// Property: every value is equal to itself in the canonical order
        #[test]
        fn value_order_is_reflexive(a in json_value()) {
            prop_assert_eq!(value_cmp(&a, &a), Ordering::Equal);
        }

        /// Property: canonicalization is idempotent for every shape
        #[test]
        fn canonicalize_is_idempotent(v in json_value(), shape in value_shape()) {
            let once = canonicalize(shape, &v);
            let twice = canonicalize(shape, &once);
            prop_assert_eq!(once, twice);
        }

        /// Property: canonicalization never changes what a set contains
        #[test]
        fn canonicalize_preserves_set_membership(items in vec(json_value(), 0..8)) {
            let original = json!(items);
            let canonical = canonicalize(ValueShape::Set, &original);
            prop_assert!(compare_values(
                &original,
                &canonical,
                ValueShape::Set,
                CompareStrategy::Strict,
            ));
        }
    }
}

// ============================================================================
// Difference tracker properties
// ============================================================================

mod tracker {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property: the tracker holds at most one difference per property,
        /// and the last write wins
        #[test]
        fn tracker_deduplicates_properties(
            ops in vec(("[a-d]", any::<i64>(), any::<i64>()), 0..40),
        ) {
            let mut tracker = DifferenceTracker::new();
            for (name, desired, observed) in &ops {
                tracker.add(name.clone(), *desired, *observed);
            }

            let mut names: Vec<String> =
                tracker.iter().map(|d| d.property.clone()).collect();
            let recorded = names.len();
            names.sort();
            names.dedup();
            prop_assert_eq!(recorded, names.len());

            // The most recent add for a property is what the tracker holds.
            if let Some((name, desired, _)) = ops.last() {
                let diff = tracker.iter().find(|d| &d.property == name);
                prop_assert_eq!(diff.map(|d| d.desired.clone()), Some(json!(*desired)));
            }
        }

        /// Property: merge order preserves first-seen positions
        #[test]
        fn merge_never_grows_beyond_distinct_properties(
            first in vec(("[a-c]", any::<i32>()), 0..10),
            second in vec(("[b-e]", any::<i32>()), 0..10),
        ) {
            let mut left = DifferenceTracker::new();
            for (name, v) in &first {
                left.add(name.clone(), *v, 0);
            }
            let mut right = DifferenceTracker::new();
            for (name, v) in &second {
                right.add(name.clone(), *v, 0);
            }

            let mut distinct: Vec<&str> = first
                .iter()
                .map(|(n, _)| n.as_str())
                .chain(second.iter().map(|(n, _)| n.as_str()))
                .collect();
            distinct.sort_unstable();
            distinct.dedup();

            left.merge(right);
            prop_assert_eq!(left.len(), distinct.len());
        }
    }
}

// ============================================================================
// Override properties
// ============================================================================

mod overrides {
    use super::*;

    fn sample_table() -> PropertyTable {
        PropertyTable::builder()
            .property(PropertySpec::new("image", ValueShape::Scalar))
            .property(PropertySpec::new("env", ValueShape::Set))
            .property(PropertySpec::new("labels", ValueShape::Dict))
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property: parsing arbitrary override pairs never panics
        #[test]
        fn override_parsing_never_panics(
            pairs in vec(("[a-z*]{0,8}", "[a-z_]{0,24}"), 0..10),
        ) {
            let _ = ComparisonOverrides::from_pairs(
                pairs.iter().map(|(k, v)| (k.clone(), v.as_str())),
            );
        }

        /// Property: a strict or ignore wildcard always applies cleanly and
        /// preserves the table's size and lookup
        #[test]
        fn wildcard_application_preserves_table(
            strategy in prop_oneof![
                Just(CompareStrategy::Strict),
                Just(CompareStrategy::Ignore),
            ],
        ) {
            let table = sample_table();
            let tuned = ComparisonOverrides::new()
                .with_wildcard(strategy)
                .apply(&table)
                .unwrap();
            prop_assert_eq!(tuned.len(), table.len());
            for spec in tuned.specs() {
                prop_assert_eq!(spec.strategy, strategy);
                prop_assert!(table.get(&spec.name).is_some());
            }
        }
    }
}
