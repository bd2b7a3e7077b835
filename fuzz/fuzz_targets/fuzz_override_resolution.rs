//! Fuzz target for comparison override parsing and name resolution.
//!
//! This fuzzer tests override construction against the full container
//! property table with arbitrary property names and strategy spellings.

#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;

use converge::container::{container_property_table, ApiCapabilities};
use converge::property::ComparisonOverrides;

/// Arbitrary strategy spelling for fuzzing
#[derive(Debug, Clone, Arbitrary)]
enum FuzzStrategyName {
    Strict,
    AllowMorePresent,
    Ignore,
    Wildcard,
    Raw(String),
}

impl FuzzStrategyName {
    fn as_str(&self) -> &str {
        match self {
            FuzzStrategyName::Strict => "strict",
            FuzzStrategyName::AllowMorePresent => "allow_more_present",
            FuzzStrategyName::Ignore => "ignore",
            FuzzStrategyName::Wildcard => "*",
            FuzzStrategyName::Raw(s) => s,
        }
    }
}

/// Arbitrary override pair for fuzzing
#[derive(Debug, Clone, Arbitrary)]
struct FuzzOverride {
    name: String,
    strategy: FuzzStrategyName,
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut unstructured = Unstructured::new(data);

    let Ok(pairs) = Vec::<FuzzOverride>::arbitrary(&mut unstructured) else {
        return;
    };
    if pairs.len() > 64 {
        return;
    }

    let caps = ApiCapabilities::default();
    let Ok(table) = container_property_table(&caps) else {
        return;
    };

    // Parsing arbitrary override pairs must never panic. Unknown strategy
    // spellings are rejected with an error.
    let parsed = ComparisonOverrides::from_pairs(
        pairs
            .iter()
            .map(|o| (o.name.as_str(), o.strategy.as_str())),
    );

    if let Ok(overrides) = parsed {
        // Application resolves names and aliases against the table. It must
        // either fail cleanly or produce a table of identical width.
        if let Ok(applied) = overrides.apply(&table) {
            assert_eq!(applied.len(), table.len());
        }
    }

    // Name resolution itself must be total over arbitrary strings.
    if let Ok(name) = String::arbitrary(&mut unstructured) {
        let _ = table.resolve(&name);
        let _ = table.get(&name);
    }
});
