//! Property specifications and the per-resource property table.
//!
//! A [`PropertySpec`] describes one reconcilable property of a resource type:
//! its value shape, how it is compared, whether a mismatch can be fixed in
//! place or forces a recreate, and whether the current external system
//! supports it at all. A [`PropertyTable`] is the static, validated collection
//! of specs for one resource type, built once at startup.
//!
//! [`ComparisonOverrides`] lets a caller adjust comparison strategies per
//! invocation without touching the table definition: a `*` wildcard first,
//! explicit per-property entries second. The wildcard-then-per-key precedence
//! is applied in that order by construction, not by map iteration accident.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compare::{CompareStrategy, ValueShape};
use crate::error::{Error, Result};

/// Whether a mismatched property can be fixed without recreating the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
    /// The property is baked in at creation; fixing it means destroying and
    /// recreating the resource.
    RequiresRecreate,
    /// The property can be changed through an in-place update call.
    UpdatableInPlace,
}

impl fmt::Display for Mutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutability::RequiresRecreate => f.write_str("requires_recreate"),
            Mutability::UpdatableInPlace => f.write_str("updatable_in_place"),
        }
    }
}

fn default_strategy(shape: ValueShape) -> CompareStrategy {
    match shape {
        ValueShape::Scalar | ValueShape::OrderedList => CompareStrategy::Strict,
        ValueShape::Set | ValueShape::Dict | ValueShape::SetOfDict => {
            CompareStrategy::AllowMorePresent
        }
    }
}

fn default_true() -> bool {
    true
}

/// Specification of one reconcilable property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySpec {
    /// Canonical property name, the key into desired and observed state.
    pub name: String,
    /// Shape of the property's value.
    pub shape: ValueShape,
    /// How desired and observed values are compared.
    pub strategy: CompareStrategy,
    /// Whether a mismatch can be fixed in place.
    pub mutability: Mutability,
    /// Capability gate: false when the external system's version does not
    /// support this property, in which case the reconciler skips it.
    #[serde(default = "default_true")]
    pub supported: bool,
    /// Name of a companion property this one depends on. The property is only
    /// enforced when the companion also has a desired value.
    #[serde(default)]
    pub requires: Option<String>,
    /// Alternative names accepted when resolving comparison overrides.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl PropertySpec {
    /// Creates a spec with the defaults used throughout: strict comparison
    /// for scalars and ordered lists, allow-more-present for the collection
    /// shapes, recreate-on-mismatch, supported.
    pub fn new(name: impl Into<String>, shape: ValueShape) -> Self {
        Self {
            name: name.into(),
            shape,
            strategy: default_strategy(shape),
            mutability: Mutability::RequiresRecreate,
            supported: true,
            requires: None,
            aliases: Vec::new(),
        }
    }

    /// Sets the comparison strategy.
    pub fn with_strategy(mut self, strategy: CompareStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Marks the property as fixable through an in-place update call.
    pub fn updatable(mut self) -> Self {
        self.mutability = Mutability::UpdatableInPlace;
        self
    }

    /// Sets the capability gate.
    pub fn with_supported(mut self, supported: bool) -> Self {
        self.supported = supported;
        self
    }

    /// Declares that this property is only enforced when `anchor` also has a
    /// desired value.
    pub fn requires(mut self, anchor: impl Into<String>) -> Self {
        self.requires = Some(anchor.into());
        self
    }

    /// Adds an alternative name accepted by comparison overrides.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// Validated, ordered collection of property specs for one resource type.
///
/// Declaration order is preserved; it determines diff report ordering, not
/// correctness. Built through [`PropertyTable::builder`], which performs the
/// eager validation: invalid shape/strategy combinations, duplicate names and
/// alias collisions, and dangling `requires` references are all fatal at
/// build time.
#[derive(Debug, Clone)]
pub struct PropertyTable {
    specs: Vec<PropertySpec>,
    // alias or canonical name -> index into specs
    index: IndexMap<String, usize>,
}

impl PropertyTable {
    /// Starts building a table.
    pub fn builder() -> PropertyTableBuilder {
        PropertyTableBuilder { specs: Vec::new() }
    }

    /// The specs in declaration order.
    pub fn specs(&self) -> &[PropertySpec] {
        &self.specs
    }

    /// Looks up a spec by canonical name or alias.
    pub fn get(&self, name: &str) -> Option<&PropertySpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    /// Resolves a canonical name or alias to the canonical name.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&i| self.specs[i].name.as_str())
    }

    /// Number of specs in the table.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True when the table holds no specs.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Iterates the specs in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, PropertySpec> {
        self.specs.iter()
    }
}

impl<'a> IntoIterator for &'a PropertyTable {
    type Item = &'a PropertySpec;
    type IntoIter = std::slice::Iter<'a, PropertySpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}

/// Builder for [`PropertyTable`].
#[derive(Debug, Default)]
pub struct PropertyTableBuilder {
    specs: Vec<PropertySpec>,
}

impl PropertyTableBuilder {
    /// Adds a spec to the table.
    pub fn property(mut self, spec: PropertySpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Adds all specs from an iterator.
    pub fn properties(mut self, specs: impl IntoIterator<Item = PropertySpec>) -> Self {
        self.specs.extend(specs);
        self
    }

    /// Validates and builds the table.
    pub fn build(self) -> Result<PropertyTable> {
        let mut index: IndexMap<String, usize> = IndexMap::new();
        for (i, spec) in self.specs.iter().enumerate() {
            if spec.name.is_empty() {
                return Err(Error::EmptyPropertyName);
            }
            if !spec.strategy.valid_for(spec.shape) {
                return Err(Error::invalid_comparison(
                    &spec.name,
                    spec.strategy,
                    spec.shape,
                ));
            }
            if index.insert(spec.name.clone(), i).is_some() {
                return Err(Error::DuplicateProperty(spec.name.clone()));
            }
            for alias in &spec.aliases {
                if alias.is_empty() {
                    return Err(Error::EmptyPropertyName);
                }
                if index.insert(alias.clone(), i).is_some() {
                    return Err(Error::DuplicateProperty(alias.clone()));
                }
            }
        }
        for spec in &self.specs {
            if let Some(anchor) = &spec.requires {
                let known = index
                    .get(anchor)
                    .map(|&i| self.specs[i].name == *anchor)
                    .unwrap_or(false);
                if !known {
                    return Err(Error::UnknownRequirement {
                        property: spec.name.clone(),
                        requires: anchor.clone(),
                    });
                }
            }
        }
        Ok(PropertyTable {
            specs: self.specs,
            index,
        })
    }
}

/// Per-invocation comparison strategy adjustments.
///
/// The wildcard is applied first and may only force `strict` or `ignore`;
/// forcing `allow_more_present` globally is rejected because scalar
/// properties cannot support it. Explicit per-property entries are applied
/// second and win over the wildcard. Entries may name an alias, but naming
/// the same property through two different aliases is rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonOverrides {
    wildcard: Option<CompareStrategy>,
    overrides: IndexMap<String, CompareStrategy>,
}

impl ComparisonOverrides {
    /// Creates an empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the wildcard strategy applied to every property.
    pub fn with_wildcard(mut self, strategy: CompareStrategy) -> Self {
        self.wildcard = Some(strategy);
        self
    }

    /// Sets the strategy for one property (canonical name or alias).
    pub fn with_override(
        mut self,
        name: impl Into<String>,
        strategy: CompareStrategy,
    ) -> Self {
        self.overrides.insert(name.into(), strategy);
        self
    }

    /// Parses an override set from string pairs, as carried in configuration
    /// documents: a `*` key is the wildcard, everything else is per-property.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut parsed = Self::new();
        for (key, value) in pairs {
            let key = key.into();
            let strategy: CompareStrategy = value.as_ref().parse()?;
            if key == "*" {
                if strategy == CompareStrategy::AllowMorePresent {
                    return Err(Error::InvalidWildcard(strategy.to_string()));
                }
                parsed.wildcard = Some(strategy);
            } else {
                parsed.overrides.insert(key, strategy);
            }
        }
        Ok(parsed)
    }

    /// True when no wildcard and no per-property entries are set.
    pub fn is_empty(&self) -> bool {
        self.wildcard.is_none() && self.overrides.is_empty()
    }

    /// Applies the overrides to a table, producing an adjusted copy.
    ///
    /// The returned table is re-validated, so an override that produces an
    /// invalid combination surfaces as the same configuration error the
    /// builder would raise.
    pub fn apply(&self, table: &PropertyTable) -> Result<PropertyTable> {
        let mut specs = table.specs.clone();

        // Wildcard first. Applies uniformly to every property in the table.
        if let Some(strategy) = self.wildcard {
            if strategy == CompareStrategy::AllowMorePresent {
                return Err(Error::InvalidWildcard(strategy.to_string()));
            }
            debug!(strategy = %strategy, "applying wildcard comparison override");
            for spec in &mut specs {
                spec.strategy = strategy;
            }
        }

        // Explicit per-property overrides second; they win over the wildcard.
        let mut used: IndexMap<String, String> = IndexMap::new();
        for (key, &strategy) in &self.overrides {
            let idx = match table.index.get(key) {
                Some(&i) => i,
                None => return Err(Error::UnknownProperty(key.clone())),
            };
            let canonical = specs[idx].name.clone();
            if let Some(first) = used.get(&canonical) {
                if first != key {
                    return Err(Error::AmbiguousOverride {
                        property: canonical,
                        first: first.clone(),
                        second: key.clone(),
                    });
                }
            }
            used.insert(canonical.clone(), key.clone());
            if !strategy.valid_for(specs[idx].shape) {
                return Err(Error::invalid_comparison(
                    canonical,
                    strategy,
                    specs[idx].shape,
                ));
            }
            debug!(property = %canonical, strategy = %strategy, "applying comparison override");
            specs[idx].strategy = strategy;
        }

        PropertyTable::builder().properties(specs).build()
    }
}
