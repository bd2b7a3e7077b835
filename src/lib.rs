//! # Converge - Declarative State Reconciliation for External Resources
//!
//! Converge compares the desired configuration of an external resource
//! against its observed state and drives the minimal set of actions that
//! makes the two agree. It was built for container management but the core
//! is resource-agnostic: any system that can be inspected into a JSON-like
//! document and manipulated through create/update/remove/start/stop calls
//! can be reconciled.
//!
//! ## Core Concepts
//!
//! - **Property table**: The static description of every reconcilable
//!   property of a resource type: value shape, comparison strategy,
//!   in-place updatability, capability gate
//! - **Comparison strategies**: `strict`, `ignore` and `allow_more_present`,
//!   the last one treating the desired value as a lower bound
//! - **Difference tracker**: An ordered record of every mismatched property
//!   with both sides canonicalized for display
//! - **Reconciler**: Walks the table, compares desired against observed and
//!   classifies each mismatch as update-in-place or recreate
//! - **Convergence engine**: Turns a reconciliation outcome into driver
//!   calls, honoring check mode and target run states
//! - **Resource driver**: The trait a concrete backend implements; the
//!   engine never talks to an external system directly
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Typed Configuration                           │
//! │            (ContainerSpec or any desired-state document)             │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │ desired state
//!                                    ▼
//! ┌─────────────────────┐   ┌─────────────────────────────────────────┐
//! │   Property Table    │──▶│               Reconciler                │
//! │ (shapes, strategies,│   │   (compare per spec, track differences, │
//! │  mutability, gates) │   │    classify update vs recreate)         │
//! └─────────────────────┘   └─────────────────────────────────────────┘
//!           ▲                                  │ reconciliation
//!           │ overrides                        ▼
//! ┌─────────────────────┐   ┌─────────────────────────────────────────┐
//! │ ComparisonOverrides │   │           Convergence Engine            │
//! │  (wildcard + per-   │   │  (create / recreate / update / start /  │
//! │   property tuning)  │   │   stop / pause, check and diff modes)   │
//! └─────────────────────┘   └─────────────────────────────────────────┘
//!                                              │ driver calls
//!                                              ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          ResourceDriver                              │
//! │              (the one trait a backend implements)                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use converge::prelude::*;
//!
//! fn main() -> Result<()> {
//!     // Load the desired configuration
//!     let spec = ContainerSpec::from_yaml_file("web.yml")?;
//!
//!     // Build the property table for the connected runtime
//!     let caps = ApiCapabilities::new("1.41".parse()?);
//!     let table = container_property_table(&caps)?;
//!
//!     // Reconcile and converge through a driver
//!     let mut engine = ConvergenceEngine::new(driver, Reconciler::new(table));
//!     let report = engine.converge("web-1", TargetState::Started, &spec.desired_state())?;
//!
//!     println!("changed: {}", report.changed);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.
    //!
    //! This prelude provides quick access to the most commonly needed types:
    //!
    //! - **Comparison**: Strategies, value shapes and the comparison entry point
    //! - **Properties**: Property specs, tables and comparison overrides
    //! - **Reconciliation**: Desired/observed state and the reconciler
    //! - **Convergence**: The engine, driver trait and target states
    //! - **Containers**: The shipped container integration
    //! - **Errors**: Error handling types

    // Comparison primitives
    pub use crate::compare::{compare_values, CompareStrategy, ValueShape};

    // Difference tracking
    pub use crate::diff::{DiffEntry, Difference, DifferenceTracker};

    // Error handling
    pub use crate::error::{Error, ErrorContext, Result};

    // Property tables
    pub use crate::property::{
        ComparisonOverrides, Mutability, PropertySpec, PropertyTable,
    };

    // Reconciliation
    pub use crate::reconciler::{DesiredState, ObservedState, Reconciler};

    // Convergence engine
    pub use crate::convergence::{
        Action, ConvergeOptions, ConvergenceEngine, ConvergenceReport, ObservedResource,
        ResourceDriver, TargetState,
    };

    // Container integration
    pub use crate::container::{
        container_property_table, observe_container, ApiCapabilities, ApiVersion,
        ContainerSpec,
    };
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for Converge operations.
///
/// This module provides the main [`Error`](error::Error) enum that covers all
/// possible error conditions in Converge: configuration mistakes caught while
/// building tables and overrides, malformed observed state, and failures
/// reported by resource drivers.
pub mod error;

/// Value comparison primitives.
///
/// Implements the three comparison strategies over the five value shapes,
/// along with the shape-aware normalization of unreported observed values
/// and the canonical ordering used when collections are displayed.
pub mod compare;

/// Property specifications, tables and comparison overrides.
///
/// A property table is the static, validated description of one resource
/// type. Comparison overrides tune the table per invocation: a `*` wildcard
/// first, explicit per-property entries second.
pub mod property;

/// Difference tracking between desired and observed state.
///
/// The [`DifferenceTracker`](diff::DifferenceTracker) records mismatches in
/// the order they are found and renders them as reports, before/after maps,
/// or a unified text diff.
pub mod diff;

// ============================================================================
// Reconciliation
// ============================================================================

/// The table-driven reconciler.
///
/// Walks a property table against a desired and an observed state document,
/// producing a [`Reconciliation`](reconciler::Reconciliation) that lists
/// every difference and classifies it as fixable in place or requiring a
/// recreate.
pub mod reconciler;

/// The convergence engine and resource driver abstraction.
///
/// Turns reconciliation outcomes into ordered driver calls: create when
/// absent, stop/remove/create on recreate-requiring drift, in-place update
/// otherwise, then run-state management (start, stop, pause, unpause).
/// Check mode records intended actions without touching the driver.
pub mod convergence;

// ============================================================================
// Resource Integrations
// ============================================================================

/// The shipped container integration.
///
/// Binds the generic machinery to containers: the property table with its
/// shapes and capability gates, the typed [`ContainerSpec`](container::ContainerSpec)
/// configuration, and the inspect-document normalizer.
pub mod container;

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of Converge.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns detailed version information including build metadata.
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        rust_version: option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown"),
        target: std::env::consts::ARCH,
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Detailed version information for the Converge build.
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Semantic version string
    pub version: &'static str,
    /// Minimum Rust version required
    pub rust_version: &'static str,
    /// Target triple for the build
    pub target: &'static str,
    /// Build profile (debug or release)
    pub profile: &'static str,
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "converge {} ({}, {})",
            self.version, self.target, self.profile
        )
    }
}
