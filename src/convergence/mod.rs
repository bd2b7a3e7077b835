//! Resource convergence: the state machine around the reconciler.
//!
//! The reconciler answers "what differs"; this module answers "what to do
//! about it". A [`ConvergenceEngine`] fetches the resource through a
//! [`ResourceDriver`], reconciles it against the desired configuration, and
//! walks the resource through the remedial transitions:
//!
//! ```text
//!   absent ──create──▶ exists(differs) ──stop/remove/create──▶ exists(matches)
//!                           │    ▲
//!                           └────┘ update in place (re-checked once)
//! ```
//!
//! A mismatch on a property that requires recreation wins over any number of
//! in-place-updatable mismatches: the resource is stopped, removed and
//! created fresh. Run-state handling (started/stopped/paused) happens after
//! the configuration converges and is recorded in the same difference
//! tracker, so one report covers the whole pass.

mod driver;
mod engine;

pub use driver::{ObservedResource, ResourceDriver};
pub use engine::{
    Action, ConvergeOptions, ConvergenceEngine, ConvergenceReport, StateDelta, TargetState,
};
