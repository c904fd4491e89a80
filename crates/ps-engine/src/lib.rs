//! The pull-request synthesis pipeline.
//!
//! [`coordinator::PrLifecycleCoordinator`] drives branch negotiation, conflict
//! resolution, tree building, commit-message synthesis and publishing in a
//! fixed order; [`tracker::IterationTracker`] keeps the per-issue audit trail.

pub mod branch;
pub mod changeset;
pub mod conflict;
pub mod coordinator;
pub mod error;
pub mod state;
pub mod title;
pub mod tracker;

pub use coordinator::{
    IssueSynthesis, PrLifecycleCoordinator, SynthesisOutcome, SynthesisRequest,
};
pub use error::{Result, SynthesisError};
pub use state::SynthesisStage;
pub use tracker::{HistoryEntry, HistoryLabel, IterationTracker};
