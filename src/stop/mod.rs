//! Stopping criteria.
//!
//! A solve is stopped by a [`CriterionSet`]: an ordered list of
//! [`Criterion`]s combined with OR semantics. The set is evaluated once
//! before the first iteration and again after every iteration; the first
//! satisfied criterion wins and its position is recorded in the solve report.

pub mod criterion;
pub mod set;

pub use criterion::{Baseline, CancelToken, Criterion, Snapshot, StopCondition};
pub use set::{CriterionSet, StopReason};
