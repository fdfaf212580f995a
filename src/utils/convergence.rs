//! Convergence tracking for iterative solvers.

use std::time::Instant;

use tracing::trace;

use crate::core::traits::Scalar;
use crate::error::KError;
use crate::stop::{CriterionSet, Snapshot, StopReason};

/// Outcome of one solve.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveReport<T> {
    pub iterations: usize,
    pub final_residual: T,
    pub reason: StopReason,
    /// Position of the criterion that fired, `None` for internal stops
    /// (zero residual, invariant subspace, breakdown).
    pub criterion: Option<usize>,
    /// Residual norm per iteration; entry 0 is the initial residual.
    pub history: Vec<T>,
}

impl<T> SolveReport<T> {
    pub fn converged(&self) -> bool {
        self.reason == StopReason::Converged
    }

    /// Turn a breakdown stop into [`KError::Breakdown`].
    pub fn into_result(self) -> Result<Self, KError> {
        match self.reason {
            StopReason::Breakdown(detail) => Err(KError::Breakdown {
                iteration: self.iterations,
                detail,
            }),
            _ => Ok(self),
        }
    }
}

/// Feeds residual norms to a criterion set and records the history.
pub(crate) struct Monitor<'a, T: Scalar> {
    criteria: &'a CriterionSet<T>,
    start: Instant,
    rhs_norm: T,
    history: Vec<T>,
}

impl<'a, T: Scalar> Monitor<'a, T> {
    pub(crate) fn new(criteria: &'a CriterionSet<T>, rhs_norm: T) -> Self {
        Self {
            criteria,
            start: Instant::now(),
            rhs_norm,
            history: Vec::new(),
        }
    }

    /// Record `residual` for `iteration` and evaluate the criteria.
    pub(crate) fn check(&mut self, iteration: usize, residual: T) -> Option<(usize, StopReason)> {
        self.history.push(residual);
        self.evaluate(iteration)
    }

    /// Record `residual` without evaluating the criteria; a later
    /// [`revise`](Self::revise) settles the iteration.
    pub(crate) fn record(&mut self, residual: T) {
        self.history.push(residual);
    }

    /// Replace the latest residual (e.g. with a recomputed true residual)
    /// and evaluate the criteria again.
    pub(crate) fn revise(&mut self, iteration: usize, residual: T) -> Option<(usize, StopReason)> {
        match self.history.last_mut() {
            Some(last) => *last = residual,
            None => self.history.push(residual),
        }
        self.evaluate(iteration)
    }

    fn evaluate(&self, iteration: usize) -> Option<(usize, StopReason)> {
        let residual = self.history[self.history.len() - 1];
        trace!(iteration, residual = %residual, "residual");
        let snapshot = Snapshot {
            iteration,
            residual_norm: residual,
            initial_residual_norm: self.history[0],
            rhs_norm: self.rhs_norm,
            elapsed: self.start.elapsed(),
        };
        self.criteria.check(&snapshot)
    }

    pub(crate) fn finish(
        self,
        iterations: usize,
        reason: StopReason,
        criterion: Option<usize>,
    ) -> SolveReport<T> {
        SolveReport {
            iterations,
            final_residual: self.history.last().copied().unwrap_or_else(T::zero),
            reason,
            criterion,
            history: self.history,
        }
    }
}
