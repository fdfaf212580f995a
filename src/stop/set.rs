use std::fmt;

use crate::core::traits::Scalar;
use crate::error::KError;
use crate::stop::{Criterion, Snapshot};

/// Why a solve stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    MaxIterations,
    Converged,
    TimeLimit,
    /// A [`Criterion::Custom`] condition, by name.
    Condition(String),
    /// The iteration cannot continue (a vanishing or non-finite inner product).
    Breakdown(&'static str),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::MaxIterations => f.write_str("iteration limit reached"),
            StopReason::Converged => f.write_str("converged"),
            StopReason::TimeLimit => f.write_str("time limit reached"),
            StopReason::Condition(name) => write!(f, "stopped by `{name}`"),
            StopReason::Breakdown(detail) => write!(f, "breakdown: {detail}"),
        }
    }
}

/// Non-empty, ordered criteria; the first satisfied one stops the solve.
#[derive(Clone, Debug)]
pub struct CriterionSet<T: Scalar> {
    criteria: Vec<Criterion<T>>,
}

impl<T: Scalar> CriterionSet<T> {
    pub fn new(criteria: Vec<Criterion<T>>) -> Result<Self, KError> {
        if criteria.is_empty() {
            return Err(KError::InvalidOption(
                "at least one stopping criterion is required".into(),
            ));
        }
        for c in &criteria {
            c.validate()?;
        }
        Ok(Self { criteria })
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion<T>> {
        self.criteria.iter()
    }

    /// Position and reason of the first satisfied criterion.
    pub fn check(&self, snapshot: &Snapshot<T>) -> Option<(usize, StopReason)> {
        self.criteria
            .iter()
            .enumerate()
            .find_map(|(i, c)| c.check(snapshot).map(|reason| (i, reason)))
    }
}
