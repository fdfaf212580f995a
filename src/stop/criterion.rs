use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::core::traits::Scalar;
use crate::error::KError;
use crate::stop::StopReason;

/// Reference value a residual reduction is measured against.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Baseline {
    /// ‖b − A x₀‖
    #[default]
    InitialResidual,
    /// ‖b‖
    RhsNorm,
    /// 1
    Absolute,
}

impl FromStr for Baseline {
    type Err = KError;

    fn from_str(s: &str) -> Result<Self, KError> {
        match s.to_ascii_lowercase().as_str() {
            "initial_resnorm" | "initial_residual" | "initial" => Ok(Baseline::InitialResidual),
            "rhs_norm" | "rhs" => Ok(Baseline::RhsNorm),
            "absolute" => Ok(Baseline::Absolute),
            other => Err(KError::InvalidOption(format!("unknown baseline `{other}`"))),
        }
    }
}

/// Solver state handed to criteria at an iteration boundary.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Snapshot<T> {
    /// Completed iterations (0 before any work).
    pub iteration: usize,
    pub residual_norm: T,
    pub initial_residual_norm: T,
    pub rhs_norm: T,
    /// Time since the solve started.
    pub elapsed: Duration,
}

impl<T: Scalar> Snapshot<T> {
    pub fn baseline(&self, baseline: Baseline) -> T {
        match baseline {
            Baseline::InitialResidual => self.initial_residual_norm,
            Baseline::RhsNorm => self.rhs_norm,
            Baseline::Absolute => T::one(),
        }
    }
}

/// User-supplied stopping condition.
pub trait StopCondition<T: Scalar>: Send + Sync {
    /// Name reported in [`StopReason::Condition`].
    fn name(&self) -> &str;
    fn check(&self, snapshot: &Snapshot<T>) -> bool;
}

/// External cancellation, checked at iteration boundaries.
///
/// Clones share one flag: hand one clone to the solver as a
/// [`Criterion::Custom`] and call [`CancelToken::cancel`] on another.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// This token as a criterion.
    pub fn criterion<T: Scalar>(&self) -> Criterion<T> {
        Criterion::Custom(Arc::new(self.clone()))
    }
}

impl<T: Scalar> StopCondition<T> for CancelToken {
    fn name(&self) -> &str {
        "cancelled"
    }

    fn check(&self, _snapshot: &Snapshot<T>) -> bool {
        self.is_cancelled()
    }
}

/// A single stopping criterion.
#[derive(Clone)]
pub enum Criterion<T: Scalar> {
    /// Satisfied once `iteration >= n`.
    MaxIterations(usize),
    /// Satisfied once `residual <= reduction_factor * baseline`.
    ResidualNorm {
        reduction_factor: T,
        baseline: Baseline,
    },
    /// Satisfied once the solve has run for at least this long.
    Time(Duration),
    Custom(Arc<dyn StopCondition<T>>),
}

impl<T: Scalar> Criterion<T> {
    pub fn residual_norm(reduction_factor: T, baseline: Baseline) -> Self {
        Criterion::ResidualNorm {
            reduction_factor,
            baseline,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), KError> {
        match self {
            Criterion::ResidualNorm {
                reduction_factor, ..
            } if !(*reduction_factor >= T::zero()) || reduction_factor.is_infinite() => {
                Err(KError::InvalidOption(format!(
                    "reduction factor must be finite and non-negative, got {reduction_factor}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// `Some(reason)` if the criterion is satisfied by `snapshot`.
    pub fn check(&self, snapshot: &Snapshot<T>) -> Option<StopReason> {
        match self {
            Criterion::MaxIterations(n) => {
                (snapshot.iteration >= *n).then_some(StopReason::MaxIterations)
            }
            Criterion::ResidualNorm {
                reduction_factor,
                baseline,
            } => (snapshot.residual_norm <= *reduction_factor * snapshot.baseline(*baseline))
                .then_some(StopReason::Converged),
            Criterion::Time(limit) => (snapshot.elapsed >= *limit).then_some(StopReason::TimeLimit),
            Criterion::Custom(cond) => cond
                .check(snapshot)
                .then(|| StopReason::Condition(cond.name().to_string())),
        }
    }
}

impl<T: Scalar> fmt::Debug for Criterion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::MaxIterations(n) => f.debug_tuple("MaxIterations").field(n).finish(),
            Criterion::ResidualNorm {
                reduction_factor,
                baseline,
            } => f
                .debug_struct("ResidualNorm")
                .field("reduction_factor", reduction_factor)
                .field("baseline", baseline)
                .finish(),
            Criterion::Time(d) => f.debug_tuple("Time").field(d).finish(),
            Criterion::Custom(c) => f.debug_tuple("Custom").field(&c.name()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(iteration: usize, residual: f64) -> Snapshot<f64> {
        Snapshot {
            iteration,
            residual_norm: residual,
            initial_residual_norm: 10.0,
            rhs_norm: 100.0,
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn max_iterations_is_inclusive() {
        let c = Criterion::<f64>::MaxIterations(3);
        assert_eq!(c.check(&snap(2, 1.0)), None);
        assert_eq!(c.check(&snap(3, 1.0)), Some(StopReason::MaxIterations));
    }

    #[test]
    fn residual_norm_uses_baseline() {
        let initial = Criterion::residual_norm(0.1, Baseline::InitialResidual);
        let rhs = Criterion::residual_norm(0.1, Baseline::RhsNorm);
        let abs = Criterion::residual_norm(0.1, Baseline::Absolute);
        let s = snap(1, 5.0);
        assert_eq!(initial.check(&s), None);
        assert_eq!(rhs.check(&s), Some(StopReason::Converged));
        assert_eq!(abs.check(&s), None);
        assert_eq!(abs.check(&snap(1, 0.1)), Some(StopReason::Converged));
    }

    #[test]
    fn time_limit() {
        let c = Criterion::<f64>::Time(Duration::from_millis(5));
        assert_eq!(c.check(&snap(0, 1.0)), Some(StopReason::TimeLimit));
        let c = Criterion::<f64>::Time(Duration::from_secs(60));
        assert_eq!(c.check(&snap(0, 1.0)), None);
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let c: Criterion<f64> = token.criterion();
        assert_eq!(c.check(&snap(0, 1.0)), None);
        token.clone().cancel();
        assert_eq!(
            c.check(&snap(0, 1.0)),
            Some(StopReason::Condition("cancelled".into()))
        );
    }

    #[test]
    fn invalid_reduction_factor() {
        assert!(Criterion::residual_norm(-1.0, Baseline::Absolute).validate().is_err());
        assert!(Criterion::residual_norm(f64::NAN, Baseline::Absolute).validate().is_err());
        assert!(Criterion::residual_norm(0.0, Baseline::Absolute).validate().is_ok());
    }

    #[test]
    fn baseline_from_str() {
        assert_eq!("rhs_norm".parse::<Baseline>().unwrap(), Baseline::RhsNorm);
        assert_eq!("Absolute".parse::<Baseline>().unwrap(), Baseline::Absolute);
        assert!("relative".parse::<Baseline>().is_err());
    }
}
