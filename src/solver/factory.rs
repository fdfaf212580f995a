//! Two-phase solver construction.
//!
//! A [`SolverBuilder`] collects parameters, [`SolverBuilder::on`] validates
//! them and freezes an immutable [`SolverFactory`] bound to one executor, and
//! [`SolverFactory::generate`] binds that configuration to a system matrix,
//! yielding a [`Solver`]. One factory can generate any number of solvers.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use linop::{Cg, Dense, Dim, Executor, KError, LinOp};
//! # fn main() -> Result<(), KError> {
//! let exec = Executor::reference();
//! let a: Arc<dyn LinOp<f64>> = Arc::new(Dense::identity(&exec, 4));
//! let solver = Cg::build()
//!     .with_max_iters(100)
//!     .with_reduction_factor(1e-10)
//!     .on(&exec)?
//!     .generate(a)?;
//! let b = Dense::vector(&exec, &[1.0; 4]);
//! let mut x = Dense::create(&exec, Dim::column(4));
//! let report = solver.solve(&b, &mut x)?;
//! assert!(report.converged());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::SolverOptions;
use crate::core::traits::{LinOp, LinOpFactory, Scalar, check_apply};
use crate::error::KError;
use crate::executor::Executor;
use crate::matrix::{Dense, Dim, Identity};
use crate::solver::{cg, gmres};
use crate::stop::{Baseline, Criterion, CriterionSet};
use crate::utils::convergence::SolveReport;

/// Krylov subspace dimension used by GMRES unless configured otherwise.
pub const DEFAULT_KRYLOV_DIM: usize = 30;

/// Krylov method.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SolverKind {
    /// Conjugate Gradient (symmetric positive definite systems).
    Cg,
    /// Restarted GMRES (general systems).
    Gmres,
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverKind::Cg => f.write_str("cg"),
            SolverKind::Gmres => f.write_str("gmres"),
        }
    }
}

impl FromStr for SolverKind {
    type Err = KError;

    fn from_str(s: &str) -> Result<Self, KError> {
        match s.to_ascii_lowercase().as_str() {
            "cg" => Ok(SolverKind::Cg),
            "gmres" => Ok(SolverKind::Gmres),
            other => Err(KError::InvalidOption(format!("unknown solver `{other}`"))),
        }
    }
}

/// Entry point for Conjugate Gradient builders.
pub struct Cg;

impl Cg {
    pub fn build<T: Scalar>() -> SolverBuilder<T> {
        SolverBuilder::new(SolverKind::Cg)
    }
}

/// Entry point for GMRES builders.
pub struct Gmres;

impl Gmres {
    pub fn build<T: Scalar>() -> SolverBuilder<T> {
        SolverBuilder::new(SolverKind::Gmres)
    }
}

#[derive(Clone)]
enum PreconditionerSource<T: Scalar> {
    /// Generated against each system matrix.
    Factory(Arc<dyn LinOpFactory<T>>),
    /// Used as is.
    Generated(Arc<dyn LinOp<T>>),
}

impl<T: Scalar> PreconditionerSource<T> {
    fn executor(&self) -> &Executor {
        match self {
            PreconditionerSource::Factory(f) => f.executor(),
            PreconditionerSource::Generated(op) => op.executor(),
        }
    }
}

/// Mutable parameter collection; see the module docs.
#[derive(Clone)]
pub struct SolverBuilder<T: Scalar> {
    kind: SolverKind,
    max_iters: Option<usize>,
    reduction_factor: Option<T>,
    baseline: Option<Baseline>,
    krylov_dim: Option<usize>,
    criteria: Vec<Criterion<T>>,
    preconditioner: Option<PreconditionerSource<T>>,
}

impl<T: Scalar> SolverBuilder<T> {
    pub fn new(kind: SolverKind) -> Self {
        Self {
            kind,
            max_iters: None,
            reduction_factor: None,
            baseline: None,
            krylov_dim: None,
            criteria: Vec::new(),
            preconditioner: None,
        }
    }

    /// Builder for the solver named in `opts`, with the remaining options applied.
    pub fn from_options(opts: &SolverOptions) -> Result<Self, KError> {
        let kind = opts
            .solver
            .ok_or_else(|| KError::InvalidOption("`solver` is required".into()))?;
        Self::new(kind).with_options(opts)
    }

    pub fn kind(&self) -> SolverKind {
        self.kind
    }

    /// Stop once `n` iterations have completed.
    pub fn with_max_iters(mut self, n: usize) -> Self {
        self.max_iters = Some(n);
        self
    }

    /// Stop once the residual norm drops to `f` times the baseline.
    pub fn with_reduction_factor(mut self, f: T) -> Self {
        self.reduction_factor = Some(f);
        self
    }

    /// Baseline of the reduction factor (default: initial residual norm).
    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Basis size before GMRES restarts.
    pub fn with_krylov_dim(mut self, m: usize) -> Self {
        self.krylov_dim = Some(m);
        self
    }

    /// Append a criterion; it is evaluated after the `max_iters` and
    /// `reduction_factor` shorthands, in insertion order.
    pub fn with_criterion(mut self, criterion: Criterion<T>) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn with_criteria(mut self, criteria: impl IntoIterator<Item = Criterion<T>>) -> Self {
        self.criteria.extend(criteria);
        self
    }

    /// Preconditioner generated from the system matrix by `factory`.
    pub fn with_preconditioner(mut self, factory: Arc<dyn LinOpFactory<T>>) -> Self {
        self.preconditioner = Some(PreconditionerSource::Factory(factory));
        self
    }

    /// Ready-made preconditioner, applied as `z = M r`.
    pub fn with_generated_preconditioner(mut self, op: Arc<dyn LinOp<T>>) -> Self {
        self.preconditioner = Some(PreconditionerSource::Generated(op));
        self
    }

    /// Apply parsed string options on top of the current settings.
    pub fn with_options(mut self, opts: &SolverOptions) -> Result<Self, KError> {
        if let Some(kind) = opts.solver {
            if kind != self.kind {
                return Err(KError::InvalidOption(format!(
                    "options select `{kind}` but builder is `{}`",
                    self.kind
                )));
            }
        }
        if let Some(n) = opts.max_iters {
            self.max_iters = Some(n);
        }
        if let Some(f) = opts.reduction_factor {
            let f = T::from_f64(f).ok_or_else(|| {
                KError::InvalidOption(format!("reduction_factor {f} not representable"))
            })?;
            self.reduction_factor = Some(f);
        }
        if let Some(b) = opts.baseline {
            self.baseline = Some(b);
        }
        if let Some(m) = opts.krylov_dim {
            self.krylov_dim = Some(m);
        }
        Ok(self)
    }

    /// Validate the parameters and freeze them into a factory on `exec`.
    pub fn on(self, exec: &Executor) -> Result<SolverFactory<T>, KError> {
        let krylov_dim = match (self.kind, self.krylov_dim) {
            (SolverKind::Cg, Some(_)) => {
                return Err(KError::InvalidOption(
                    "krylov_dim is a GMRES option".into(),
                ));
            }
            (_, Some(0)) => {
                return Err(KError::InvalidOption("krylov_dim must be positive".into()));
            }
            (_, Some(m)) => m,
            (_, None) => DEFAULT_KRYLOV_DIM,
        };
        if self.baseline.is_some() && self.reduction_factor.is_none() {
            return Err(KError::InvalidOption(
                "baseline given without a reduction factor".into(),
            ));
        }
        if let Some(pc) = &self.preconditioner {
            exec.ensure_same("solver::on", pc.executor())?;
        }

        let mut criteria = Vec::with_capacity(self.criteria.len() + 2);
        if let Some(n) = self.max_iters {
            criteria.push(Criterion::MaxIterations(n));
        }
        if let Some(f) = self.reduction_factor {
            criteria.push(Criterion::residual_norm(f, self.baseline.unwrap_or_default()));
        }
        criteria.extend(self.criteria);
        let criteria = CriterionSet::new(criteria)?;

        debug!(solver = %self.kind, executor = %exec, ?criteria, krylov_dim, "built solver factory");
        Ok(SolverFactory {
            exec: exec.clone(),
            config: Arc::new(Config {
                kind: self.kind,
                criteria,
                krylov_dim,
                preconditioner: self.preconditioner,
            }),
        })
    }
}

struct Config<T: Scalar> {
    kind: SolverKind,
    criteria: CriterionSet<T>,
    krylov_dim: usize,
    preconditioner: Option<PreconditionerSource<T>>,
}

/// Immutable solver configuration bound to an executor.
#[derive(Clone)]
pub struct SolverFactory<T: Scalar> {
    exec: Executor,
    config: Arc<Config<T>>,
}

impl<T: Scalar> SolverFactory<T> {
    pub fn executor(&self) -> &Executor {
        &self.exec
    }

    pub fn kind(&self) -> SolverKind {
        self.config.kind
    }

    pub fn criteria(&self) -> &CriterionSet<T> {
        &self.config.criteria
    }

    /// GMRES restart length (unused by CG).
    pub fn krylov_dim(&self) -> usize {
        self.config.krylov_dim
    }

    /// Bind the configuration to a square system matrix on this executor.
    pub fn generate(&self, matrix: Arc<dyn LinOp<T>>) -> Result<Solver<T>, KError> {
        self.exec.ensure_same("solver::generate", matrix.executor())?;
        let size = matrix.size();
        if !size.is_square() {
            return Err(KError::dims(
                "solver::generate",
                format!("system matrix must be square, got {size}"),
            ));
        }
        let preconditioner: Arc<dyn LinOp<T>> = match &self.config.preconditioner {
            None => Arc::new(Identity::new(&self.exec, size.rows)),
            Some(PreconditionerSource::Factory(f)) => f.generate(Arc::clone(&matrix))?,
            Some(PreconditionerSource::Generated(op)) => Arc::clone(op),
        };
        if preconditioner.size() != size {
            return Err(KError::dims(
                "solver::generate",
                format!("preconditioner {} for system {size}", preconditioner.size()),
            ));
        }
        debug!(solver = %self.config.kind, %size, "generated solver");
        Ok(Solver {
            exec: self.exec.clone(),
            matrix,
            config: Arc::clone(&self.config),
            preconditioner,
            last_report: Mutex::new(None),
        })
    }
}

impl<T: Scalar> LinOpFactory<T> for SolverFactory<T> {
    fn executor(&self) -> &Executor {
        &self.exec
    }

    fn generate(&self, op: Arc<dyn LinOp<T>>) -> Result<Arc<dyn LinOp<T>>, KError> {
        Ok(Arc::new(SolverFactory::generate(self, op)?))
    }
}

impl<T: Scalar> fmt::Debug for SolverFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolverFactory")
            .field("kind", &self.config.kind)
            .field("executor", &self.exec)
            .field("criteria", &self.config.criteria)
            .field("krylov_dim", &self.config.krylov_dim)
            .finish()
    }
}

/// A solver bound to a system matrix; itself a linear operator (x ≈ A⁻¹ b).
pub struct Solver<T: Scalar> {
    exec: Executor,
    matrix: Arc<dyn LinOp<T>>,
    config: Arc<Config<T>>,
    preconditioner: Arc<dyn LinOp<T>>,
    last_report: Mutex<Option<SolveReport<T>>>,
}

impl<T: Scalar> Solver<T> {
    pub fn kind(&self) -> SolverKind {
        self.config.kind
    }

    pub fn system_matrix(&self) -> &Arc<dyn LinOp<T>> {
        &self.matrix
    }

    pub fn preconditioner(&self) -> &Arc<dyn LinOp<T>> {
        &self.preconditioner
    }

    /// Report of the most recent solve or apply.
    pub fn last_report(&self) -> Option<SolveReport<T>> {
        self.last_report.lock().clone()
    }

    /// Solve A x = b for a single right-hand side, using `x` as the initial
    /// guess. Not converging is reported through [`SolveReport::reason`].
    pub fn solve(&self, b: &Dense<T>, x: &mut Dense<T>) -> Result<SolveReport<T>, KError> {
        check_apply("solver::solve", self, b, x)?;
        if b.cols() != 1 {
            return Err(KError::dims(
                "solver::solve",
                format!("one right-hand side expected, got {}", b.size()),
            ));
        }
        debug!(solver = %self.config.kind, n = b.rows(), "solve started");
        let cfg = &*self.config;
        let a = self.matrix.as_ref();
        let m = self.preconditioner.as_ref();
        let report = match cfg.kind {
            SolverKind::Cg => cg::solve(a, m, &cfg.criteria, b, x)?,
            SolverKind::Gmres => gmres::solve(a, m, &cfg.criteria, cfg.krylov_dim, b, x)?,
        };
        debug!(
            solver = %cfg.kind,
            iterations = report.iterations,
            residual = %report.final_residual,
            reason = %report.reason,
            "solve finished"
        );
        *self.last_report.lock() = Some(report.clone());
        Ok(report)
    }
}

impl<T: Scalar> LinOp<T> for Solver<T> {
    fn executor(&self) -> &Executor {
        &self.exec
    }

    fn size(&self) -> Dim {
        self.matrix.size()
    }

    fn apply(&self, b: &Dense<T>, x: &mut Dense<T>) -> Result<(), KError> {
        self.solve(b, x).map(|_| ())
    }
}

impl<T: Scalar> fmt::Debug for Solver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solver")
            .field("kind", &self.config.kind)
            .field("executor", &self.exec)
            .field("size", &self.matrix.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stop::StopReason;

    fn spd(exec: &Executor) -> Arc<dyn LinOp<f64>> {
        // [[4,1],[1,3]]
        Arc::new(Dense::from_vec(exec, Dim::square(2), vec![4.0, 1.0, 1.0, 3.0]).unwrap())
    }

    #[test]
    fn build_requires_a_criterion() {
        let exec = Executor::reference();
        assert!(matches!(
            Cg::build::<f64>().on(&exec),
            Err(KError::InvalidOption(_))
        ));
    }

    #[test]
    fn krylov_dim_is_gmres_only() {
        let exec = Executor::reference();
        assert!(Cg::build::<f64>().with_max_iters(5).with_krylov_dim(3).on(&exec).is_err());
        assert!(Gmres::build::<f64>().with_max_iters(5).with_krylov_dim(0).on(&exec).is_err());
        let f = Gmres::build::<f64>().with_max_iters(5).on(&exec).unwrap();
        assert_eq!(f.krylov_dim(), DEFAULT_KRYLOV_DIM);
    }

    #[test]
    fn bad_reduction_settings_are_rejected() {
        let exec = Executor::reference();
        assert!(Cg::build::<f64>().with_reduction_factor(-1.0).on(&exec).is_err());
        assert!(Cg::build::<f64>().with_reduction_factor(f64::NAN).on(&exec).is_err());
        assert!(
            Cg::build::<f64>()
                .with_max_iters(3)
                .with_baseline(Baseline::RhsNorm)
                .on(&exec)
                .is_err()
        );
    }

    #[test]
    fn shorthand_criteria_come_first() {
        let exec = Executor::reference();
        let f = Cg::build::<f64>()
            .with_criterion(Criterion::MaxIterations(1))
            .with_reduction_factor(1e-6)
            .with_max_iters(10)
            .on(&exec)
            .unwrap();
        let kinds: Vec<_> = f.criteria().iter().map(|c| format!("{c:?}")).collect();
        assert!(kinds[0].starts_with("MaxIterations(10)"));
        assert!(kinds[1].starts_with("ResidualNorm"));
        assert!(kinds[2].starts_with("MaxIterations(1)"));
    }

    #[test]
    fn generate_checks_matrix() {
        let e1 = Executor::reference();
        let e2 = Executor::reference();
        let f = Cg::build::<f64>().with_max_iters(5).on(&e1).unwrap();
        assert!(matches!(f.generate(spd(&e2)), Err(KError::ExecutorMismatch { .. })));
        let rect: Arc<dyn LinOp<f64>> = Arc::new(Dense::create(&e1, Dim::new(2, 3)));
        assert!(matches!(f.generate(rect), Err(KError::DimensionMismatch { .. })));
    }

    #[test]
    fn generated_preconditioner_must_fit() {
        let exec = Executor::reference();
        let f = Cg::build::<f64>()
            .with_max_iters(5)
            .with_generated_preconditioner(Arc::new(Identity::new(&exec, 3)))
            .on(&exec)
            .unwrap();
        assert!(matches!(f.generate(spd(&exec)), Err(KError::DimensionMismatch { .. })));

        let other = Executor::reference();
        let res = Cg::build::<f64>()
            .with_max_iters(5)
            .with_generated_preconditioner(Arc::new(Identity::new(&other, 2)))
            .on(&exec);
        assert!(matches!(res, Err(KError::ExecutorMismatch { .. })));
    }

    #[test]
    fn solver_records_last_report() {
        let exec = Executor::reference();
        let solver = Cg::build()
            .with_max_iters(20)
            .with_reduction_factor(1e-12)
            .on(&exec)
            .unwrap()
            .generate(spd(&exec))
            .unwrap();
        assert!(solver.last_report().is_none());
        let b = Dense::vector(&exec, &[1.0, 2.0]);
        let mut x = Dense::create(&exec, Dim::column(2));
        solver.apply(&b, &mut x).unwrap();
        let report = solver.last_report().unwrap();
        assert_eq!(report.reason, StopReason::Converged);
        assert_eq!(report.criterion, Some(1));
        assert!((x.at(0, 0).unwrap() - 1.0 / 11.0).abs() < 1e-10);
        assert!((x.at(1, 0).unwrap() - 7.0 / 11.0).abs() < 1e-10);
    }

    #[test]
    fn solve_rejects_multiple_columns() {
        let exec = Executor::reference();
        let solver = Cg::build()
            .with_max_iters(5)
            .on(&exec)
            .unwrap()
            .generate(spd(&exec))
            .unwrap();
        let b = Dense::create(&exec, Dim::new(2, 2));
        let mut x = Dense::create(&exec, Dim::new(2, 2));
        assert!(matches!(
            solver.solve(&b, &mut x),
            Err(KError::DimensionMismatch { op: "solver::solve", .. })
        ));
    }

    #[test]
    fn kind_from_str() {
        assert_eq!("GMRES".parse::<SolverKind>().unwrap(), SolverKind::Gmres);
        assert!("bicg".parse::<SolverKind>().is_err());
    }
}
