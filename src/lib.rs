//! linop: executor-bound linear operators and Krylov solvers
//!
//! Dense and CSR matrices live on an [`Executor`] (sequential host, rayon
//! thread pool, or an accelerator slot) and every operation checks that its
//! operands share one. Matrices and solvers alike implement [`LinOp`], so a
//! generated solver can serve as another solver's preconditioner.
//!
//! Solvers are built in two phases: a [`SolverBuilder`] (from [`Cg::build`]
//! or [`Gmres::build`]) is validated into an immutable [`SolverFactory`] on an
//! executor, which then generates any number of [`Solver`]s bound to system
//! matrices. Solves stop on the first satisfied [`Criterion`] and return a
//! [`SolveReport`] with the residual history.

pub mod config;
pub mod core;
pub mod error;
pub mod executor;
pub mod matrix;
pub mod solver;
pub mod stop;
pub mod utils;

// Re-exports for convenience
pub use crate::config::SolverOptions;
pub use crate::core::{IndexType, LinOp, LinOpFactory, Scalar};
pub use crate::error::KError;
pub use crate::executor::{Array, Capabilities, Executor, ExecutorKind, Mode};
pub use crate::matrix::{Csr, Dense, Dim, Identity};
pub use crate::solver::{
    Cg, DEFAULT_KRYLOV_DIM, Gmres, Solver, SolverBuilder, SolverFactory, SolverKind,
};
pub use crate::stop::{Baseline, CancelToken, Criterion, CriterionSet, Snapshot, StopCondition, StopReason};
pub use crate::utils::SolveReport;
