//! Krylov solvers and their builder → factory → solver construction.

pub mod cg;
pub mod factory;
pub mod gmres;

pub use factory::{
    Cg, DEFAULT_KRYLOV_DIM, Gmres, Solver, SolverBuilder, SolverFactory, SolverKind,
};
