pub mod convergence;

pub use convergence::SolveReport;
