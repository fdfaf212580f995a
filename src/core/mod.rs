//! Core traits and kernels shared by every matrix format and solver.

pub mod kernels;
pub mod traits;

pub use traits::{IndexType, LinOp, LinOpFactory, Scalar, check_apply};
