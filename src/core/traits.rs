//! Core linear-algebra traits for linop.

use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::sync::Arc;

use num_traits::{Float, FromPrimitive};

use crate::error::KError;
use crate::executor::Executor;
use crate::matrix::{Dense, Dim};

/// Floating-point element type of matrices and vectors.
pub trait Scalar:
    Float + FromPrimitive + Default + Debug + Display + Sum + Send + Sync + 'static
{
}

impl<T> Scalar for T where
    T: Float + FromPrimitive + Default + Debug + Display + Sum + Send + Sync + 'static
{
}

/// Integer type of sparse row pointers and column indices.
pub trait IndexType: Copy + Ord + Default + Debug + Send + Sync + 'static {
    /// Convert an index already known to be valid.
    fn index(self) -> usize;
    /// `None` for negative or unrepresentable values.
    fn try_index(self) -> Option<usize>;
    /// `None` if `i` does not fit.
    fn from_index(i: usize) -> Option<Self>;
}

macro_rules! index_type {
    ($($t:ty),*) => {
        $(
            impl IndexType for $t {
                #[inline]
                fn index(self) -> usize {
                    self as usize
                }
                #[inline]
                fn try_index(self) -> Option<usize> {
                    usize::try_from(self).ok()
                }
                #[inline]
                fn from_index(i: usize) -> Option<Self> {
                    <$t>::try_from(i).ok()
                }
            }
        )*
    };
}

index_type!(i32, i64, u32, u64, usize);

/// A linear operator: x ← A b.
///
/// Matrices and generated solvers both implement this, so a solver can stand
/// wherever an operator is expected (e.g. as another solver's preconditioner).
pub trait LinOp<T: Scalar>: Send + Sync {
    /// Executor the operator's data lives on.
    fn executor(&self) -> &Executor;
    /// Operator shape (rows = output length, cols = input length).
    fn size(&self) -> Dim;
    /// Compute x = A b.
    fn apply(&self, b: &Dense<T>, x: &mut Dense<T>) -> Result<(), KError>;
    /// Compute x = α A b + β x.
    fn apply_scaled(&self, alpha: T, b: &Dense<T>, beta: T, x: &mut Dense<T>) -> Result<(), KError> {
        check_apply("linop::apply_scaled", self, b, x)?;
        let mut tmp = Dense::create(self.executor(), x.size());
        self.apply(b, &mut tmp)?;
        x.scale(beta);
        x.add_scaled(alpha, &tmp)
    }
}

/// Builds operators bound to a system matrix (e.g. solver factories).
pub trait LinOpFactory<T: Scalar>: Send + Sync {
    fn executor(&self) -> &Executor;
    fn generate(&self, op: Arc<dyn LinOp<T>>) -> Result<Arc<dyn LinOp<T>>, KError>;
}

/// Check locality and shapes for x = A b.
pub fn check_apply<T, A>(op: &'static str, a: &A, b: &Dense<T>, x: &Dense<T>) -> Result<(), KError>
where
    T: Scalar,
    A: LinOp<T> + ?Sized,
{
    let exec = a.executor();
    exec.ensure_same(op, b.executor())?;
    exec.ensure_same(op, x.executor())?;
    let size = a.size();
    if b.rows() != size.cols || x.rows() != size.rows || b.cols() != x.cols() {
        return Err(KError::dims(
            op,
            format!("operator {size}, input {}, output {}", b.size(), x.size()),
        ));
    }
    Ok(())
}
