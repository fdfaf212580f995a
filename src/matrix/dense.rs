//! Row-major dense storage.
//!
//! `Dense<T>` is both the dense matrix format and the vector type every
//! solver works on (a vector is a `Dense` with one column). All arithmetic is
//! dispatched through the owning executor; operands from another executor are
//! rejected with [`KError::ExecutorMismatch`] before any data is touched.
//! Conversions to and from [`faer::Mat`] let callers hand in matrices built
//! with faer.

use faer::Mat;

use crate::core::kernels;
use crate::core::traits::{LinOp, Scalar, check_apply};
use crate::error::KError;
use crate::executor::{Array, Executor};
use crate::matrix::Dim;

/// Dense row-major matrix bound to an executor.
#[derive(Clone, Debug)]
pub struct Dense<T: Scalar> {
    size: Dim,
    values: Array<T>,
}

impl<T: Scalar> Dense<T> {
    /// Zero-initialized matrix of the given shape.
    pub fn create(exec: &Executor, size: Dim) -> Self {
        Self {
            size,
            values: exec.alloc(size.len()),
        }
    }

    /// Matrix over row-major `data`; `data.len()` must equal `rows * cols`.
    pub fn from_vec(exec: &Executor, size: Dim, data: Vec<T>) -> Result<Self, KError> {
        if data.len() != size.len() {
            return Err(KError::dims(
                "dense::from_vec",
                format!("{} values for a {size} matrix", data.len()),
            ));
        }
        Ok(Self {
            size,
            values: exec.adopt(data),
        })
    }

    /// Matrix with entry (i, j) = f(i, j).
    pub fn from_fn(exec: &Executor, size: Dim, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(size.len());
        for i in 0..size.rows {
            for j in 0..size.cols {
                data.push(f(i, j));
            }
        }
        Self {
            size,
            values: exec.adopt(data),
        }
    }

    /// Column vector holding `values`.
    pub fn vector(exec: &Executor, values: &[T]) -> Self {
        Self {
            size: Dim::column(values.len()),
            values: exec.adopt(values.to_vec()),
        }
    }

    pub fn identity(exec: &Executor, n: usize) -> Self {
        Self::from_fn(exec, Dim::square(n), |i, j| if i == j { T::one() } else { T::zero() })
    }

    /// Copy a faer matrix onto `exec`.
    pub fn from_faer(exec: &Executor, m: &Mat<T>) -> Self {
        Self::from_fn(exec, Dim::new(m.nrows(), m.ncols()), |i, j| m[(i, j)])
    }

    /// Copy back into a faer matrix.
    pub fn to_faer(&self) -> Mat<T> {
        self.executor().synchronize();
        let cols = self.size.cols;
        let values = self.values.as_slice();
        Mat::from_fn(self.size.rows, cols, |i, j| values[i * cols + j])
    }

    pub fn executor(&self) -> &Executor {
        self.values.executor()
    }

    pub fn size(&self) -> Dim {
        self.size
    }

    pub fn rows(&self) -> usize {
        self.size.rows
    }

    pub fn cols(&self) -> usize {
        self.size.cols
    }

    /// Row-major values.
    pub fn values(&self) -> &[T] {
        self.values.as_slice()
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        self.values.as_mut_slice()
    }

    fn offset(&self, row: usize, col: usize) -> Result<usize, KError> {
        if row >= self.size.rows || col >= self.size.cols {
            return Err(KError::OutOfRange {
                row,
                col,
                size: self.size,
            });
        }
        Ok(row * self.size.cols + col)
    }

    /// Entry (row, col).
    pub fn at(&self, row: usize, col: usize) -> Result<T, KError> {
        let k = self.offset(row, col)?;
        Ok(self.values.as_slice()[k])
    }

    /// Overwrite entry (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<(), KError> {
        let k = self.offset(row, col)?;
        self.values.as_mut_slice()[k] = value;
        Ok(())
    }

    /// Set every entry to `value`.
    pub fn fill(&mut self, value: T) {
        let exec = self.executor().clone();
        exec.run("dense::fill", |mode| {
            kernels::fill(mode, self.values.as_mut_slice(), value)
        });
    }

    pub fn transpose(&self) -> Self {
        let cols = self.size.cols;
        let values = self.values.as_slice();
        Self::from_fn(self.executor(), self.size.transposed(), |i, j| values[j * cols + i])
    }

    fn check_same_shape(&self, op: &'static str, other: &Dense<T>) -> Result<(), KError> {
        if self.size != other.size {
            return Err(KError::dims(op, format!("{} vs {}", self.size, other.size)));
        }
        Ok(())
    }

    /// self ← other
    pub fn copy_from(&mut self, other: &Dense<T>) -> Result<(), KError> {
        self.check_same_shape("dense::copy", other)?;
        let exec = self.executor().clone();
        exec.dispatch("dense::copy", &[other.executor()], |mode| {
            kernels::copy(mode, other.values(), self.values.as_mut_slice())
        })
    }

    /// self ← α self
    pub fn scale(&mut self, alpha: T) {
        let exec = self.executor().clone();
        exec.run("dense::scale", |mode| {
            kernels::scale(mode, alpha, self.values.as_mut_slice())
        });
    }

    /// self ← α x + self (axpy)
    pub fn add_scaled(&mut self, alpha: T, x: &Dense<T>) -> Result<(), KError> {
        self.check_same_shape("dense::add_scaled", x)?;
        let exec = self.executor().clone();
        exec.dispatch("dense::add_scaled", &[x.executor()], |mode| {
            kernels::axpy(mode, alpha, x.values(), self.values.as_mut_slice())
        })
    }

    /// Inner product over all entries; synchronizes before returning.
    pub fn compute_dot(&self, other: &Dense<T>) -> Result<T, KError> {
        self.check_same_shape("dense::dot", other)?;
        let exec = self.executor();
        let dot = exec.dispatch("dense::dot", &[other.executor()], |mode| {
            kernels::dot(mode, self.values(), other.values())
        })?;
        exec.synchronize();
        Ok(dot)
    }

    /// Euclidean (Frobenius) norm; synchronizes before returning.
    pub fn compute_norm2(&self) -> T {
        let exec = self.executor();
        let norm = exec.run("dense::norm2", |mode| kernels::norm2(mode, self.values()));
        exec.synchronize();
        norm
    }
}

impl<T: Scalar> LinOp<T> for Dense<T> {
    fn executor(&self) -> &Executor {
        self.values.executor()
    }

    fn size(&self) -> Dim {
        self.size
    }

    fn apply(&self, b: &Dense<T>, x: &mut Dense<T>) -> Result<(), KError> {
        check_apply("dense::apply", self, b, x)?;
        let exec = self.values.executor();
        let x_exec = x.executor().clone();
        let (k, n) = (self.size.cols, b.cols());
        exec.dispatch("dense::apply", &[b.executor(), &x_exec], |mode| {
            kernels::gemm(mode, self.values(), k, b.values(), n, x.values_mut())
        })
    }
}
