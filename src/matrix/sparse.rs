//! Compressed sparse row storage.
//!
//! Invariants enforced at construction:
//! - `row_ptrs.len() == rows + 1`, `row_ptrs[0] == 0`, non-decreasing,
//!   `row_ptrs[rows] == nnz`;
//! - `col_idxs.len() == values.len() == nnz`, every column in `[0, cols)`;
//! - no column repeats within a row (order within a row is free).

use crate::core::kernels;
use crate::core::traits::{IndexType, LinOp, Scalar, check_apply};
use crate::error::KError;
use crate::executor::{Array, Executor};
use crate::matrix::{Dense, Dim};

/// Sparse matrix in CSR format bound to an executor.
#[derive(Clone, Debug)]
pub struct Csr<T: Scalar, I: IndexType = i32> {
    size: Dim,
    row_ptrs: Array<I>,
    col_idxs: Array<I>,
    values: Array<T>,
}

impl<T: Scalar, I: IndexType> Csr<T, I> {
    /// Build a CSR from raw row pointers, column indices and values.
    pub fn new(
        exec: &Executor,
        size: Dim,
        row_ptrs: Vec<I>,
        col_idxs: Vec<I>,
        values: Vec<T>,
    ) -> Result<Self, KError> {
        validate(size, &row_ptrs, &col_idxs, values.len())?;
        Ok(Self {
            size,
            row_ptrs: exec.adopt(row_ptrs),
            col_idxs: exec.adopt(col_idxs),
            values: exec.adopt(values),
        })
    }

    /// Assemble from 0-based `(row, col, value)` triplets.
    ///
    /// Entries are sorted by row and column; repeated coordinates are summed.
    pub fn from_triplets(exec: &Executor, size: Dim, triplets: &[(usize, usize, T)]) -> Result<Self, KError> {
        if let Some(&(row, col, _)) = triplets
            .iter()
            .find(|(r, c, _)| *r >= size.rows || *c >= size.cols)
        {
            return Err(KError::OutOfRange { row, col, size });
        }
        let mut entries = triplets.to_vec();
        entries.sort_by_key(|&(r, c, _)| (r, c));

        let mut row_ptrs = vec![0usize; size.rows + 1];
        let mut col_idxs: Vec<usize> = Vec::with_capacity(entries.len());
        let mut values: Vec<T> = Vec::with_capacity(entries.len());
        let mut last: Option<(usize, usize)> = None;
        for (r, c, v) in entries {
            if last == Some((r, c)) {
                if let Some(acc) = values.last_mut() {
                    *acc = *acc + v;
                }
                continue;
            }
            last = Some((r, c));
            row_ptrs[r + 1] += 1;
            col_idxs.push(c);
            values.push(v);
        }
        for r in 0..size.rows {
            row_ptrs[r + 1] += row_ptrs[r];
        }
        Self::new(exec, size, to_index(row_ptrs)?, to_index(col_idxs)?, values)
    }

    /// Compress a dense matrix, dropping zero entries.
    ///
    /// Signed zeros compare equal to zero and are dropped too, so a round
    /// trip through [`to_dense`](Self::to_dense) turns `-0.0` into `+0.0`.
    pub fn from_dense(dense: &Dense<T>) -> Result<Self, KError> {
        let size = dense.size();
        dense.executor().synchronize();
        let vals = dense.values();
        let mut row_ptrs = Vec::with_capacity(size.rows + 1);
        let mut col_idxs = Vec::new();
        let mut values = Vec::new();
        row_ptrs.push(0usize);
        for i in 0..size.rows {
            for j in 0..size.cols {
                let v = vals[i * size.cols + j];
                if v != T::zero() {
                    col_idxs.push(j);
                    values.push(v);
                }
            }
            row_ptrs.push(col_idxs.len());
        }
        Self::new(
            dense.executor(),
            size,
            to_index(row_ptrs)?,
            to_index(col_idxs)?,
            values,
        )
    }

    /// Expand into dense storage on the same executor.
    pub fn to_dense(&self) -> Dense<T> {
        let mut dense = Dense::create(self.executor(), self.size);
        let cols = self.size.cols;
        let out = dense.values_mut();
        let (rp, ci, vals) = (self.row_ptrs(), self.col_idxs(), self.values());
        for row in 0..self.size.rows {
            for k in rp[row].index()..rp[row + 1].index() {
                out[row * cols + ci[k].index()] = vals[k];
            }
        }
        dense
    }

    pub fn executor(&self) -> &Executor {
        self.values.executor()
    }

    pub fn size(&self) -> Dim {
        self.size
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row_ptrs(&self) -> &[I] {
        self.row_ptrs.as_slice()
    }

    pub fn col_idxs(&self) -> &[I] {
        self.col_idxs.as_slice()
    }

    pub fn values(&self) -> &[T] {
        self.values.as_slice()
    }

    /// Stored values; the sparsity pattern stays fixed.
    pub fn values_mut(&mut self) -> &mut [T] {
        self.values.as_mut_slice()
    }
}

fn to_index<I: IndexType>(raw: Vec<usize>) -> Result<Vec<I>, KError> {
    raw.into_iter()
        .map(|i| {
            I::from_index(i).ok_or_else(|| {
                KError::InvalidStructure(format!("index {i} does not fit the index type"))
            })
        })
        .collect()
}

fn validate<I: IndexType>(size: Dim, row_ptrs: &[I], col_idxs: &[I], nnz: usize) -> Result<(), KError> {
    const OP: &str = "csr::new";
    if row_ptrs.len() != size.rows + 1 {
        return Err(KError::dims(
            OP,
            format!("{} row pointers for {} rows", row_ptrs.len(), size.rows),
        ));
    }
    if col_idxs.len() != nnz {
        return Err(KError::dims(
            OP,
            format!("{} column indices for {nnz} values", col_idxs.len()),
        ));
    }
    if row_ptrs[0].try_index() != Some(0) {
        return Err(KError::InvalidStructure("row_ptrs[0] must be 0".into()));
    }
    let last = row_ptrs[size.rows]
        .try_index()
        .ok_or_else(|| KError::InvalidStructure("negative row pointer".into()))?;
    if last != nnz {
        return Err(KError::dims(
            OP,
            format!("row_ptrs ends at {last} but {nnz} entries are stored"),
        ));
    }
    // seen[col] == row + 1 marks col as used in `row`
    let mut seen = vec![0usize; size.cols];
    for row in 0..size.rows {
        let (start, end) = match (row_ptrs[row].try_index(), row_ptrs[row + 1].try_index()) {
            (Some(s), Some(e)) if s <= e && e <= nnz => (s, e),
            _ => {
                return Err(KError::InvalidStructure(format!(
                    "row pointers not monotone at row {row}"
                )));
            }
        };
        for &c in &col_idxs[start..end] {
            let col = c.try_index().ok_or_else(|| {
                KError::InvalidStructure(format!("negative column index in row {row}"))
            })?;
            if col >= size.cols {
                return Err(KError::OutOfRange { row, col, size });
            }
            if seen[col] == row + 1 {
                return Err(KError::InvalidStructure(format!(
                    "duplicate column {col} in row {row}"
                )));
            }
            seen[col] = row + 1;
        }
    }
    Ok(())
}

impl<T: Scalar, I: IndexType> LinOp<T> for Csr<T, I> {
    fn executor(&self) -> &Executor {
        self.values.executor()
    }

    fn size(&self) -> Dim {
        self.size
    }

    fn apply(&self, b: &Dense<T>, x: &mut Dense<T>) -> Result<(), KError> {
        check_apply("csr::apply", self, b, x)?;
        let exec = self.values.executor();
        let x_exec = x.executor().clone();
        let n = b.cols();
        exec.dispatch("csr::apply", &[b.executor(), &x_exec], |mode| {
            kernels::csr_spmm(
                mode,
                self.row_ptrs(),
                self.col_idxs(),
                self.values(),
                b.values(),
                n,
                x.values_mut(),
            )
        })
    }
}
