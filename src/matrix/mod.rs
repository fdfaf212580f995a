//! Matrix module: dense, sparse and identity operators.

use std::fmt;

pub mod dense;
pub use dense::Dense;
pub mod identity;
pub use identity::Identity;
pub mod sparse;
pub use sparse::Csr;

/// Operator or container shape.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dim {
    pub rows: usize,
    pub cols: usize,
}

impl Dim {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub const fn square(n: usize) -> Self {
        Self { rows: n, cols: n }
    }

    /// Shape of an `n`-element column vector.
    pub const fn column(n: usize) -> Self {
        Self { rows: n, cols: 1 }
    }

    pub const fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn transposed(&self) -> Self {
        Self {
            rows: self.cols,
            cols: self.rows,
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}
