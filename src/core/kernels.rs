//! Element kernels behind every container operation.
//!
//! Each kernel has a sequential path and, with the `rayon` feature, a
//! data-parallel path selected by the executor's [`Mode`]. Callers reach them
//! only through [`Executor::dispatch`](crate::executor::Executor::dispatch) /
//! [`Executor::run`](crate::executor::Executor::run), never directly.
#![cfg_attr(not(feature = "rayon"), allow(unused_variables))]

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::core::traits::{IndexType, Scalar};
pub use crate::executor::Mode;

/// x · y
pub(crate) fn dot<T: Scalar>(mode: Mode, x: &[T], y: &[T]) -> T {
    debug_assert_eq!(x.len(), y.len());
    #[cfg(feature = "rayon")]
    if mode == Mode::Parallel {
        return x
            .par_iter()
            .zip(y.par_iter())
            .map(|(xi, yi)| *xi * *yi)
            .reduce(|| T::zero(), |acc, v| acc + v);
    }
    x.iter()
        .zip(y.iter())
        .fold(T::zero(), |acc, (xi, yi)| acc + *xi * *yi)
}

/// ‖x‖₂
pub(crate) fn norm2<T: Scalar>(mode: Mode, x: &[T]) -> T {
    #[cfg(feature = "rayon")]
    if mode == Mode::Parallel {
        return x
            .par_iter()
            .map(|xi| *xi * *xi)
            .reduce(|| T::zero(), |acc, v| acc + v)
            .sqrt();
    }
    x.iter().fold(T::zero(), |acc, xi| acc + *xi * *xi).sqrt()
}

/// y ← αx + y
pub(crate) fn axpy<T: Scalar>(mode: Mode, alpha: T, x: &[T], y: &mut [T]) {
    debug_assert_eq!(x.len(), y.len());
    #[cfg(feature = "rayon")]
    if mode == Mode::Parallel {
        y.par_iter_mut()
            .zip(x.par_iter())
            .for_each(|(yi, xi)| *yi = alpha * *xi + *yi);
        return;
    }
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi = alpha * *xi + *yi;
    }
}

/// x ← αx
pub(crate) fn scale<T: Scalar>(mode: Mode, alpha: T, x: &mut [T]) {
    #[cfg(feature = "rayon")]
    if mode == Mode::Parallel {
        x.par_iter_mut().for_each(|xi| *xi = alpha * *xi);
        return;
    }
    for xi in x.iter_mut() {
        *xi = alpha * *xi;
    }
}

pub(crate) fn fill<T: Scalar>(mode: Mode, x: &mut [T], value: T) {
    #[cfg(feature = "rayon")]
    if mode == Mode::Parallel {
        x.par_iter_mut().for_each(|xi| *xi = value);
        return;
    }
    x.fill(value);
}

pub(crate) fn copy<T: Scalar>(mode: Mode, src: &[T], dst: &mut [T]) {
    debug_assert_eq!(src.len(), dst.len());
    #[cfg(feature = "rayon")]
    if mode == Mode::Parallel {
        dst.par_iter_mut()
            .zip(src.par_iter())
            .for_each(|(d, s)| *d = *s);
        return;
    }
    dst.copy_from_slice(src);
}

/// c ← a b for row-major a (m×k), b (k×n), c (m×n).
pub(crate) fn gemm<T: Scalar>(mode: Mode, a: &[T], k: usize, b: &[T], n: usize, c: &mut [T]) {
    if n == 0 {
        return;
    }
    let row = |(i, c_row): (usize, &mut [T])| {
        c_row.fill(T::zero());
        let a_row = &a[i * k..(i + 1) * k];
        for (p, &aip) in a_row.iter().enumerate() {
            for (cj, bj) in c_row.iter_mut().zip(&b[p * n..(p + 1) * n]) {
                *cj = *cj + aip * *bj;
            }
        }
    };
    #[cfg(feature = "rayon")]
    if mode == Mode::Parallel {
        c.par_chunks_mut(n).enumerate().for_each(row);
        return;
    }
    c.chunks_mut(n).enumerate().for_each(row);
}

/// c ← A b for CSR A and row-major b (cols×n), c (rows×n).
pub(crate) fn csr_spmm<T: Scalar, I: IndexType>(
    mode: Mode,
    row_ptrs: &[I],
    col_idxs: &[I],
    values: &[T],
    b: &[T],
    n: usize,
    c: &mut [T],
) {
    if n == 0 {
        return;
    }
    let row = |(i, c_row): (usize, &mut [T])| {
        c_row.fill(T::zero());
        for k in row_ptrs[i].index()..row_ptrs[i + 1].index() {
            let col = col_idxs[k].index();
            let v = values[k];
            for (cj, bj) in c_row.iter_mut().zip(&b[col * n..(col + 1) * n]) {
                *cj = *cj + v * *bj;
            }
        }
    };
    #[cfg(feature = "rayon")]
    if mode == Mode::Parallel {
        c.par_chunks_mut(n).enumerate().for_each(row);
        return;
    }
    c.chunks_mut(n).enumerate().for_each(row);
}
