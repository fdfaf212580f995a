//! Restarted GMRES(m) with right preconditioning (Saad §6.5, §9.3.2)
//!
//! Each cycle builds an orthonormal Krylov basis `v_0 … v_{m-1}` of
//! `A M` with modified Gram–Schmidt, reduces the Hessenberg matrix with
//! Givens rotations as columns arrive, and tracks the implicit residual
//! `|g_{j+1}|` after every Arnoldi step. The preconditioned directions
//! `z_j = M v_j` are stored, so the update is `x ← x + Z y` and the Arnoldi
//! relation `A Z = V H` holds even when `M` changes between applications.
//!
//! At the end of a cycle the solution is updated, the true residual is
//! recomputed and the criteria are checked again before restarting from it.
//! An invariant Krylov subspace (the new basis vector collapses to roundoff)
//! ends the solve as converged. A zero pivot in the rotated Hessenberg matrix
//! means the implicit residual is not attained, so the true residual decides;
//! if no criterion accepts it the solve stops with [`StopReason::Breakdown`].

use tracing::{debug, trace, warn};

use crate::core::traits::{LinOp, Scalar};
use crate::error::KError;
use crate::matrix::Dense;
use crate::stop::{CriterionSet, StopReason};
use crate::utils::convergence::{Monitor, SolveReport};

/// Apply the previous rotations to column `j` of `h`, build the rotation
/// that annihilates `h[j+1][j]` and apply it to `g`.
fn apply_givens_and_update_g<T: Scalar>(
    h: &mut [Vec<T>],
    g: &mut [T],
    cs: &mut [T],
    sn: &mut [T],
    j: usize,
) {
    for i in 0..j {
        let temp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
        h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
        h[i][j] = temp;
    }
    let h_kk = h[j][j];
    let h_k1k = h[j + 1][j];
    let r = h_kk.hypot(h_k1k);
    if r == T::zero() {
        cs[j] = T::one();
        sn[j] = T::zero();
    } else {
        cs[j] = h_kk / r;
        sn[j] = h_k1k / r;
    }
    h[j][j] = cs[j] * h_kk + sn[j] * h_k1k;
    h[j + 1][j] = T::zero();
    let temp = cs[j] * g[j] + sn[j] * g[j + 1];
    g[j + 1] = -sn[j] * g[j] + cs[j] * g[j + 1];
    g[j] = temp;
}

/// Solve the leading `steps × steps` upper-triangular system `H y = g`.
/// Zero pivots give zero coefficients.
fn back_substitution<T: Scalar>(h: &[Vec<T>], g: &[T], steps: usize) -> Vec<T> {
    let mut y = vec![T::zero(); steps];
    for i in (0..steps).rev() {
        let mut acc = g[i];
        for j in (i + 1)..steps {
            acc = acc - h[i][j] * y[j];
        }
        y[i] = if h[i][i] == T::zero() {
            T::zero()
        } else {
            acc / h[i][i]
        };
    }
    y
}

/// Why an Arnoldi cycle ended before the subspace limit.
enum CycleStop {
    Criterion(usize, StopReason),
    Invariant,
    Singular,
}

pub(crate) fn solve<T: Scalar>(
    a: &dyn LinOp<T>,
    m: &dyn LinOp<T>,
    criteria: &CriterionSet<T>,
    krylov_dim: usize,
    b: &Dense<T>,
    x: &mut Dense<T>,
) -> Result<SolveReport<T>, KError> {
    let exec = b.executor();
    let size = b.size();
    // Relative size of h_{j+1,j} below which the subspace counts as invariant.
    let invariant_tol = T::epsilon().sqrt();

    let mut r = b.clone();
    a.apply_scaled(-T::one(), x, T::one(), &mut r)?;
    let mut monitor = Monitor::new(criteria, b.compute_norm2());
    let mut beta = r.compute_norm2();
    if let Some((idx, reason)) = monitor.check(0, beta) {
        return Ok(monitor.finish(0, reason, Some(idx)));
    }
    if beta == T::zero() {
        return Ok(monitor.finish(0, StopReason::Converged, None));
    }

    let mut v_basis: Vec<Dense<T>> = Vec::with_capacity(krylov_dim);
    let mut z_basis: Vec<Dense<T>> = Vec::with_capacity(krylov_dim);
    let mut w = Dense::create(exec, size);
    let mut iteration = 0;

    loop {
        v_basis.clear();
        z_basis.clear();
        let mut v0 = r.clone();
        v0.scale(T::one() / beta);
        v_basis.push(v0);

        let mut h = vec![vec![T::zero(); krylov_dim]; krylov_dim + 1];
        let mut g = vec![T::zero(); krylov_dim + 1];
        g[0] = beta;
        let mut cs = vec![T::zero(); krylov_dim];
        let mut sn = vec![T::zero(); krylov_dim];
        let mut steps = 0;
        let mut stop = None;

        for j in 0..krylov_dim {
            iteration += 1;
            let mut z = Dense::create(exec, size);
            m.apply(&v_basis[j], &mut z)?;
            a.apply(&z, &mut w)?;
            z_basis.push(z);

            let w_norm = w.compute_norm2();
            for i in 0..=j {
                h[i][j] = w.compute_dot(&v_basis[i])?;
                w.add_scaled(-h[i][j], &v_basis[i])?;
            }
            let h_next = w.compute_norm2();
            h[j + 1][j] = h_next;

            apply_givens_and_update_g(&mut h, &mut g, &mut cs, &mut sn, j);
            steps = j + 1;

            let res = g[j + 1].abs();
            trace!(iteration, h_next = %h_next, "gmres arnoldi step");
            if h[j][j] == T::zero() {
                monitor.record(res);
                stop = Some(CycleStop::Singular);
                break;
            }
            if let Some((idx, reason)) = monitor.check(iteration, res) {
                stop = Some(CycleStop::Criterion(idx, reason));
                break;
            }
            if h_next <= invariant_tol * w_norm {
                debug!(iteration, "gmres: invariant Krylov subspace");
                stop = Some(CycleStop::Invariant);
                break;
            }
            if j + 1 < krylov_dim {
                let mut v = w.clone();
                v.scale(T::one() / h_next);
                v_basis.push(v);
            }
        }

        // x ← x + Z y
        let y = back_substitution(&h, &g, steps);
        for (yj, zj) in y.iter().zip(&z_basis) {
            x.add_scaled(*yj, zj)?;
        }
        let stop = match stop {
            Some(CycleStop::Criterion(idx, reason)) => {
                return Ok(monitor.finish(iteration, reason, Some(idx)));
            }
            other => other,
        };

        r.copy_from(b)?;
        a.apply_scaled(-T::one(), x, T::one(), &mut r)?;
        beta = r.compute_norm2();
        if let Some((idx, reason)) = monitor.revise(iteration, beta) {
            return Ok(monitor.finish(iteration, reason, Some(idx)));
        }
        if beta == T::zero() {
            return Ok(monitor.finish(iteration, StopReason::Converged, None));
        }
        match stop {
            Some(CycleStop::Invariant) => {
                return Ok(monitor.finish(iteration, StopReason::Converged, None));
            }
            Some(CycleStop::Singular) => {
                warn!(iteration, residual = %beta, "gmres breakdown: singular Hessenberg");
                return Ok(monitor.finish(
                    iteration,
                    StopReason::Breakdown("singular Hessenberg"),
                    None,
                ));
            }
            _ => debug!(iteration, residual = %beta, "gmres restart"),
        }
    }
}
