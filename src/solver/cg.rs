//! Preconditioned Conjugate Gradient (Saad §9.2).
//!
//! For symmetric positive definite systems; definiteness is not checked.
//! A vanishing or non-finite `p·Ap` or `r·z` stops the iteration with
//! [`StopReason::Breakdown`], leaving the last iterate in `x`.

use tracing::{trace, warn};

use crate::core::traits::{LinOp, Scalar};
use crate::error::KError;
use crate::matrix::Dense;
use crate::stop::{CriterionSet, StopReason};
use crate::utils::convergence::{Monitor, SolveReport};

/// Zero, subnormal, infinite or NaN.
fn vanishes<T: Scalar>(v: T) -> bool {
    !v.is_normal()
}

pub(crate) fn solve<T: Scalar>(
    a: &dyn LinOp<T>,
    m: &dyn LinOp<T>,
    criteria: &CriterionSet<T>,
    b: &Dense<T>,
    x: &mut Dense<T>,
) -> Result<SolveReport<T>, KError> {
    let exec = b.executor();
    let size = b.size();

    // r = b - A x
    let mut r = b.clone();
    a.apply_scaled(-T::one(), x, T::one(), &mut r)?;
    let mut monitor = Monitor::new(criteria, b.compute_norm2());
    let res0 = r.compute_norm2();
    if let Some((idx, reason)) = monitor.check(0, res0) {
        return Ok(monitor.finish(0, reason, Some(idx)));
    }
    if res0 == T::zero() {
        return Ok(monitor.finish(0, StopReason::Converged, None));
    }

    let mut z = Dense::create(exec, size);
    m.apply(&r, &mut z)?;
    let mut rz = r.compute_dot(&z)?;
    if vanishes(rz) {
        warn!(iteration = 0, rz = %rz, "cg breakdown: r·z vanished");
        return Ok(monitor.finish(0, StopReason::Breakdown("r·z vanished"), None));
    }
    let mut p = z.clone();
    let mut q = Dense::create(exec, size);

    let mut k = 0;
    loop {
        a.apply(&p, &mut q)?;
        let pq = p.compute_dot(&q)?;
        if vanishes(pq) {
            warn!(iteration = k, pq = %pq, "cg breakdown: p·Ap vanished");
            return Ok(monitor.finish(k, StopReason::Breakdown("p·Ap vanished"), None));
        }
        let alpha = rz / pq;
        x.add_scaled(alpha, &p)?;
        r.add_scaled(-alpha, &q)?;
        k += 1;

        let res = r.compute_norm2();
        trace!(iteration = k, alpha = %alpha, "cg step");
        if let Some((idx, reason)) = monitor.check(k, res) {
            return Ok(monitor.finish(k, reason, Some(idx)));
        }
        if res == T::zero() {
            return Ok(monitor.finish(k, StopReason::Converged, None));
        }

        z.fill(T::zero());
        m.apply(&r, &mut z)?;
        let rz_new = r.compute_dot(&z)?;
        if vanishes(rz_new) {
            warn!(iteration = k, rz = %rz_new, "cg breakdown: r·z vanished");
            return Ok(monitor.finish(k, StopReason::Breakdown("r·z vanished"), None));
        }
        let beta = rz_new / rz;
        rz = rz_new;
        // p = z + βp
        p.scale(beta);
        p.add_scaled(T::one(), &z)?;
    }
}
