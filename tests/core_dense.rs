//! Tests for dense and CSR operators: products, dot product and norm, on
//! both host executors.

use approx::assert_abs_diff_eq;
use faer::Mat;
use linop::{Csr, Dense, Dim, Executor, LinOp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn executors() -> Vec<Executor> {
    let mut out = vec![Executor::reference()];
    if let Ok(par) = Executor::parallel_with_threads(3) {
        out.push(par);
    }
    out
}

/// Random 7x5 matrix against a manual row-major product.
#[test]
fn matvec_random_small() {
    let (rows, cols) = (7, 5);
    let mut rng = StdRng::seed_from_u64(7);
    let vals: Vec<f64> = (0..rows * cols).map(|_| rng.r#gen()).collect();
    let xs: Vec<f64> = (0..cols).map(|_| rng.r#gen()).collect();
    for exec in executors() {
        let a = Dense::from_vec(&exec, Dim::new(rows, cols), vals.clone()).unwrap();
        let x = Dense::vector(&exec, &xs);
        let mut y = Dense::create(&exec, Dim::column(rows));
        a.apply(&x, &mut y).unwrap();
        for i in 0..rows {
            let expected = (0..cols).map(|j| vals[i * cols + j] * xs[j]).sum::<f64>();
            assert_abs_diff_eq!(y.at(i, 0).unwrap(), expected, epsilon = 1e-12);
        }
    }
}

/// Dense GEMM agrees with faer.
#[test]
fn matmat_matches_faer() {
    let mut rng = StdRng::seed_from_u64(11);
    let av: Vec<f64> = (0..24).map(|_| rng.r#gen()).collect();
    let bv: Vec<f64> = (0..12).map(|_| rng.r#gen()).collect();
    let a = Mat::from_fn(6, 4, |i, j| av[i * 4 + j]);
    let b = Mat::from_fn(4, 3, |i, j| bv[i * 3 + j]);
    let expected = &a * &b;
    for exec in executors() {
        let da = Dense::from_faer(&exec, &a);
        let db = Dense::from_faer(&exec, &b);
        let mut dc = Dense::create(&exec, Dim::new(6, 3));
        da.apply(&db, &mut dc).unwrap();
        let got = dc.to_faer();
        for i in 0..6 {
            for j in 0..3 {
                assert_abs_diff_eq!(got[(i, j)], expected[(i, j)], epsilon = 1e-12);
            }
        }
    }
}

/// Dot product and Euclidean norm for small vectors.
#[test]
fn dot_and_norm() {
    for exec in executors() {
        let x = Dense::vector(&exec, &[1.0, 2.0, 3.0]);
        let y = Dense::vector(&exec, &[4.0, -5.0, 6.0]);
        let dot = x.compute_dot(&y).unwrap();
        assert_abs_diff_eq!(dot, 1.0 * 4.0 + 2.0 * (-5.0) + 3.0 * 6.0, epsilon = 1e-12);
        let expected_norm = (1.0f64 + 4.0 + 9.0).sqrt();
        assert_abs_diff_eq!(x.compute_norm2(), expected_norm, epsilon = 1e-12);
    }
}

/// Long vectors exercise the chunked parallel reductions.
#[test]
fn long_vector_reductions_agree() {
    let n = 10_000;
    let mut rng = StdRng::seed_from_u64(3);
    let xs: Vec<f64> = (0..n).map(|_| rng.r#gen::<f64>() - 0.5).collect();
    let ys: Vec<f64> = (0..n).map(|_| rng.r#gen::<f64>() - 0.5).collect();
    let expected: f64 = xs.iter().zip(&ys).map(|(a, b)| a * b).sum();
    for exec in executors() {
        let x = Dense::vector(&exec, &xs);
        let mut y = Dense::vector(&exec, &ys);
        assert_abs_diff_eq!(x.compute_dot(&y).unwrap(), expected, epsilon = 1e-9);
        y.add_scaled(-1.0, &y.clone()).unwrap();
        assert_eq!(y.compute_norm2(), 0.0);
    }
}

/// CSR SpMV agrees with the dense product of the same matrix.
#[test]
fn csr_matches_dense() {
    let n = 30;
    let mut rng = StdRng::seed_from_u64(5);
    for exec in executors() {
        let dense = Dense::from_fn(&exec, Dim::square(n), |i, j| {
            if i == j || rng.r#gen::<f64>() < 0.1 {
                rng.r#gen::<f64>()
            } else {
                0.0
            }
        });
        let csr: Csr<f64> = Csr::from_dense(&dense).unwrap();
        let x = Dense::from_fn(&exec, Dim::column(n), |i, _| (i as f64).sin());
        let mut y1 = Dense::create(&exec, Dim::column(n));
        let mut y2 = Dense::create(&exec, Dim::column(n));
        dense.apply(&x, &mut y1).unwrap();
        csr.apply(&x, &mut y2).unwrap();
        for i in 0..n {
            assert_abs_diff_eq!(y1.at(i, 0).unwrap(), y2.at(i, 0).unwrap(), epsilon = 1e-12);
        }
    }
}
