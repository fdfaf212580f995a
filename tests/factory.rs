//! Factory protocol: validation at build, generate and solve time, reuse of
//! one factory, nesting solvers as preconditioners, and string options.

use std::sync::Arc;
use std::time::Duration;

use linop::{
    Cg, Criterion, Dense, Dim, Executor, Gmres, KError, LinOp, LinOpFactory, SolverBuilder,
    SolverKind, SolverOptions, StopReason,
};

fn spd(exec: &Executor, n: usize) -> Arc<dyn LinOp<f64>> {
    Arc::new(Dense::from_fn(exec, Dim::square(n), |i, j| {
        if i == j {
            4.0
        } else if i.abs_diff(j) == 1 {
            -1.0
        } else {
            0.0
        }
    }))
}

/// Executor and shape checks in `solve` fail before any iteration runs.
#[test]
fn solve_checks_operands_before_work() {
    let exec = Executor::reference();
    let other = Executor::reference();
    let solver = Cg::build()
        .with_max_iters(10)
        .on(&exec)
        .unwrap()
        .generate(spd(&exec, 4))
        .unwrap();

    let b_foreign = Dense::vector(&other, &[1.0; 4]);
    let mut x = Dense::create(&exec, Dim::column(4));
    assert!(matches!(
        solver.solve(&b_foreign, &mut x),
        Err(KError::ExecutorMismatch { .. })
    ));

    let b = Dense::vector(&exec, &[1.0; 4]);
    let mut x_short = Dense::create(&exec, Dim::column(3));
    assert!(matches!(
        solver.solve(&b, &mut x_short),
        Err(KError::DimensionMismatch { .. })
    ));
    assert!(solver.last_report().is_none());
}

/// One factory generates independent solvers for different matrices.
#[test]
fn one_factory_many_solvers() {
    let exec = Executor::reference();
    let factory = Gmres::build()
        .with_max_iters(50)
        .with_reduction_factor(1e-10)
        .on(&exec)
        .unwrap();
    for n in [3, 7, 12] {
        let solver = factory.generate(spd(&exec, n)).unwrap();
        let b = Dense::vector(&exec, &vec![1.0; n]);
        let mut x = Dense::create(&exec, Dim::column(n));
        assert!(solver.solve(&b, &mut x).unwrap().converged(), "n = {n}");
    }
}

/// A generated solver serves as the preconditioner of another solver.
#[test]
fn solver_factory_as_preconditioner() {
    let exec = Executor::reference();
    let n = 10;
    let inner: Arc<dyn LinOpFactory<f64>> = Arc::new(
        Cg::build()
            .with_max_iters(50)
            .with_reduction_factor(1e-14)
            .on(&exec)
            .unwrap(),
    );
    let outer = Gmres::build()
        .with_max_iters(20)
        .with_reduction_factor(1e-10)
        .with_preconditioner(inner)
        .on(&exec)
        .unwrap()
        .generate(spd(&exec, n))
        .unwrap();
    let b = Dense::from_fn(&exec, Dim::column(n), |i, _| (i + 1) as f64);
    let mut x = Dense::create(&exec, Dim::column(n));
    let report = outer.solve(&b, &mut x).unwrap();
    assert!(report.converged());
    // The inner solve is (nearly) exact, so one outer step suffices.
    assert!(report.iterations <= 2, "took {} iterations", report.iterations);
    assert_eq!(outer.preconditioner().size(), Dim::square(n));
}

/// A preconditioner factory bound to a different executor is rejected.
#[test]
fn preconditioner_factory_on_other_executor_is_rejected() {
    let exec = Executor::reference();
    let other = Executor::reference();
    let inner: Arc<dyn LinOpFactory<f64>> =
        Arc::new(Cg::build().with_max_iters(5).on(&other).unwrap());
    let res = Gmres::build().with_max_iters(5).with_preconditioner(inner).on(&exec);
    assert!(matches!(res, Err(KError::ExecutorMismatch { .. })));
}

/// Parsed `key=value` options configure the builder like the setters do.
#[test]
fn options_drive_the_builder() {
    let exec = Executor::reference();
    let opts = SolverOptions::parse([
        "solver=gmres",
        "max_iters=40",
        "reduction_factor=1e-9",
        "baseline=rhs_norm",
        "krylov_dim=5",
    ])
    .unwrap();
    let factory = SolverBuilder::<f64>::from_options(&opts).unwrap().on(&exec).unwrap();
    assert_eq!(factory.kind(), SolverKind::Gmres);
    assert_eq!(factory.krylov_dim(), 5);
    assert_eq!(factory.criteria().len(), 2);

    let solver = factory.generate(spd(&exec, 8)).unwrap();
    let b = Dense::vector(&exec, &[1.0; 8]);
    let mut x = Dense::create(&exec, Dim::column(8));
    let report = solver.solve(&b, &mut x).unwrap();
    assert!(report.converged());
    assert_eq!(report.criterion, Some(1));
}

/// Options naming another solver kind are rejected.
#[test]
fn options_must_match_builder_kind() {
    let opts = SolverOptions::parse(["solver=gmres"]).unwrap();
    assert!(matches!(
        Cg::build::<f64>().with_options(&opts),
        Err(KError::InvalidOption(_))
    ));
    let opts = SolverOptions::parse(["krylov_dim=4", "max_iters=3"]).unwrap();
    let exec = Executor::reference();
    assert!(matches!(
        Cg::build::<f64>().with_options(&opts).unwrap().on(&exec),
        Err(KError::InvalidOption(_))
    ));
    assert!(matches!(
        SolverOptions::parse(["preconditioner=jacobi"]),
        Err(KError::UnknownOption(_))
    ));
}

/// A cancelled token stops the solve at the next criteria check.
#[test]
fn cancel_token_stops_at_iteration_boundary() {
    let exec = Executor::reference();
    let token = linop::CancelToken::new();
    token.cancel();
    let solver = Cg::build()
        .with_max_iters(100)
        .with_criterion(token.criterion())
        .on(&exec)
        .unwrap()
        .generate(spd(&exec, 5))
        .unwrap();
    let b = Dense::vector(&exec, &[1.0; 5]);
    let mut x = Dense::create(&exec, Dim::column(5));
    let report = solver.solve(&b, &mut x).unwrap();
    assert_eq!(report.iterations, 0);
    assert_eq!(report.reason, StopReason::Condition("cancelled".into()));
    assert_eq!(report.criterion, Some(1));
}

/// A zero time budget stops before the first iteration.
#[test]
fn zero_time_limit_stops_immediately() {
    let exec = Executor::reference();
    let solver = Gmres::build()
        .with_criterion(Criterion::Time(Duration::ZERO))
        .on(&exec)
        .unwrap()
        .generate(spd(&exec, 5))
        .unwrap();
    let b = Dense::vector(&exec, &[1.0; 5]);
    let mut x = Dense::create(&exec, Dim::column(5));
    let report = solver.solve(&b, &mut x).unwrap();
    assert_eq!(report.iterations, 0);
    assert_eq!(report.reason, StopReason::TimeLimit);
}

/// Requesting an accelerator fails with `DeviceUnavailable`.
#[test]
fn accelerator_is_reported_unavailable() {
    assert!(matches!(
        Executor::accelerator(0),
        Err(KError::DeviceUnavailable(_))
    ));
}
