// Identity operator; the default preconditioner of every solver.

use std::marker::PhantomData;

use crate::core::traits::{LinOp, Scalar, check_apply};
use crate::error::KError;
use crate::executor::Executor;
use crate::matrix::{Dense, Dim};

/// x ← b
#[derive(Clone, Debug)]
pub struct Identity<T> {
    exec: Executor,
    n: usize,
    _scalar: PhantomData<fn() -> T>,
}

impl<T: Scalar> Identity<T> {
    pub fn new(exec: &Executor, n: usize) -> Self {
        Self {
            exec: exec.clone(),
            n,
            _scalar: PhantomData,
        }
    }
}

impl<T: Scalar> LinOp<T> for Identity<T> {
    fn executor(&self) -> &Executor {
        &self.exec
    }

    fn size(&self) -> Dim {
        Dim::square(self.n)
    }

    fn apply(&self, b: &Dense<T>, x: &mut Dense<T>) -> Result<(), KError> {
        check_apply("identity::apply", self, b, x)?;
        x.copy_from(b)
    }
}
