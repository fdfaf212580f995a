//! Execution contexts.
//!
//! An [`Executor`] identifies where operand data lives and where kernels run.
//! It is the only component that allocates container storage and the only
//! entry point for kernel dispatch. Every operation checks that all of its
//! operands were created on the same executor before any memory is touched;
//! data is never migrated implicitly between executors.
//!
//! Three kinds exist:
//! - [`ExecutorKind::Reference`]: sequential host execution.
//! - [`ExecutorKind::Parallel`]: host execution fanned out over a private
//!   rayon thread pool (feature `rayon`).
//! - [`ExecutorKind::Accelerator`]: device execution. No accelerator backend
//!   is compiled into this crate, so creating one reports
//!   [`KError::DeviceUnavailable`].
//!
//! Executors are cheap to clone; clones share identity. Containers keep a
//! clone of the handle they were created on, so the context stays alive as
//! long as any of its data does.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bitflags::bitflags;
use tracing::{debug, trace, warn};

use crate::error::KError;

pub mod array;
pub use array::Array;

#[cfg(feature = "rayon")]
mod pool;
#[cfg(feature = "rayon")]
use pool::WorkerPool;

/// Placeholder so `Inner` keeps one shape when the pool is compiled out.
#[cfg(not(feature = "rayon"))]
enum WorkerPool {}

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Kind of execution context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExecutorKind {
    /// Sequential host execution.
    Reference,
    /// Shared-memory parallel host execution.
    Parallel,
    /// Accelerator device.
    Accelerator,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutorKind::Reference => "reference",
            ExecutorKind::Parallel => "parallel",
            ExecutorKind::Accelerator => "accelerator",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// What an executor can do.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Buffers are directly addressable from the host.
        const HOST_MEMORY = 0b001;
        /// Kernels are split across worker threads.
        const PARALLEL    = 0b010;
        /// Dispatch may return before the kernel has completed.
        const ASYNC       = 0b100;
    }
}

/// How a dispatched kernel should execute.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Serial,
    Parallel,
}

struct Inner {
    id: usize,
    kind: ExecutorKind,
    device_id: usize,
    caps: Capabilities,
    allocated: AtomicUsize,
    #[cfg_attr(not(feature = "rayon"), allow(dead_code))]
    pool: Option<WorkerPool>,
}

/// Handle to an execution context.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<Inner>,
}

impl Executor {
    fn create(
        kind: ExecutorKind,
        device_id: usize,
        caps: Capabilities,
        pool: Option<WorkerPool>,
    ) -> Self {
        let exec = Executor {
            inner: Arc::new(Inner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                kind,
                device_id,
                caps,
                allocated: AtomicUsize::new(0),
                pool,
            }),
        };
        debug!(executor = %exec, threads = exec.num_threads(), "created executor");
        exec
    }

    /// Sequential host executor.
    pub fn reference() -> Self {
        Self::create(ExecutorKind::Reference, 0, Capabilities::HOST_MEMORY, None)
    }

    /// Parallel host executor with one worker per logical CPU.
    pub fn parallel() -> Result<Self, KError> {
        Self::parallel_with_threads(0)
    }

    /// Parallel host executor with `threads` workers (`0` = one per logical CPU).
    #[cfg(feature = "rayon")]
    pub fn parallel_with_threads(threads: usize) -> Result<Self, KError> {
        let pool = WorkerPool::new(threads)?;
        Ok(Self::create(
            ExecutorKind::Parallel,
            0,
            Capabilities::HOST_MEMORY | Capabilities::PARALLEL,
            Some(pool),
        ))
    }

    /// Parallel host executor with `threads` workers (`0` = one per logical CPU).
    #[cfg(not(feature = "rayon"))]
    pub fn parallel_with_threads(_threads: usize) -> Result<Self, KError> {
        warn!("parallel executor requested without the `rayon` feature");
        Err(KError::DeviceUnavailable(
            "parallel host executor requires the `rayon` feature".into(),
        ))
    }

    /// Accelerator executor for device `device_id`.
    pub fn accelerator(device_id: usize) -> Result<Self, KError> {
        warn!(device_id, "accelerator executor requested but no backend is available");
        Err(KError::DeviceUnavailable(format!(
            "accelerator {device_id}: no accelerator backend compiled in"
        )))
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn kind(&self) -> ExecutorKind {
        self.inner.kind
    }

    pub fn device_id(&self) -> usize {
        self.inner.device_id
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.caps
    }

    /// Number of threads kernels are spread over.
    pub fn num_threads(&self) -> usize {
        #[cfg(feature = "rayon")]
        if let Some(pool) = &self.inner.pool {
            return pool.threads();
        }
        1
    }

    /// True if `other` is a handle to this very context.
    pub fn same_as(&self, other: &Executor) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Fails with [`KError::ExecutorMismatch`] unless `other` is this executor.
    pub fn ensure_same(&self, op: &'static str, other: &Executor) -> Result<(), KError> {
        if self.same_as(other) {
            Ok(())
        } else {
            Err(KError::ExecutorMismatch {
                op,
                expected: self.to_string(),
                found: other.to_string(),
            })
        }
    }

    /// Allocate `len` default-initialized (zero) elements on this executor.
    pub fn alloc<T: Copy + Default>(&self, len: usize) -> Array<T> {
        Array::from_vec(self, vec![T::default(); len])
    }

    /// Take ownership of host data as an array on this executor.
    pub fn adopt<T: Copy>(&self, data: Vec<T>) -> Array<T> {
        Array::from_vec(self, data)
    }

    /// Bytes currently held by live arrays created on this executor.
    pub fn allocated_bytes(&self) -> usize {
        self.inner.allocated.load(Ordering::Acquire)
    }

    pub(crate) fn track_alloc(&self, bytes: usize) {
        self.inner.allocated.fetch_add(bytes, Ordering::AcqRel);
    }

    pub(crate) fn track_free(&self, bytes: usize) {
        self.inner.allocated.fetch_sub(bytes, Ordering::AcqRel);
    }

    /// Run `kernel` on this executor after checking operand locality.
    ///
    /// Every executor in `operands` must be this executor; otherwise nothing
    /// runs and [`KError::ExecutorMismatch`] is returned.
    pub fn dispatch<R, F>(&self, op: &'static str, operands: &[&Executor], kernel: F) -> Result<R, KError>
    where
        F: FnOnce(Mode) -> R + Send,
        R: Send,
    {
        for other in operands {
            self.ensure_same(op, other)?;
        }
        Ok(self.run(op, kernel))
    }

    /// Run a kernel whose operands all belong to this executor.
    ///
    /// Host executors run the kernel to completion before returning.
    pub fn run<R, F>(&self, op: &'static str, kernel: F) -> R
    where
        F: FnOnce(Mode) -> R + Send,
        R: Send,
    {
        trace!(executor = %self, op, "dispatch");
        #[cfg(feature = "rayon")]
        if let Some(pool) = &self.inner.pool {
            return pool.install(|| kernel(Mode::Parallel));
        }
        kernel(Mode::Serial)
    }

    /// Block until all work previously dispatched to this executor is done.
    pub fn synchronize(&self) {
        #[cfg(feature = "rayon")]
        if let Some(pool) = &self.inner.pool {
            pool.barrier();
        }
        trace!(executor = %self, "synchronized");
    }
}

impl fmt::Display for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExecutorKind::Accelerator => {
                write!(f, "{}:{}#{}", self.kind(), self.device_id(), self.id())
            }
            kind => write!(f, "{}#{}", kind, self.id()),
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("device_id", &self.device_id())
            .field("threads", &self.num_threads())
            .finish()
    }
}
