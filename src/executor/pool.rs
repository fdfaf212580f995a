// rayon-based worker pool backing the parallel host executor

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::KError;

pub(crate) struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Build a private pool; `threads == 0` means one worker per logical CPU.
    pub(crate) fn new(threads: usize) -> Result<Self, KError> {
        let threads = if threads == 0 { num_cpus::get() } else { threads };
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("linop-worker-{i}"))
            .build()
            .map_err(|e| KError::DeviceUnavailable(format!("parallel executor: {e}")))?;
        Ok(Self { pool })
    }

    pub(crate) fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub(crate) fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    pub(crate) fn barrier(&self) {
        self.pool.install(|| rayon::scope(|_| {}));
    }
}
