//! Executor-owned contiguous buffers.

use std::fmt;
use std::mem::size_of;

use super::Executor;

/// A contiguous buffer allocated through an [`Executor`].
///
/// The array reports its size to the executor on creation and releases it
/// when dropped. Clones are new allocations on the same executor.
pub struct Array<T: Copy> {
    exec: Executor,
    data: Vec<T>,
}

impl<T: Copy> Array<T> {
    pub(crate) fn from_vec(exec: &Executor, data: Vec<T>) -> Self {
        exec.track_alloc(data.len() * size_of::<T>());
        Self {
            exec: exec.clone(),
            data,
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.exec
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Copy the contents back to a host vector.
    pub fn to_vec(&self) -> Vec<T> {
        self.exec.synchronize();
        self.data.clone()
    }
}

impl<T: Copy> Clone for Array<T> {
    fn clone(&self) -> Self {
        Array::from_vec(&self.exec, self.data.clone())
    }
}

impl<T: Copy> Drop for Array<T> {
    fn drop(&mut self) {
        self.exec.track_free(self.data.len() * size_of::<T>());
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Array<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("executor", &self.exec)
            .field("data", &self.data)
            .finish()
    }
}
