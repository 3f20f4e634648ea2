use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

#[derive(Debug, Default)]
struct PoolInner {
    free: Vec<Vec<u8>>,
    outstanding: usize,
    checkouts: usize,
}

/// Pool of reusable file read buffers.
///
/// A checked out [`PooledBuffer`] hands its storage back when dropped, on
/// every exit path of the code holding it.
#[derive(Debug, Clone, Default)]
pub struct MemPool {
    inner: Rc<RefCell<PoolInner>>,
}

impl MemPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check out a zeroed buffer of exactly `size` bytes
    pub fn checkout(&self, size: usize) -> PooledBuffer {
        let mut inner = self.inner.borrow_mut();
        let mut storage = match inner.free.iter().position(|b| b.capacity() >= size) {
            Some(index) => inner.free.swap_remove(index),
            None => inner.free.pop().unwrap_or_default(),
        };
        storage.clear();
        storage.resize(size, 0);

        inner.outstanding += 1;
        inner.checkouts += 1;
        PooledBuffer {
            storage,
            pool: Rc::clone(&self.inner),
        }
    }

    /// Buffers currently checked out
    pub fn outstanding(&self) -> usize {
        self.inner.borrow().outstanding
    }

    /// Buffers waiting for reuse
    pub fn pooled(&self) -> usize {
        self.inner.borrow().free.len()
    }

    /// Total number of checkouts since creation
    pub fn checkouts(&self) -> usize {
        self.inner.borrow().checkouts
    }
}

/// A buffer on loan from a [`MemPool`]
pub struct PooledBuffer {
    storage: Vec<u8>,
    pool: Rc<RefCell<PoolInner>>,
}

impl PooledBuffer {
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.storage
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut inner = self.pool.borrow_mut();
        inner.outstanding = inner.outstanding.saturating_sub(1);
        inner.free.push(std::mem::take(&mut self.storage));
    }
}
