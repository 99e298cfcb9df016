use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};

/// Per-call working buffers of a propagation algorithm: tentative
/// intensities, arrival directions and the open set of cells.
pub trait Scratch: Default + Send {
    /// Zeroes the buffers and sizes them for a local grid of `cells`.
    fn prepare(&mut self, cells: usize);
}

/// Bounded set of propagation buffers shared by the workers that compute
/// sources in parallel. Each `calculate` call checks out one set for its
/// duration; no more than `limit` sets ever exist, so a call that finds
/// none idle and the limit reached blocks until another call returns one.
pub struct ScratchPool<T> {
    idle_tx: Sender<T>,
    idle_rx: Receiver<T>,
    created: AtomicUsize,
    limit: usize,
}

impl<T: Scratch> ScratchPool<T> {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        let (idle_tx, idle_rx) = bounded(limit);
        Self {
            idle_tx,
            idle_rx,
            created: AtomicUsize::new(0),
            limit,
        }
    }

    /// Two sets per propagation worker.
    pub fn with_capacity_from_workers(worker_count: usize) -> Self {
        Self::new(worker_count.max(1) * 2)
    }

    /// Buffers cleared and sized for a local grid of `cells`. Prefers an
    /// idle set, then a fresh one while under the limit, then waits.
    pub fn acquire(&self, cells: usize) -> PooledScratch<'_, T> {
        let scratch = match self.idle_rx.try_recv() {
            Ok(scratch) => scratch,
            Err(_) if self.try_reserve() => T::default(),
            Err(_) => self.wait_for_idle(),
        };
        self.lease(scratch, cells)
    }

    // Claims one slot under the limit; false once every slot is taken.
    fn try_reserve(&self) -> bool {
        self.created
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < self.limit).then_some(n + 1))
            .is_ok()
    }

    fn wait_for_idle(&self) -> T {
        // The pool holds its own sender, so `recv` only returns once a
        // guard hands its buffers back.
        loop {
            if let Ok(scratch) = self.idle_rx.recv() {
                return scratch;
            }
        }
    }

    fn lease(&self, mut scratch: T, cells: usize) -> PooledScratch<'_, T> {
        scratch.prepare(cells);
        PooledScratch {
            scratch: Some(scratch),
            pool: self,
        }
    }

    /// Buffer sets created so far; never above [`capacity`](Self::capacity).
    #[inline]
    pub fn allocated(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.limit
    }

    fn give_back(&self, scratch: T) {
        let _ = self.idle_tx.send(scratch);
    }
}

/// Buffers checked out for one propagation; returned to the pool on drop.
pub struct PooledScratch<'pool, T: Scratch> {
    scratch: Option<T>,
    pool: &'pool ScratchPool<T>,
}

impl<T: Scratch> Deref for PooledScratch<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.scratch.as_ref().expect("scratch already released")
    }
}

impl<T: Scratch> DerefMut for PooledScratch<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.scratch.as_mut().expect("scratch already released")
    }
}

impl<T: Scratch> Drop for PooledScratch<'_, T> {
    fn drop(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            self.pool.give_back(scratch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[derive(Default)]
    struct Buf {
        cells: Vec<u32>,
        prepared: usize,
    }

    impl Scratch for Buf {
        fn prepare(&mut self, cells: usize) {
            self.cells.clear();
            self.cells.resize(cells, 0);
            self.prepared += 1;
        }
    }

    #[test]
    fn reuses_released_scratch() {
        let pool: ScratchPool<Buf> = ScratchPool::new(2);
        {
            let mut a = pool.acquire(4);
            a.cells[0] = 7;
        }
        let b = pool.acquire(8);
        assert_eq!(b.cells.len(), 8);
        assert_eq!(b.cells[0], 0);
        assert_eq!(b.prepared, 2);
        assert_eq!(pool.allocated(), 1);
    }

    #[test]
    fn never_exceeds_capacity_under_contention() {
        let pool: ScratchPool<Buf> = ScratchPool::new(3);
        (0..256).into_par_iter().for_each(|i| {
            let mut s = pool.acquire(i % 17 + 1);
            s.cells[0] = i as u32;
        });
        assert!(pool.allocated() <= pool.capacity());
    }
}
