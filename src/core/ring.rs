//! The ring of blocks: owns the backing memory and the two counting
//! resources (`free_slots`, `filled_slots`) described in spec §4.1.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use memmap2::MmapMut;

use crate::core::sem::CountingSemaphore;
use crate::error::{FlowbufError, Result};

/// Backing storage for the ring's blocks: either a plain heap allocation or
/// a memory-mapped scratch file (`-t`/`-T`), mirroring the "RAM extension"
/// non-goal carve-out in spec §1.
enum Arena {
    Heap(Box<[u8]>),
    Mapped(MmapMut),
}

impl Arena {
    fn as_mut_ptr(&mut self) -> *mut u8 {
        match self {
            Arena::Heap(b) => b.as_mut_ptr(),
            Arena::Mapped(m) => m.as_mut_ptr(),
        }
    }
}

/// Circular array of `n` fixed-size blocks acting as a bounded queue
/// between the producer and the main consumer.
pub struct Ring {
    arena: std::cell::UnsafeCell<Arena>,
    block_size: usize,
    n: usize,
    free: CountingSemaphore,
    filled: CountingSemaphore,
    produce_cursor: AtomicUsize,
    consume_cursor: AtomicUsize,
    /// Locked (mlocked) flag, surfaced for the status/summary output only.
    locked: AtomicBool,
}

// SAFETY: the ring hands out disjoint block indices to the producer and the
// main consumer (spec §4.1: "No per-block locks are required because the
// producer and the main consumer each hold a distinct index at a time").
unsafe impl Sync for Ring {}
unsafe impl Send for Ring {}

impl Ring {
    /// Build a heap-backed ring of `n` blocks of `block_size` bytes.
    pub fn new_heap(block_size: usize, n: usize) -> Result<Self> {
        if n < crate::constants::MIN_BLOCK_COUNT {
            return Err(FlowbufError::config(format!(
                "block count {n} is below the minimum of {}",
                crate::constants::MIN_BLOCK_COUNT
            )));
        }
        let bytes = vec![0u8; block_size * n].into_boxed_slice();
        Ok(Self::from_arena(Arena::Heap(bytes), block_size, n))
    }

    /// Build a ring backed by a memory-mapped scratch file, used as a RAM
    /// extension when `-t`/`-T` select mmap-backed blocks.
    pub fn new_mapped(mmap: MmapMut, block_size: usize, n: usize) -> Result<Self> {
        if n < crate::constants::MIN_BLOCK_COUNT {
            return Err(FlowbufError::config(format!(
                "block count {n} is below the minimum of {}",
                crate::constants::MIN_BLOCK_COUNT
            )));
        }
        if mmap.len() < block_size * n {
            return Err(FlowbufError::config("scratch file too small for requested ring"));
        }
        Ok(Self::from_arena(Arena::Mapped(mmap), block_size, n))
    }

    fn from_arena(arena: Arena, block_size: usize, n: usize) -> Self {
        Self {
            arena: std::cell::UnsafeCell::new(arena),
            block_size,
            n,
            free: CountingSemaphore::new(n),
            filled: CountingSemaphore::new(0),
            produce_cursor: AtomicUsize::new(0),
            consume_cursor: AtomicUsize::new(0),
            locked: AtomicBool::new(false),
        }
    }

    /// mlock the backing arena so it can't be paged out (`-L`).
    #[cfg(unix)]
    pub fn lock_in_memory(&self) -> Result<()> {
        let ptr = unsafe { (*self.arena.get()).as_mut_ptr() };
        let len = self.total_bytes();
        let ret = unsafe { libc::mlock(ptr as *const libc::c_void, len) };
        if ret != 0 {
            return Err(FlowbufError::Io(std::io::Error::last_os_error()));
        }
        self.locked.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn num_blocks(&self) -> usize {
        self.n
    }

    fn total_bytes(&self) -> usize {
        self.block_size * self.n
    }

    /// Number of blocks currently holding unread data.
    pub fn filled_count(&self) -> usize {
        self.filled.available()
    }

    /// Number of blocks currently available for the producer to fill.
    pub fn free_count(&self) -> usize {
        self.free.available()
    }

    /// Producer-side: acquire a free slot, blocking until one is available.
    /// Returns `None` if interrupted by shutdown.
    pub fn acquire_free_slot(&self, terminate: &AtomicBool) -> Option<usize> {
        if !self.free.acquire_interruptible(terminate) {
            return None;
        }
        Some(self.produce_cursor.fetch_add(1, Ordering::AcqRel) % self.n)
    }

    /// Producer-side: publish the block at `index` as filled.
    pub fn publish_filled(&self, _index: usize) {
        self.filled.release();
    }

    /// Consumer-side: acquire a filled slot, blocking until one is
    /// available. Returns `None` if interrupted by shutdown.
    pub fn acquire_filled_slot(&self, terminate: &AtomicBool) -> Option<usize> {
        if !self.filled.acquire_interruptible(terminate) {
            return None;
        }
        Some(self.consume_cursor.fetch_add(1, Ordering::AcqRel) % self.n)
    }

    /// Consumer-side: return the block at `index` to the free pool.
    pub fn release_free(&self, _index: usize) {
        self.free.release();
    }

    /// Wake every thread parked on either semaphore so it can observe
    /// `terminate` (spec §5, "Cancellation").
    pub fn wake_all(&self) {
        self.free.wake_all();
        self.filled.wake_all();
    }

    /// Borrow block `index` immutably. Caller must hold the slot (i.e. have
    /// received `index` from `acquire_filled_slot`/`acquire_free_slot` and
    /// not yet released it).
    ///
    /// # Safety
    /// The ring's invariant (disjoint indices per side) makes this race
    /// free in practice, but the compiler cannot see that, hence `unsafe`.
    pub unsafe fn block(&self, index: usize) -> &[u8] {
        let ptr = (*self.arena.get()).as_mut_ptr().add(index * self.block_size);
        std::slice::from_raw_parts(ptr, self.block_size)
    }

    /// Borrow block `index` mutably. See [`Ring::block`] for the safety
    /// contract.
    pub unsafe fn block_mut(&self, index: usize) -> &mut [u8] {
        let ptr = (*self.arena.get()).as_mut_ptr().add(index * self.block_size);
        std::slice::from_raw_parts_mut(ptr, self.block_size)
    }

    /// Raw pointer to the start of block `index`, used by the fan-out
    /// barrier to publish a (pointer, size) pair to auxiliary consumers.
    pub fn block_ptr(&self, index: usize) -> *const u8 {
        unsafe { (*self.arena.get()).as_mut_ptr().add(index * self.block_size) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_invariant_holds() {
        let ring = Ring::new_heap(16, 5).unwrap();
        assert_eq!(ring.free_count() + ring.filled_count(), 5);
        let terminate = AtomicBool::new(false);
        let idx = ring.acquire_free_slot(&terminate).unwrap();
        assert_eq!(ring.free_count() + ring.filled_count(), 4);
        ring.publish_filled(idx);
        assert_eq!(ring.free_count() + ring.filled_count(), 5);
        let idx2 = ring.acquire_filled_slot(&terminate).unwrap();
        assert_eq!(idx, idx2);
        ring.release_free(idx2);
        assert_eq!(ring.free_count(), 5);
    }

    #[test]
    fn minimum_block_count_enforced() {
        assert!(Ring::new_heap(16, 4).is_err());
        assert!(Ring::new_heap(16, 5).is_ok());
    }

    #[test]
    fn block_write_read_roundtrip() {
        let ring = Ring::new_heap(8, 5).unwrap();
        let terminate = AtomicBool::new(false);
        let idx = ring.acquire_free_slot(&terminate).unwrap();
        unsafe {
            ring.block_mut(idx).copy_from_slice(b"abcdefgh");
        }
        ring.publish_filled(idx);
        let idx2 = ring.acquire_filled_slot(&terminate).unwrap();
        unsafe {
            assert_eq!(ring.block(idx2), b"abcdefgh");
        }
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn every_acquired_index_stays_within_bounds(n in 5usize..64, cycles in 0usize..500) {
                let ring = Ring::new_heap(4, n).unwrap();
                let terminate = AtomicBool::new(false);
                for _ in 0..cycles {
                    let idx = ring.acquire_free_slot(&terminate).unwrap();
                    prop_assert!(idx < n);
                    ring.publish_filled(idx);
                    let idx2 = ring.acquire_filled_slot(&terminate).unwrap();
                    prop_assert_eq!(idx, idx2);
                    ring.release_free(idx2);
                }
                prop_assert_eq!(ring.free_count(), n);
                prop_assert_eq!(ring.filled_count(), 0);
            }
        }
    }
}
