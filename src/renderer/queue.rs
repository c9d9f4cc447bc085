//! Lock-free single-producer/single-consumer frame queue.
//!
//! One slot is always kept free as a sentinel so that `read == write`
//! unambiguously means empty: a queue of `N` slots holds at most `N - 1`
//! buffers. When full, new buffers are rejected (drop-newest).

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU16, Ordering};

/// Number of slots in the camera frame queue.
pub const FRAME_QUEUE_SLOTS: usize = 5;

/// Fixed-capacity SPSC ring of owned buffers.
///
/// `enqueue` must only be called from one producer thread and `dequeue`
/// from one consumer thread at a time; `clear` requires both sides to be
/// quiescent. Slot ownership moves through atomic pointer swaps, so a
/// contract violation can lose or reject a buffer but never duplicate one.
pub struct RingQueue<B, const N: usize = FRAME_QUEUE_SLOTS> {
    slots: [AtomicPtr<B>; N],
    write_index: AtomicU16,
    read_index: AtomicU16,
    _owns: PhantomData<B>,
}

// Slots hand `B` across threads by value; `B` itself is never shared.
unsafe impl<B: Send, const N: usize> Send for RingQueue<B, N> {}
unsafe impl<B: Send, const N: usize> Sync for RingQueue<B, N> {}

impl<B, const N: usize> RingQueue<B, N> {
    const SLOTS: u16 = {
        assert!(N >= 2 && N <= u16::MAX as usize, "slot count out of range");
        N as u16
    };

    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())),
            write_index: AtomicU16::new(0),
            read_index: AtomicU16::new(0),
            _owns: PhantomData,
        }
    }

    /// Maximum number of buffers held at once.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Push a buffer. Hands it back when the queue is full.
    pub fn enqueue(&self, buffer: B) -> Result<(), B> {
        let write = self.write_index.load(Ordering::Relaxed);
        let next = (write + 1) % Self::SLOTS;
        if self.read_index.load(Ordering::Acquire) == next {
            return Err(buffer);
        }

        let raw = Box::into_raw(Box::new(buffer));
        let stale = self.slots[write as usize].swap(raw, Ordering::AcqRel);
        if !stale.is_null() {
            tracing::error!("frame queue slot {write} was still occupied on enqueue");
            debug_assert!(stale.is_null(), "occupied slot at write index");
            // SAFETY: non-null slot pointers always come from Box::into_raw
            // and the swap made this call their only owner.
            drop(unsafe { Box::from_raw(stale) });
        }
        self.write_index.store(next, Ordering::Release);
        Ok(())
    }

    /// Pop the oldest buffer, releasing its slot immediately.
    pub fn dequeue(&self) -> Option<B> {
        let read = self.read_index.load(Ordering::Relaxed);
        if read == self.write_index.load(Ordering::Acquire) {
            return None;
        }

        let raw = self.slots[read as usize].swap(ptr::null_mut(), Ordering::AcqRel);
        if raw.is_null() {
            tracing::error!("frame queue slot {read} was empty on dequeue");
            debug_assert!(!raw.is_null(), "empty slot at read index");
            return None;
        }
        self.read_index
            .store((read + 1) % Self::SLOTS, Ordering::Release);
        // SAFETY: see `enqueue`; the swap transferred sole ownership here.
        Some(*unsafe { Box::from_raw(raw) })
    }

    /// Reset both indices and release every stored buffer. Idempotent.
    pub fn clear(&self) {
        self.write_index.store(0, Ordering::Release);
        self.read_index.store(0, Ordering::Release);
        for slot in &self.slots {
            let raw = slot.swap(ptr::null_mut(), Ordering::AcqRel);
            if !raw.is_null() {
                // SAFETY: see `enqueue`.
                drop(unsafe { Box::from_raw(raw) });
            }
        }
    }

    /// Number of queued buffers.
    pub fn len(&self) -> usize {
        let write = self.write_index.load(Ordering::Acquire) as usize;
        let read = self.read_index.load(Ordering::Acquire) as usize;
        (write + N - read) % N
    }

    pub fn is_empty(&self) -> bool {
        self.read_index.load(Ordering::Acquire) == self.write_index.load(Ordering::Acquire)
    }
}

impl<B, const N: usize> Default for RingQueue<B, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, const N: usize> Drop for RingQueue<B, N> {
    fn drop(&mut self) {
        self.clear();
    }
}
