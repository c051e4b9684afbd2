//! Bounded single-producer/single-consumer queue.
//!
//! The build pipeline moves update records from the driver thread to one
//! consumer thread per shard through these rings. There is exactly one
//! [`Producer`] and one [`Consumer`] per ring; neither is cloneable, so the
//! single-producer/single-consumer discipline is enforced by ownership.
//! Head and tail are monotonically increasing counters masked into the
//! buffer; release/acquire pairs on them order the slot accesses. No
//! allocation happens after construction.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Inner<T> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Next slot the producer writes. Written by the producer only.
    head: AtomicUsize,
    /// Next slot the consumer reads. Written by the consumer only.
    tail: AtomicUsize,
}

// The cells are only touched from whichever side owns the index that maps to
// them: a slot in [tail, head) belongs to the consumer, the rest to the
// producer.
unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send> Sync for Inner<T> {}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let mut tail = *self.tail.get_mut();
        while tail != head {
            unsafe { self.buf[tail & self.mask].get_mut().assume_init_drop() };
            tail = tail.wrapping_add(1);
        }
    }
}

/// Write end of the ring.
pub struct Producer<T> {
    inner: Arc<Inner<T>>,
}

/// Read end of the ring.
pub struct Consumer<T> {
    inner: Arc<Inner<T>>,
}

/// Creates a ring with room for `capacity` elements.
///
/// `capacity` must be a power of two so slot selection is a mask.
pub fn channel<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(
        capacity.is_power_of_two(),
        "ring capacity must be a power of two, got {}",
        capacity
    );
    let buf = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let inner = Arc::new(Inner {
        buf,
        mask: capacity - 1,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });
    (
        Producer {
            inner: Arc::clone(&inner),
        },
        Consumer { inner },
    )
}

impl<T> Producer<T> {
    /// Enqueues `value`, or hands it back when the ring is full.
    pub fn push(&mut self, value: T) -> Result<(), T> {
        let inner = &*self.inner;
        let head = inner.head.load(Ordering::Relaxed);
        let tail = inner.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) > inner.mask {
            return Err(value);
        }
        // The slot is vacant: the consumer has moved past it and cannot come
        // back before observing the head bump below.
        unsafe { (*inner.buf[head & inner.mask].get()).write(value) };
        inner.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }
}

impl<T> Consumer<T> {
    /// Dequeues the oldest element, if any.
    pub fn pop(&mut self) -> Option<T> {
        let inner = &*self.inner;
        let tail = inner.tail.load(Ordering::Relaxed);
        let head = inner.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let value = unsafe { (*inner.buf[tail & inner.mask].get()).assume_init_read() };
        inner.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }
}
