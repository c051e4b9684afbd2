//! Per-shard consumer that folds a stream of updates into its shard.
//!
//! An [`Accumulator`] owns exactly one shard map for the duration of a
//! build: `start` moves the map into a spawned consumer thread, `stop`
//! joins that thread and takes the map back. The producer side talks to
//! the consumer only through a bounded SPSC ring, so no lock is involved.
//!
//! Lifecycle is explicit: the caller must `start` before pushing and must
//! have ceased pushing before `stop`, so the consumer's post-loop drain
//! observes every enqueued record.

use crate::sharded_state::Shard;
use crate::spin_key::SpinKey;
use crate::spsc;
use num_complex::Complex64;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// One additive contribution to a single basis configuration.
#[derive(Debug, Clone, Copy)]
pub struct Update {
    pub key: SpinKey,
    pub delta: Complex64,
}

/// Ring capacity per shard, in update records.
pub(crate) const RING_CAPACITY: usize = 1024;

pub struct Accumulator {
    /// Present while the consumer is not running.
    shard: Option<Shard>,
    producer: Option<spsc::Producer<Update>>,
    done: Arc<AtomicBool>,
    worker: Option<JoinHandle<Shard>>,
}

fn fold(shard: &mut Shard, update: Update) {
    *shard
        .entry(update.key)
        .or_insert(Complex64::new(0.0, 0.0)) += update.delta;
}

impl Accumulator {
    /// Wraps a shard; the consumer is not running yet.
    pub fn new(shard: Shard) -> Self {
        Self {
            shard: Some(shard),
            producer: None,
            done: Arc::new(AtomicBool::new(true)),
            worker: None,
        }
    }

    /// Spawns the consumer thread and hands it the shard.
    pub fn start(&mut self) {
        assert!(self.worker.is_none(), "accumulator already started");
        let mut shard = match self.shard.take() {
            Some(shard) => shard,
            None => panic!("accumulator was already stopped; its shard is gone"),
        };
        let (producer, mut consumer) = spsc::channel(RING_CAPACITY);
        let done = Arc::clone(&self.done);
        done.store(false, Ordering::Release);
        let worker = std::thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                while let Some(update) = consumer.pop() {
                    fold(&mut shard, update);
                }
                std::hint::spin_loop();
            }
            // The producer has quiesced; whatever is still queued is final.
            while let Some(update) = consumer.pop() {
                fold(&mut shard, update);
            }
            shard
        });
        self.producer = Some(producer);
        self.worker = Some(worker);
    }

    /// Enqueues an update, spinning while the ring is full.
    #[inline]
    pub fn push(&mut self, update: Update) {
        let producer = match self.producer.as_mut() {
            Some(producer) => producer,
            None => panic!("push on an accumulator that is not running"),
        };
        let mut update = update;
        while let Err(rejected) = producer.push(update) {
            update = rejected;
            std::hint::spin_loop();
        }
    }

    /// Signals termination, joins the consumer and returns the shard with
    /// every pushed update applied.
    pub fn stop(&mut self) -> Shard {
        // Dropping the producer first guarantees no push can race the flag.
        self.producer = None;
        self.done.store(true, Ordering::Release);
        match self.worker.take() {
            Some(worker) => match worker.join() {
                Ok(shard) => shard,
                Err(panic) => std::panic::resume_unwind(panic),
            },
            None => self.shard.take().unwrap_or_default(),
        }
    }

    /// Whether the consumer thread is running.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for Accumulator {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shard = Some(self.stop());
        }
    }
}
