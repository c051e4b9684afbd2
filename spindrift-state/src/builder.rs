//! Fan-out façade over the per-shard accumulators.
//!
//! A [`StateBuilder`] borrows a [`ShardedState`] exclusively, hands each
//! shard map to its own [`Accumulator`] and exposes a single
//! [`add`](StateBuilder::add) sink that routes every update to the
//! accumulator owning its key. `stop` joins all consumers and puts the
//! maps back, which is the happens-before edge making every prior `add`
//! visible to the caller.

use crate::accumulator::{Accumulator, Update};
use crate::sharded_state::{Shard, ShardedState};
use crate::spin_key::SpinKey;
use num_complex::Complex64;

pub struct StateBuilder<'a> {
    state: &'a mut ShardedState,
    accumulators: Vec<Accumulator>,
    shift: u32,
    finished: bool,
}

impl<'a> StateBuilder<'a> {
    /// Takes the shards out of `state` and wraps each in an accumulator.
    pub fn new(state: &'a mut ShardedState) -> Self {
        let shift = state.shard_shift();
        let accumulators: Vec<Accumulator> = state
            .take_shards()
            .into_iter()
            .map(Accumulator::new)
            .collect();
        Self {
            state,
            accumulators,
            shift,
            finished: false,
        }
    }

    /// Starts every per-shard consumer.
    pub fn start(&mut self) {
        for accumulator in &mut self.accumulators {
            accumulator.start();
        }
    }

    /// Routes `delta` for `key` to the accumulator owning its shard.
    ///
    /// Routing reads only the top bits of the key's first byte, so it can
    /// never name a shard outside the table.
    #[inline]
    pub fn add(&mut self, delta: Complex64, key: SpinKey) {
        let index = (key.leading_byte() as usize) >> self.shift;
        debug_assert!(index < self.accumulators.len());
        self.accumulators[index].push(Update { key, delta });
    }

    /// Stops every accumulator and restores the shard maps.
    ///
    /// The caller must have ceased calling [`add`](Self::add); in this
    /// pipeline the producer is the single thread that owns the builder,
    /// so that holds by construction.
    pub fn stop(&mut self) {
        if self.finished {
            return;
        }
        let shards: Vec<Shard> = self
            .accumulators
            .iter_mut()
            .map(Accumulator::stop)
            .collect();
        self.state.restore_shards(shards);
        self.finished = true;
    }
}

impl Drop for StateBuilder<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}
