//! Sharded sparse amplitude table.
//!
//! A [`ShardedState`] is a set of `N` independent hash maps from
//! [`SpinKey`]s to complex amplitudes, `N` a power of two. A key belongs to
//! exactly one shard, selected by the top `log2(N)` bits of its first
//! payload byte; routing is a pure function of the key, so truncation and
//! the build pipeline never have to consult a hash to find the owning map.
//!
//! Outside a build the table is mutated from a single thread. During a
//! build every shard is exclusively owned by one consumer (see
//! [`crate::builder::StateBuilder`]).

use crate::error::{Result, StateError};
use crate::spin_key::SpinKey;
use crate::truncation;
use ahash::AHashMap;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::fmt;

/// One shard: an open-addressed map from configurations to amplitudes.
pub type Shard = AHashMap<SpinKey, Complex64>;

/// Largest supported shard count (routing reads one byte).
pub const MAX_SHARDS: usize = 256;

const NORM_EPSILON: f64 = 1e-14;

/// How [`ShardedState::shrink`] reduces the table to the soft cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationPolicy {
    /// Drop the entries with the smallest |amplitude|².
    Deterministic,
    /// Resample the population weighted by |amplitude|² (alias method).
    Stochastic,
}

/// Sizing and truncation parameters carried by a state.
#[derive(Debug, Clone)]
pub struct StateConfig {
    /// Target entry count after each shrink.
    pub soft_cap: usize,
    /// Emergency threshold that forces an immediate shrink.
    pub hard_cap: usize,
    /// Number of shards; a power of two, at most [`MAX_SHARDS`].
    pub num_shards: usize,
    /// Truncation policy.
    pub policy: TruncationPolicy,
    /// Seed for the resampling generator; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl StateConfig {
    /// Configuration with the given soft cap and defaults elsewhere
    /// (hard cap twice the soft cap, one shard, deterministic truncation).
    pub fn new(soft_cap: usize) -> Self {
        Self {
            soft_cap,
            hard_cap: 2 * soft_cap,
            num_shards: 1,
            policy: TruncationPolicy::Deterministic,
            seed: None,
        }
    }

    /// Set the hard cap.
    pub fn with_hard_cap(mut self, hard_cap: usize) -> Self {
        self.hard_cap = hard_cap;
        self
    }

    /// Set the shard count.
    pub fn with_shards(mut self, num_shards: usize) -> Self {
        self.num_shards = num_shards;
        self
    }

    /// Set the truncation policy.
    pub fn with_policy(mut self, policy: TruncationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Seed the resampling generator for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check the parameter invariants.
    pub fn validate(&self) -> Result<()> {
        if self.soft_cap < 2 {
            return Err(StateError::SoftCapTooSmall(self.soft_cap));
        }
        if !self.num_shards.is_power_of_two() || self.num_shards > MAX_SHARDS {
            return Err(StateError::InvalidShardCount(self.num_shards));
        }
        if self.hard_cap < self.soft_cap {
            return Err(StateError::HardCapBelowSoft {
                hard: self.hard_cap,
                soft: self.soft_cap,
            });
        }
        Ok(())
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Sparse quantum state sharded over independent hash maps.
pub struct ShardedState {
    shards: Vec<Shard>,
    /// Right-shift applied to the leading byte for routing: `8 - log2(N)`.
    shift: u32,
    config: StateConfig,
    rng: StdRng,
}

impl ShardedState {
    /// Creates an empty state with the given configuration.
    ///
    /// Each shard reserves the hard cap up front so accumulation does not
    /// rehash on the hot path.
    pub fn new(config: StateConfig) -> Result<Self> {
        config.validate()?;
        let shift = 8 - config.num_shards.trailing_zeros();
        let shards = (0..config.num_shards)
            .map(|_| Shard::with_capacity(config.hard_cap))
            .collect();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            shards,
            shift,
            config,
            rng,
        })
    }

    /// The configuration this state was created with.
    #[inline]
    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    /// Number of shards.
    #[inline]
    pub fn num_shards(&self) -> usize {
        self.config.num_shards
    }

    /// Index of the shard owning `key`.
    #[inline]
    pub fn shard_index(&self, key: &SpinKey) -> usize {
        (key.leading_byte() as usize) >> self.shift
    }

    pub(crate) fn shard_shift(&self) -> u32 {
        self.shift
    }

    /// Total number of stored entries.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    /// Whether the state holds no entries.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.is_empty())
    }

    /// Amplitude of `key`, if present.
    pub fn get(&self, key: &SpinKey) -> Option<Complex64> {
        self.shards[self.shard_index(key)].get(key).copied()
    }

    /// All entries, shard by shard. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (&SpinKey, &Complex64)> {
        self.shards.iter().flat_map(|shard| shard.iter())
    }

    /// Merge-adds `coeff` into the amplitude of `key` without a cap check.
    pub(crate) fn insert_add(&mut self, coeff: Complex64, key: SpinKey) {
        let index = self.shard_index(&key);
        *self.shards[index]
            .entry(key)
            .or_insert(Complex64::new(0.0, 0.0)) += coeff;
    }

    /// Merge-adds `coeff` into the amplitude of `key`.
    ///
    /// If the insert pushes the total size past the hard cap, the configured
    /// truncator runs immediately and a warning is logged.
    pub fn accumulate(&mut self, coeff: Complex64, key: SpinKey) -> Result<()> {
        self.insert_add(coeff, key);
        let size = self.len();
        if size > self.config.hard_cap {
            tracing::warn!(
                size,
                hard_cap = self.config.hard_cap,
                "hard cap exceeded, shrinking early; performance will suffer"
            );
            self.shrink()?;
        }
        Ok(())
    }

    /// Inserts a fresh entry; a key that is already present is an error.
    pub fn try_insert(&mut self, key: SpinKey, coeff: Complex64) -> Result<()> {
        let index = self.shard_index(&key);
        match self.shards[index].entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => {
                Err(StateError::DuplicateKey(key))
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(coeff);
                Ok(())
            }
        }
    }

    /// Sum of |amplitude|² over all shards.
    pub fn norm_sqr(&self) -> f64 {
        self.shards
            .par_iter()
            .map(|shard| shard.values().map(|a| a.norm_sqr()).sum::<f64>())
            .sum()
    }

    /// ℓ² norm of the state.
    pub fn norm(&self) -> f64 {
        self.norm_sqr().sqrt()
    }

    /// Rescales every amplitude so the state has unit ℓ² norm.
    pub fn normalize(&mut self) -> Result<()> {
        let norm = self.norm();
        if norm < NORM_EPSILON {
            return Err(StateError::ZeroNorm);
        }
        self.shards.par_iter_mut().for_each(|shard| {
            for amplitude in shard.values_mut() {
                *amplitude /= norm;
            }
        });
        Ok(())
    }

    /// Reduces the table to at most the soft cap using the configured policy.
    pub fn shrink(&mut self) -> Result<()> {
        let excess = self.len().saturating_sub(self.config.soft_cap);
        if excess == 0 {
            return Ok(());
        }
        match self.config.policy {
            TruncationPolicy::Deterministic => {
                truncation::remove_least(self, excess);
                Ok(())
            }
            TruncationPolicy::Stochastic => truncation::resample(self),
        }
    }

    pub(crate) fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub(crate) fn shard_mut(&mut self, index: usize) -> &mut Shard {
        &mut self.shards[index]
    }

    pub(crate) fn clear_shards(&mut self) {
        for shard in &mut self.shards {
            shard.clear();
        }
    }

    pub(crate) fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Hands the shard maps to a builder. The state is unusable until
    /// [`restore_shards`](Self::restore_shards) puts them back.
    pub(crate) fn take_shards(&mut self) -> Vec<Shard> {
        std::mem::take(&mut self.shards)
    }

    pub(crate) fn restore_shards(&mut self, shards: Vec<Shard>) {
        debug_assert!(self.shards.is_empty());
        debug_assert_eq!(shards.len(), self.config.num_shards);
        self.shards = shards;
    }
}

impl fmt::Debug for ShardedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedState")
            .field("len", &self.len())
            .field("num_shards", &self.config.num_shards)
            .field("soft_cap", &self.config.soft_cap)
            .field("hard_cap", &self.config.hard_cap)
            .field("policy", &self.config.policy)
            .finish()
    }
}
