//! Soft-cap truncation policies.
//!
//! Both policies run on the driver thread, strictly outside a build: a
//! shrink during accumulation would break shard exclusivity.

use crate::error::{Result, StateError};
use crate::sharded_state::ShardedState;
use crate::spin_key::SpinKey;
use num_complex::Complex64;
use rand::Rng;
use rayon::prelude::*;

/// Alias slot that is never consulted (its probability is 1).
const NO_ALIAS: usize = usize::MAX;

/// Erases the `count` entries with the smallest |amplitude|².
///
/// Ties between equal magnitudes are broken arbitrarily.
pub(crate) fn remove_least(state: &mut ShardedState, count: usize) {
    if count == 0 {
        return;
    }
    let mut weights: Vec<(usize, SpinKey, f64)> = state
        .shards()
        .par_iter()
        .enumerate()
        .flat_map_iter(|(index, shard)| {
            shard
                .iter()
                .map(move |(key, amplitude)| (index, *key, amplitude.norm_sqr()))
        })
        .collect();
    debug_assert!(count <= weights.len());
    weights.select_nth_unstable_by(count - 1, |a, b| a.2.total_cmp(&b.2));
    for (index, key, _) in weights.iter().take(count) {
        state.shard_mut(*index).remove(key);
    }
}

/// Replaces the state with `soft_cap` draws from the |amplitude|²-weighted
/// population. Sampled keys keep their original amplitudes; a key drawn
/// more than once accumulates.
pub(crate) fn resample(state: &mut ShardedState) -> Result<()> {
    let target = state.config().soft_cap;
    let entries: Vec<(SpinKey, Complex64)> = state.iter().map(|(k, a)| (*k, *a)).collect();
    let weights: Vec<f64> = entries.iter().map(|(_, a)| a.norm_sqr()).collect();
    let table = AliasTable::new(&weights)?;

    let draws: Vec<usize> = {
        let rng = state.rng_mut();
        (0..target).map(|_| table.sample(rng)).collect()
    };
    state.clear_shards();
    for draw in draws {
        let (key, amplitude) = entries[draw];
        state.insert_add(amplitude, key);
    }
    Ok(())
}

/// Walker's alias table for O(1) draws from a discrete distribution.
#[derive(Debug)]
pub(crate) struct AliasTable {
    prob: Vec<f64>,
    alias: Vec<usize>,
}

impl AliasTable {
    /// Builds the table from non-negative weights.
    ///
    /// Weights need not be normalised; they are rescaled to mean 1. An empty
    /// or all-zero distribution cannot be sampled.
    pub(crate) fn new(weights: &[f64]) -> Result<Self> {
        let n = weights.len();
        let total: f64 = weights.iter().sum();
        if n == 0 || total == 0.0 {
            return Err(StateError::ZeroWeights);
        }

        let scale = n as f64 / total;
        let mut scaled: Vec<f64> = weights.iter().map(|&w| w * scale).collect();
        let mut prob = vec![0.0; n];
        let mut alias = vec![NO_ALIAS; n];

        let mut small = Vec::new();
        let mut large = Vec::new();
        for (i, &w) in scaled.iter().enumerate() {
            if w < 1.0 {
                small.push(i);
            } else {
                large.push(i);
            }
        }

        while let (Some(&lo), Some(&hi)) = (small.last(), large.last()) {
            small.pop();
            prob[lo] = scaled[lo];
            alias[lo] = hi;
            scaled[hi] = (scaled[hi] + scaled[lo]) - 1.0;
            if scaled[hi] < 1.0 {
                large.pop();
                small.push(hi);
            }
        }
        // Leftovers in either list are due to floating-point error; their
        // weight is 1 to working precision.
        for &i in large.iter().chain(small.iter()) {
            prob[i] = 1.0;
            alias[i] = NO_ALIAS;
        }

        Ok(Self { prob, alias })
    }

    /// Draws one index.
    pub(crate) fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        let i = rng.gen_range(0..self.prob.len());
        if rng.gen::<f64>() < self.prob[i] {
            i
        } else {
            self.alias[i]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharded_state::{StateConfig, TruncationPolicy};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_alias_table_uniform_weights() {
        let table = AliasTable::new(&[1.0, 1.0, 1.0, 1.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0u64; 4];
        let draws = 1_000_000;
        for _ in 0..draws {
            counts[table.sample(&mut rng)] += 1;
        }
        for count in counts {
            let frequency = count as f64 / draws as f64;
            assert!(
                (frequency - 0.25).abs() < 0.01,
                "frequency {} too far from 0.25",
                frequency
            );
        }
    }

    #[test]
    fn test_alias_table_degenerate_weights() {
        let table = AliasTable::new(&[1.0, 0.0, 0.0, 0.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            assert_eq!(table.sample(&mut rng), 0);
        }
    }

    #[test]
    fn test_alias_table_skewed_weights() {
        let weights = [0.5, 0.3, 0.15, 0.05];
        let table = AliasTable::new(&weights).unwrap();
        let mut rng = StdRng::seed_from_u64(123);
        let mut counts = [0u64; 4];
        let draws = 1_000_000;
        for _ in 0..draws {
            counts[table.sample(&mut rng)] += 1;
        }
        for (i, (&weight, &count)) in weights.iter().zip(counts.iter()).enumerate() {
            let frequency = count as f64 / draws as f64;
            assert!(
                (frequency - weight).abs() < 0.01,
                "outcome {} frequency {} too far from {}",
                i,
                frequency,
                weight
            );
        }
    }

    #[test]
    fn test_alias_table_rejects_zero_distribution() {
        assert_eq!(AliasTable::new(&[]).unwrap_err(), StateError::ZeroWeights);
        assert_eq!(
            AliasTable::new(&[0.0, 0.0]).unwrap_err(),
            StateError::ZeroWeights
        );
    }

    #[test]
    fn test_resample_bounds_size_and_merges_duplicates() {
        // One dominant key: every draw lands on it, and the duplicates merge
        // into a single entry with the original amplitude accumulated.
        let config = StateConfig::new(4)
            .with_hard_cap(100)
            .with_policy(TruncationPolicy::Stochastic)
            .with_seed(9);
        let mut state = ShardedState::new(config).unwrap();
        let dominant = SpinKey::from_bits(&[1, 1, 1]);
        state.try_insert(dominant, Complex64::new(1.0, 0.0)).unwrap();
        for i in 0..5u8 {
            let k = SpinKey::from_bits(&[(i >> 2) & 1, (i >> 1) & 1, i & 1, 1]);
            state.try_insert(k, Complex64::new(0.0, 0.0)).unwrap();
        }
        state.shrink().unwrap();
        assert_eq!(state.len(), 1);
        let merged = state.get(&dominant).unwrap();
        assert!((merged.re - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_resample_all_zero_weights_fails() {
        let config = StateConfig::new(2)
            .with_hard_cap(100)
            .with_policy(TruncationPolicy::Stochastic)
            .with_seed(1);
        let mut state = ShardedState::new(config).unwrap();
        for i in 0..3u8 {
            let k = SpinKey::from_bits(&[(i >> 1) & 1, i & 1]);
            state.try_insert(k, Complex64::new(0.0, 0.0)).unwrap();
        }
        assert_eq!(state.shrink(), Err(StateError::ZeroWeights));
    }
}
