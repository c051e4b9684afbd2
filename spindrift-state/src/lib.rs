//! Sharded sparse amplitude tables for spin-½ states.
//!
//! This crate is the storage engine behind the diffusion-operator power
//! iteration: a concurrent map from bit-packed spin configurations
//! ([`SpinKey`]) to complex amplitudes, split over independent shards
//! ([`ShardedState`]), fed through per-shard single-producer/single-consumer
//! rings ([`StateBuilder`] / [`Accumulator`]) and kept bounded by soft- and
//! hard-cap truncation.
//!
//! # Concurrency model
//!
//! During a build there are `N + 1` threads: the single producer driving
//! [`StateBuilder::add`] plus one consumer per shard. Each consumer owns its
//! shard map outright for the duration of the build; the only shared
//! structure is the bounded SPSC ring in between. There is no mutex anywhere
//! in this crate.
//!
//! # Example
//!
//! ```
//! use num_complex::Complex64;
//! use spindrift_state::{ShardedState, SpinKey, StateBuilder, StateConfig};
//!
//! let mut state = ShardedState::new(StateConfig::new(100).with_shards(4)).unwrap();
//! {
//!     let mut builder = StateBuilder::new(&mut state);
//!     builder.start();
//!     builder.add(Complex64::new(1.0, 0.0), SpinKey::from_bits(&[0, 1]));
//!     builder.add(Complex64::new(1.0, 0.0), SpinKey::from_bits(&[1, 0]));
//!     builder.stop();
//! }
//! state.normalize().unwrap();
//! assert!((state.norm() - 1.0).abs() < 1e-12);
//! ```

pub mod accumulator;
pub mod builder;
pub mod error;
pub mod sharded_state;
pub mod spin_key;
pub mod spsc;
mod truncation;

pub use accumulator::{Accumulator, Update};
pub use builder::StateBuilder;
pub use error::{Result, StateError};
pub use sharded_state::{Shard, ShardedState, StateConfig, TruncationPolicy, MAX_SHARDS};
pub use spin_key::{Spin, SpinKey, MAX_SPINS};
