//! Bit-packed spin-½ basis configurations.
//!
//! A [`SpinKey`] is a fixed-width 128-bit value: 14 payload bytes holding up
//! to 112 spins followed by a 16-bit length. Bits are packed big-endian
//! within each byte, so spin `i` lives at bit `7 - (i % 8)` of byte `i / 8`.
//! Padding bits beyond the length are always zero, which makes equality a
//! plain byte-wise comparison of the full 16-byte representation and lets
//! hashing work on the two 64-bit halves.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Maximum number of spins a key can hold.
pub const MAX_SPINS: usize = 112;

const PAYLOAD_BYTES: usize = 14;
const KEY_BYTES: usize = 16;

/// Orientation of a single spin-½ site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Spin {
    Down,
    Up,
}

impl Spin {
    /// Parse a spin from its textual digit.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Spin::Down),
            '1' => Some(Spin::Up),
            _ => None,
        }
    }

    /// Textual digit for this spin.
    pub fn to_char(self) -> char {
        match self {
            Spin::Down => '0',
            Spin::Up => '1',
        }
    }

    /// The packed bit value.
    pub fn as_bit(self) -> u8 {
        match self {
            Spin::Down => 0,
            Spin::Up => 1,
        }
    }
}

/// A packed sequence of up to [`MAX_SPINS`] spins.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SpinKey {
    bytes: [u8; KEY_BYTES],
}

impl SpinKey {
    /// Builds a key from a slice of bit values (0 = down, 1 = up).
    ///
    /// Values other than 0 or 1 are programming errors; callers parsing
    /// untrusted text must validate first.
    pub fn from_bits(bits: &[u8]) -> Self {
        assert!(
            bits.len() <= MAX_SPINS,
            "a spin configuration holds at most {} spins, got {}",
            MAX_SPINS,
            bits.len()
        );
        let mut bytes = [0u8; KEY_BYTES];
        for (i, &bit) in bits.iter().enumerate() {
            debug_assert!(bit <= 1, "spin bits must be 0 or 1");
            if bit == 1 {
                bytes[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        bytes[PAYLOAD_BYTES..].copy_from_slice(&(bits.len() as u16).to_le_bytes());
        Self { bytes }
    }

    /// Builds a key from spin values.
    pub fn from_spins<I>(spins: I) -> Self
    where
        I: IntoIterator<Item = Spin>,
    {
        let bits: Vec<u8> = spins.into_iter().map(Spin::as_bit).collect();
        Self::from_bits(&bits)
    }

    /// Number of spins in the configuration.
    #[inline]
    pub fn len(&self) -> usize {
        u16::from_le_bytes([self.bytes[PAYLOAD_BYTES], self.bytes[PAYLOAD_BYTES + 1]]) as usize
    }

    /// Whether the configuration is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spin at site `i`. Requires `i < len`.
    #[inline]
    pub fn get(&self, i: usize) -> Spin {
        debug_assert!(i < self.len(), "spin index {} out of range", i);
        if (self.bytes[i / 8] >> (7 - (i % 8))) & 1 == 1 {
            Spin::Up
        } else {
            Spin::Down
        }
    }

    /// Overwrites the spin at site `i`. Requires `i < len`.
    #[inline]
    pub fn set(&mut self, i: usize, spin: Spin) {
        debug_assert!(i < self.len(), "spin index {} out of range", i);
        let mask = 1 << (7 - (i % 8));
        match spin {
            Spin::Up => self.bytes[i / 8] |= mask,
            Spin::Down => self.bytes[i / 8] &= !mask,
        }
    }

    /// Inverts the spin at site `i`. Requires `i < len`.
    #[inline]
    pub fn flip(&mut self, i: usize) {
        debug_assert!(i < self.len(), "spin index {} out of range", i);
        self.bytes[i / 8] ^= 1 << (7 - (i % 8));
    }

    /// A copy of `self` with the given sites inverted.
    #[inline]
    pub fn flipped(&self, sites: &[usize]) -> Self {
        let mut key = *self;
        for &i in sites {
            key.flip(i);
        }
        key
    }

    /// First payload byte; shard routing reads the high bits of this value.
    #[inline]
    pub fn leading_byte(&self) -> u8 {
        self.bytes[0]
    }

    /// Raw 16-byte representation (payload followed by the length).
    #[inline]
    pub fn as_bytes(&self) -> &[u8; KEY_BYTES] {
        &self.bytes
    }

    /// Spins in site order.
    pub fn spins(&self) -> impl Iterator<Item = Spin> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// The configuration as a list of bit values.
    pub fn to_bits(&self) -> Vec<u8> {
        self.spins().map(Spin::as_bit).collect()
    }

    #[inline]
    fn words(&self) -> (u64, u64) {
        let mut lo = [0u8; 8];
        let mut hi = [0u8; 8];
        lo.copy_from_slice(&self.bytes[..8]);
        hi.copy_from_slice(&self.bytes[8..]);
        (u64::from_le_bytes(lo), u64::from_le_bytes(hi))
    }
}

impl Hash for SpinKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let (lo, hi) = self.words();
        state.write_u64(lo);
        state.write_u64(hi);
    }
}

impl fmt::Display for SpinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for spin in self.spins() {
            write!(f, "{}", spin.to_char())?;
        }
        Ok(())
    }
}

impl fmt::Debug for SpinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpinKey(\"{}\")", self)
    }
}
