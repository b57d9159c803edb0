//! Wraparound-safe sequence arithmetic
//!
//! Command ids and snapshot ticks are bounded counters that wrap at a
//! configurable modulus. Ordering between two ids is only meaningful as a
//! signed circular distance; raw integer comparison breaks at the wrap
//! boundary. Every "newer / stale / in range" decision goes through
//! [`SequenceSpace::diff`].
//!
//! # Example
//!
//! ```
//! use tickwire_core::{SequenceId, SequenceSpace};
//!
//! let space = SequenceSpace::new(65536).unwrap();
//! assert_eq!(space.diff(SequenceId(0), SequenceId(65535)), 1);
//! assert_eq!(space.diff(SequenceId(65535), SequenceId(0)), -1);
//! assert!(space.is_newer(SequenceId(2), SequenceId(65534)));
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest supported modulus; ids travel as `u16` on the wire
pub const MAX_MODULUS: u32 = 1 << 16;

/// A bounded sequence counter (command id or entity tick)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(pub u16);

impl SequenceId {
    /// The zero id, used as "nothing processed yet"
    pub const ZERO: SequenceId = SequenceId(0);

    /// Get the raw counter value
    pub fn raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u16> for SequenceId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// Signed circular distance from `b` to `a` in a space of `modulus` values.
///
/// Positive means `a` is ahead of `b`. Inputs are reduced modulo `modulus`
/// first. For an even modulus the single antipodal distance `modulus / 2`
/// is resolved by raw order (`a > b` is ahead), which keeps
/// `circular_diff(a, b) == -circular_diff(b, a)` for every pair.
pub fn circular_diff(a: u32, b: u32, modulus: u32) -> i32 {
    let m = i64::from(modulus.max(1));
    let a = i64::from(a) % m;
    let b = i64::from(b) % m;
    let forward = (a - b).rem_euclid(m);

    let diff = if forward * 2 < m {
        forward
    } else if forward * 2 > m {
        forward - m
    } else if a > b {
        forward
    } else {
        -forward
    };
    diff as i32
}

/// A sequence space of a fixed modulus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSpace {
    modulus: u32,
}

impl SequenceSpace {
    /// The full `u16` space
    pub const FULL: SequenceSpace = SequenceSpace {
        modulus: MAX_MODULUS,
    };

    /// Create a sequence space
    ///
    /// Fails unless `modulus` is in `2..=65536`.
    pub fn new(modulus: u32) -> Result<Self> {
        if !(2..=MAX_MODULUS).contains(&modulus) {
            return Err(Error::InvalidModulus(modulus));
        }
        Ok(Self { modulus })
    }

    /// Get the modulus
    pub fn modulus(&self) -> u32 {
        self.modulus
    }

    /// Check whether an id lies inside this space
    pub fn contains(&self, id: SequenceId) -> bool {
        u32::from(id.0) < self.modulus
    }

    /// Validate that an id lies inside this space
    pub fn check(&self, id: SequenceId) -> Result<SequenceId> {
        if self.contains(id) {
            Ok(id)
        } else {
            Err(Error::SequenceOutOfRange {
                value: id.0,
                modulus: self.modulus,
            })
        }
    }

    /// Signed circular distance from `b` to `a`
    pub fn diff(&self, a: SequenceId, b: SequenceId) -> i32 {
        circular_diff(u32::from(a.0), u32::from(b.0), self.modulus)
    }

    /// Whether `a` is strictly ahead of `b`
    pub fn is_newer(&self, a: SequenceId, b: SequenceId) -> bool {
        self.diff(a, b) > 0
    }

    /// The id following `id`
    pub fn next(&self, id: SequenceId) -> SequenceId {
        self.add(id, 1)
    }

    /// Advance `id` by `n` steps
    pub fn add(&self, id: SequenceId, n: u32) -> SequenceId {
        let value = (u64::from(id.0) + u64::from(n)) % u64::from(self.modulus);
        SequenceId(value as u16)
    }
}

impl Default for SequenceSpace {
    fn default() -> Self {
        Self::FULL
    }
}
