//! Bounds and spacing for sparse ordering keys.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

static INSTALLED: OnceLock<KeySpace> = OnceLock::new();

/// Errors raised when building or installing a key space.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySpaceError {
    /// The gap must be strictly positive.
    #[error("Invalid gap: {gap} (must be greater than 0)")]
    InvalidGap { gap: i64 },

    /// The bounds must straddle zero and leave room for at least two gaps.
    #[error("Invalid bounds: [{min}, {max}] with gap {gap}")]
    InvalidBounds { min: i64, max: i64, gap: i64 },

    /// A key space was already installed for this process.
    #[error("Key space already installed")]
    AlreadyInstalled,
}

/// Spacing and inclusive bounds for ordering keys.
///
/// One value is shared by the whole process. It is installed once at
/// startup with [`KeySpace::install`] and read with [`KeySpace::current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawKeySpace")]
pub struct KeySpace {
    gap: i64,
    min: i64,
    max: i64,
}

/// Unvalidated wire form; deserialization goes through [`KeySpace::new`].
#[derive(Deserialize)]
struct RawKeySpace {
    gap: i64,
    min: i64,
    max: i64,
}

impl TryFrom<RawKeySpace> for KeySpace {
    type Error = KeySpaceError;

    fn try_from(raw: RawKeySpace) -> Result<Self, Self::Error> {
        KeySpace::new(raw.gap, raw.min, raw.max)
    }
}

impl KeySpace {
    /// Default spacing between neighbouring keys.
    pub const DEFAULT_GAP: i64 = 1_000_000;

    /// Default lower bound (-2^53).
    pub const DEFAULT_MIN: i64 = -(1 << 53);

    /// Default upper bound (2^53).
    pub const DEFAULT_MAX: i64 = 1 << 53;

    /// The key space used when nothing was installed.
    pub const DEFAULT: KeySpace = KeySpace {
        gap: Self::DEFAULT_GAP,
        min: Self::DEFAULT_MIN,
        max: Self::DEFAULT_MAX,
    };

    /// Creates a validated key space.
    pub fn new(gap: i64, min: i64, max: i64) -> Result<Self, KeySpaceError> {
        if gap <= 0 {
            return Err(KeySpaceError::InvalidGap { gap });
        }

        let room = max.checked_sub(min);
        if min >= 0 || max <= 0 || room.is_none_or(|room| room / 2 < gap) {
            return Err(KeySpaceError::InvalidBounds { min, max, gap });
        }

        Ok(Self { gap, min, max })
    }

    /// Installs the process-wide key space.
    ///
    /// Must be called before the first key is derived; afterwards the value
    /// is read-only.
    pub fn install(space: KeySpace) -> Result<(), KeySpaceError> {
        INSTALLED
            .set(space)
            .map_err(|_| KeySpaceError::AlreadyInstalled)
    }

    /// Returns the installed key space, or [`KeySpace::DEFAULT`].
    pub fn current() -> KeySpace {
        *INSTALLED.get_or_init(|| Self::DEFAULT)
    }

    pub fn gap(&self) -> i64 {
        self.gap
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    /// Returns true if `value` lies within the inclusive bounds.
    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Returns the key of the `index`-th slot in a freshly spaced list
    /// starting at `start`, or None if it falls outside the bounds.
    pub fn slot(&self, start: i64, index: u64) -> Option<i64> {
        let offset = i64::try_from(index).ok()?.checked_mul(self.gap)?;
        start
            .checked_add(offset)
            .filter(|value| self.contains(*value))
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::DEFAULT
    }
}
