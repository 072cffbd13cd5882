//! Sparse ordering keys.
//!
//! Keys are spaced [`KeySpace::gap`] apart when appended at either end of a
//! list, and bisected when an item is inserted between two neighbours. No
//! operation renumbers keys in place; when the space between two keys or
//! at the ends of the range runs out, the caller relocates the whole list.

use std::fmt;

use common::KeySpace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures deriving a new key. Both are recoverable by relocating the
/// affected list and retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OrderKeyError {
    /// Stepping one gap away from `from` leaves the key space.
    #[error("Order key range exceeded stepping from {from}")]
    RangeExceeded { from: i64 },

    /// No integer lies strictly between the two keys.
    #[error("No order key between {lower} and {upper}")]
    MidpointConflict { lower: i64, upper: i64 },
}

/// An immutable sparse ordering key.
///
/// Deserialized keys are checked against the process-wide key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct OrderKey(i64);

impl OrderKey {
    /// The key of the first item placed in an empty list.
    pub const ZERO: OrderKey = OrderKey(0);

    /// Creates a key, checking it against the process-wide key space.
    pub fn new(value: i64) -> Result<Self, OrderKeyError> {
        Self::new_in(&KeySpace::current(), value)
    }

    /// Creates a key, checking it against `space`.
    pub fn new_in(space: &KeySpace, value: i64) -> Result<Self, OrderKeyError> {
        if space.contains(value) {
            Ok(Self(value))
        } else {
            Err(OrderKeyError::RangeExceeded { from: value })
        }
    }

    /// Returns the raw key value.
    pub fn value(&self) -> i64 {
        self.0
    }

    /// The key one gap after this one.
    pub fn next(&self) -> Result<Self, OrderKeyError> {
        self.next_in(&KeySpace::current())
    }

    /// The key one gap before this one.
    pub fn before(&self) -> Result<Self, OrderKeyError> {
        self.before_in(&KeySpace::current())
    }

    pub fn next_in(&self, space: &KeySpace) -> Result<Self, OrderKeyError> {
        self.0
            .checked_add(space.gap())
            .filter(|value| *value <= space.max())
            .map(Self)
            .ok_or(OrderKeyError::RangeExceeded { from: self.0 })
    }

    pub fn before_in(&self, space: &KeySpace) -> Result<Self, OrderKeyError> {
        self.0
            .checked_sub(space.gap())
            .filter(|value| *value >= space.min())
            .map(Self)
            .ok_or(OrderKeyError::RangeExceeded { from: self.0 })
    }

    /// The average of the two keys, strictly between them.
    ///
    /// Argument order does not matter. Fails when the keys are less than two
    /// apart.
    pub fn mid(&self, other: &OrderKey) -> Result<Self, OrderKeyError> {
        let (lower, upper) = if self.0 <= other.0 {
            (self.0, other.0)
        } else {
            (other.0, self.0)
        };

        if upper.abs_diff(lower) <= 1 {
            return Err(OrderKeyError::MidpointConflict { lower, upper });
        }

        // The span of two i64 values can exceed i64::MAX; half of it cannot
        let half = (i128::from(upper) - i128::from(lower)) / 2;
        Ok(Self(lower + half as i64))
    }
}

impl TryFrom<i64> for OrderKey {
    type Error = OrderKeyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OrderKey> for i64 {
    fn from(key: OrderKey) -> Self {
        key.0
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(value: i64) -> OrderKey {
        OrderKey::new(value).unwrap()
    }

    #[test]
    fn next_and_before_move_by_exactly_one_gap() {
        let gap = KeySpace::current().gap();
        let k = key(42);

        assert_eq!(k.next().unwrap().value(), 42 + gap);
        assert_eq!(k.before().unwrap().value(), 42 - gap);
        assert!(k.before().unwrap() < k);
        assert!(k < k.next().unwrap());
    }

    #[test]
    fn next_fails_past_max() {
        let space = KeySpace::current();
        let k = key(space.max() - space.gap() + 1);

        assert_eq!(
            k.next(),
            Err(OrderKeyError::RangeExceeded { from: k.value() })
        );
        assert!(key(space.max() - space.gap()).next().is_ok());
    }

    #[test]
    fn before_fails_past_min() {
        let space = KeySpace::current();
        let k = key(space.min() + space.gap() - 1);

        assert_eq!(
            k.before(),
            Err(OrderKeyError::RangeExceeded { from: k.value() })
        );
        assert!(key(space.min() + space.gap()).before().is_ok());
    }

    #[test]
    fn small_key_space_bounds() {
        let space = KeySpace::new(10, -30, 30).unwrap();
        let k = OrderKey::new_in(&space, 25).unwrap();

        assert!(k.next_in(&space).is_err());
        assert_eq!(k.before_in(&space).unwrap().value(), 15);
        assert!(OrderKey::new_in(&space, 31).is_err());
    }

    #[test]
    fn mid_lies_strictly_between() {
        for (a, b) in [(0, 2), (0, 1_000_000), (-7, 8), (-100, -10), (5, 1_000_001)] {
            let m = key(a).mid(&key(b)).unwrap();
            assert!(key(a) < m && m < key(b), "{a} < {m} < {b}");

            let reversed = key(b).mid(&key(a)).unwrap();
            assert_eq!(m, reversed);
        }
    }

    #[test]
    fn mid_of_adjacent_keys_conflicts() {
        assert_eq!(
            key(3).mid(&key(4)),
            Err(OrderKeyError::MidpointConflict { lower: 3, upper: 4 })
        );
        assert_eq!(
            key(4).mid(&key(3)),
            Err(OrderKeyError::MidpointConflict { lower: 3, upper: 4 })
        );
        assert!(key(9).mid(&key(9)).is_err());
    }

    #[test]
    fn repeated_bisection_eventually_conflicts() {
        let lower = OrderKey::ZERO;
        let mut upper = key(KeySpace::current().gap());
        let mut steps = 0;

        loop {
            match lower.mid(&upper) {
                Ok(m) => {
                    assert!(lower < m && m < upper);
                    upper = m;
                    steps += 1;
                }
                Err(e) => {
                    assert!(matches!(e, OrderKeyError::MidpointConflict { .. }));
                    break;
                }
            }
        }

        assert!(steps >= 19, "only {steps} bisections fit in one gap");
    }

    #[test]
    fn new_rejects_out_of_bounds() {
        let space = KeySpace::current();
        assert!(OrderKey::new(space.max() + 1).is_err());
        assert!(OrderKey::new(space.min() - 1).is_err());
    }

    #[test]
    fn mid_of_extreme_keys_does_not_overflow() {
        let lower = OrderKey(i64::MIN);
        let upper = OrderKey(i64::MAX);

        let m = lower.mid(&upper).unwrap();

        assert!(lower < m && m < upper);
        assert_eq!(upper.mid(&lower).unwrap(), m);
    }

    #[test]
    fn deserialization_checks_bounds() {
        let space = KeySpace::current();

        let k: OrderKey = serde_json::from_str("42").unwrap();
        assert_eq!(k.value(), 42);
        assert_eq!(serde_json::to_string(&k).unwrap(), "42");

        assert!(serde_json::from_str::<OrderKey>(&(space.max() + 1).to_string()).is_err());
        assert!(serde_json::from_str::<OrderKey>(&i64::MIN.to_string()).is_err());
    }
}
