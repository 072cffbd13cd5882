//! Planner configuration loaded from environment variables.

use common::{KeySpace, KeySpaceError};

/// Planner configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `ORDER_KEY_GAP`: spacing between appended keys (default: `1000000`)
/// - `ORDER_KEY_MIN` / `ORDER_KEY_MAX`: inclusive key bounds (default: `±2^53`)
/// - `MAX_SCHEDULES_PER_TRIP`: schedules allowed in one trip (default: `200`)
/// - `MAX_SCHEDULES_PER_DAY`: schedules allowed on one day (default: `50`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    pub key_space: KeySpace,
    pub max_schedules_per_trip: u64,
    pub max_schedules_per_day: u64,
}

impl PlannerConfig {
    pub const DEFAULT_MAX_SCHEDULES_PER_TRIP: u64 = 200;
    pub const DEFAULT_MAX_SCHEDULES_PER_DAY: u64 = 50;

    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    ///
    /// Values that fail to parse fall back to their defaults; an invalid
    /// combination of key bounds falls back to [`KeySpace::DEFAULT`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let int = |name: &str, default: i64| {
            lookup(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let count = |name: &str, default: u64| {
            lookup(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let gap = int("ORDER_KEY_GAP", KeySpace::DEFAULT_GAP);
        let min = int("ORDER_KEY_MIN", KeySpace::DEFAULT_MIN);
        let max = int("ORDER_KEY_MAX", KeySpace::DEFAULT_MAX);
        let key_space = KeySpace::new(gap, min, max).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring configured key space");
            KeySpace::DEFAULT
        });

        Self {
            key_space,
            max_schedules_per_trip: count(
                "MAX_SCHEDULES_PER_TRIP",
                Self::DEFAULT_MAX_SCHEDULES_PER_TRIP,
            ),
            max_schedules_per_day: count(
                "MAX_SCHEDULES_PER_DAY",
                Self::DEFAULT_MAX_SCHEDULES_PER_DAY,
            ),
        }
    }

    /// Installs this configuration's key space for the whole process.
    ///
    /// Call once at startup, before any store or aggregate derives a key.
    pub fn install_key_space(&self) -> Result<(), KeySpaceError> {
        KeySpace::install(self.key_space)
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            key_space: KeySpace::DEFAULT,
            max_schedules_per_trip: Self::DEFAULT_MAX_SCHEDULES_PER_TRIP,
            max_schedules_per_day: Self::DEFAULT_MAX_SCHEDULES_PER_DAY,
        }
    }
}
