use chrono::NaiveDate;
use thiserror::Error;

use crate::{DayId, TripId};

/// Errors that can occur when interacting with the planner store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A bulk renumbering would push keys past the configured bounds.
    #[error("Key space exhausted for trip {trip_id} while relocating {list}")]
    RangeExceeded { trip_id: TripId, list: ListRef },

    /// A row references a trip that does not exist.
    #[error("Trip not found: {0}")]
    TripNotFound(TripId),

    /// Two days of the same trip share a date.
    #[error("Trip {trip_id} already has a day on {date}")]
    DuplicateDay { trip_id: TripId, date: NaiveDate },

    /// A row references a day that does not exist.
    #[error("Day not found: {0}")]
    DayNotFound(DayId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// The schedule list a bulk operation was working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListRef {
    Temporary,
    Day(DayId),
}

impl ListRef {
    pub fn from_day(day_id: Option<DayId>) -> Self {
        day_id.map_or(ListRef::Temporary, ListRef::Day)
    }

    /// Metric label for this list kind.
    pub fn label(&self) -> &'static str {
        match self {
            ListRef::Temporary => "temporary",
            ListRef::Day(_) => "day",
        }
    }
}

impl std::fmt::Display for ListRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListRef::Temporary => write!(f, "temporary storage"),
            ListRef::Day(id) => write!(f, "day {id}"),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
