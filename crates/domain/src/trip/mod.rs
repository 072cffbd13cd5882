//! Trip aggregate and related types.

mod aggregate;
mod color;
mod day;
mod mapping;
mod period;
mod schedule;
mod service;

pub use aggregate::{MoveOutcome, PeriodChange, Trip};
pub use color::{DayColor, UnknownColor};
pub use day::Day;
pub use period::{TripPeriod, TripStatus};
pub use schedule::{Coordinate, Place, Schedule, ScheduleDetails, TimeWindow};
pub use service::{PeriodChanged, TripService};

use chrono::{NaiveDate, NaiveTime};
use common::{DayId, ScheduleId};
use thiserror::Error;

use crate::order_key::OrderKeyError;

/// Errors that can occur during trip operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TripError {
    /// A new ordering key could not be derived; relocating the list fixes it.
    #[error(transparent)]
    Ordering(#[from] OrderKeyError),

    /// The target day does not belong to this trip.
    #[error("Day {day_id} does not belong to this trip")]
    InvalidContainer { day_id: DayId },

    /// The requested position is outside `[0, len]`.
    #[error("Invalid target order: {order} (list holds {len} other schedules)")]
    InvalidTargetOrder { order: usize, len: usize },

    /// A decided trip cannot go back to an undecided period.
    #[error("Cannot clear the period of a decided trip")]
    EmptyPeriodOnDecidedTrip,

    /// Start date after end date.
    #[error("Invalid period: {start} to {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },

    /// Start time after end time.
    #[error("Invalid time window: {start} to {end}")]
    InvalidTimeWindow { start: NaiveTime, end: NaiveTime },

    /// The schedule is not part of this trip.
    #[error("Schedule not found in trip: {0}")]
    ScheduleNotFound(ScheduleId),
}

impl TripError {
    /// Returns true for ordering failures that a relocation can resolve.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TripError::Ordering(_))
    }
}

