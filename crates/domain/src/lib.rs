//! Domain layer for the trip planner.
//!
//! This crate provides:
//! - Sparse ordering keys and the process-wide key space they live in
//! - The Trip aggregate owning days, schedules and temporary storage
//! - TripService, which persists aggregate changes and relocates lists
//!   when ordering keys run out

pub mod config;
pub mod error;
pub mod order_key;
pub mod trip;

pub use common::{DayId, KeySpace, KeySpaceError, OwnerId, ScheduleId, TripId};
pub use config::PlannerConfig;
pub use error::{CapacityScope, DomainError};
pub use order_key::{OrderKey, OrderKeyError};
pub use trip::{
    Coordinate, Day, DayColor, MoveOutcome, PeriodChange, PeriodChanged, Place, Schedule,
    ScheduleDetails, TimeWindow, Trip, TripError, TripPeriod, TripService, TripStatus,
    UnknownColor,
};
