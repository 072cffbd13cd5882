//! Shared types for the trip planner workspace.

pub mod key_space;
pub mod types;

pub use key_space::{KeySpace, KeySpaceError};
pub use types::{DayId, OwnerId, ScheduleId, TripId};
