//! Persistence for trips, days and schedules.
//!
//! Besides plain row storage, every store implements the two bulk
//! relocation operations the planner falls back on when ordering keys run
//! out of room: [`ScheduleStore::relocate`] and
//! [`ScheduleStore::migrate_to_temporary_storage`].

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use common::{DayId, KeySpace, OwnerId, ScheduleId, TripId};
pub use error::{ListRef, Result, StoreError};
pub use memory::InMemoryPlannerStore;
pub use postgres::PostgresPlannerStore;
pub use record::{DayRecord, ScheduleRecord, TripRecord};
pub use store::{DayStore, PlannerStore, ScheduleStore, TripStore};
