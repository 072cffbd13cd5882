use async_trait::async_trait;

use crate::{DayId, DayRecord, KeySpace, Result, ScheduleId, ScheduleRecord, TripId, TripRecord};

/// Storage for trip rows and the day rows they own.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Retrieves a trip row.
    async fn find_by_id(&self, trip_id: TripId) -> Result<Option<TripRecord>>;

    /// Retrieves a trip row together with its days, sorted by date.
    async fn find_by_id_with_days(
        &self,
        trip_id: TripId,
    ) -> Result<Option<(TripRecord, Vec<DayRecord>)>>;

    /// Upserts the trip row and the given day rows atomically.
    async fn save(&self, trip: TripRecord, days: Vec<DayRecord>) -> Result<()>;

    /// Applies a period change as one unit of work: migrates the schedules
    /// of `deleted_day_ids` into temporary storage (as
    /// [`ScheduleStore::migrate_to_temporary_storage`] does), deletes those
    /// days, then upserts the trip row and `days`.
    ///
    /// Nothing is written if any step fails. Returns the number of
    /// schedules migrated.
    async fn reconcile_period(
        &self,
        trip: TripRecord,
        days: Vec<DayRecord>,
        deleted_day_ids: &[DayId],
    ) -> Result<u64>;

    /// Deletes a trip; its days and schedules go with it.
    ///
    /// Returns true if a trip row was removed.
    async fn delete(&self, trip_id: TripId) -> Result<bool>;
}

/// Storage for day rows.
#[async_trait]
pub trait DayStore: Send + Sync {
    /// Retrieves a day row together with its owning trip.
    async fn find_by_id_with_trip(&self, day_id: DayId)
    -> Result<Option<(DayRecord, TripRecord)>>;

    /// Deletes the given days. Schedules still pointing at them fall back to
    /// temporary storage with their keys unchanged, so callers migrate first.
    ///
    /// Returns the number of rows deleted.
    async fn delete_all_by_ids(&self, day_ids: &[DayId]) -> Result<u64>;

    /// Deletes every day of a trip. Returns the number of rows deleted.
    async fn delete_all_by_trip(&self, trip_id: TripId) -> Result<u64>;
}

/// Storage for schedule rows, including the bulk relocation operations.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// The key space bulk operations renumber into.
    fn key_space(&self) -> KeySpace;

    /// Inserts or replaces a schedule row.
    async fn save(&self, schedule: ScheduleRecord) -> Result<()>;

    /// Deletes a schedule. Returns true if a row was removed.
    async fn delete(&self, schedule_id: ScheduleId) -> Result<bool>;

    /// Retrieves a schedule row together with its owning trip.
    async fn find_by_id_with_trip(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Option<(ScheduleRecord, TripRecord)>>;

    /// Retrieves every schedule of a trip, ordered by key within each list.
    async fn find_all_by_trip(&self, trip_id: TripId) -> Result<Vec<ScheduleRecord>>;

    /// Renumbers one list (a day, or temporary storage when `day_id` is None)
    /// to `0, GAP, 2*GAP, ...` keeping the existing relative order.
    ///
    /// Safe to run twice or concurrently: only relative order is guaranteed.
    /// Returns the number of rows touched.
    async fn relocate(&self, trip_id: TripId, day_id: Option<DayId>) -> Result<u64>;

    /// Moves every schedule of the given days into temporary storage,
    /// ordered by `(day date, key)` and appended one GAP past the current
    /// temporary storage maximum (or from zero when it is empty).
    ///
    /// Returns the number of rows touched.
    async fn migrate_to_temporary_storage(&self, trip_id: TripId, day_ids: &[DayId])
    -> Result<u64>;

    /// Counts every schedule of a trip.
    async fn count_by_trip(&self, trip_id: TripId) -> Result<u64>;

    /// Counts the schedules placed on a day.
    async fn count_by_day(&self, day_id: DayId) -> Result<u64>;

    /// Deletes every schedule of a trip. Returns the number of rows deleted.
    async fn delete_all_by_trip(&self, trip_id: TripId) -> Result<u64>;
}

/// The full set of stores the planner service needs.
pub trait PlannerStore: TripStore + DayStore + ScheduleStore {}

// Blanket implementation for anything implementing all three stores
impl<T: TripStore + DayStore + ScheduleStore + ?Sized> PlannerStore for T {}
