use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    DayId, DayRecord, KeySpace, ListRef, Result, ScheduleId, ScheduleRecord, StoreError, TripId,
    TripRecord,
    store::{DayStore, ScheduleStore, TripStore},
};

#[derive(Default)]
struct State {
    trips: HashMap<TripId, TripRecord>,
    days: HashMap<DayId, DayRecord>,
    schedules: HashMap<ScheduleId, ScheduleRecord>,
}

impl State {
    /// Schedules of one list, sorted by key with the id as tie-breaker.
    fn list_mut(&mut self, trip_id: TripId, day_id: Option<DayId>) -> Vec<&mut ScheduleRecord> {
        let mut list: Vec<_> = self
            .schedules
            .values_mut()
            .filter(|s| s.trip_id == trip_id && s.day_id == day_id)
            .collect();
        list.sort_by_key(|s| (s.order_key, s.id));
        list
    }

    /// Unique (trip_id, trip_date) constraint simulation. Days in `ignoring`
    /// count as already deleted.
    fn check_unique_dates(&self, days: &[DayRecord], ignoring: &HashSet<DayId>) -> Result<()> {
        for day in days {
            let clash = self.days.values().any(|existing| {
                existing.trip_id == day.trip_id
                    && existing.trip_date == day.trip_date
                    && existing.id != day.id
                    && !ignoring.contains(&existing.id)
            });
            if clash {
                return Err(StoreError::DuplicateDay {
                    trip_id: day.trip_id,
                    date: day.trip_date,
                });
            }
        }
        Ok(())
    }

    /// Computes the new temporary storage keys for the schedules of
    /// `day_ids` without touching any row.
    fn plan_migration(
        &self,
        key_space: KeySpace,
        trip_id: TripId,
        day_ids: &[DayId],
    ) -> Result<Vec<(ScheduleId, i64)>> {
        let dates: HashMap<DayId, _> = self
            .days
            .values()
            .filter(|d| d.trip_id == trip_id && day_ids.contains(&d.id))
            .map(|d| (d.id, d.trip_date))
            .collect();

        let mut migrating: Vec<_> = self
            .schedules
            .values()
            .filter(|s| s.trip_id == trip_id)
            .filter_map(|s| Some((*dates.get(&s.day_id?)?, s.order_key, s.id)))
            .collect();
        if migrating.is_empty() {
            return Ok(Vec::new());
        }
        migrating.sort();

        let exhausted = move || StoreError::RangeExceeded {
            trip_id,
            list: ListRef::Temporary,
        };
        let start = self
            .schedules
            .values()
            .filter(|s| s.trip_id == trip_id && s.day_id.is_none())
            .map(|s| s.order_key)
            .max()
            .map_or(Some(0), |max| max.checked_add(key_space.gap()))
            .filter(|start| key_space.contains(*start))
            .ok_or_else(exhausted)?;

        migrating
            .into_iter()
            .enumerate()
            .map(|(index, (_, _, id))| {
                key_space
                    .slot(start, index as u64)
                    .map(|key| (id, key))
                    .ok_or_else(exhausted)
            })
            .collect()
    }

    fn apply_migration(&mut self, plan: &[(ScheduleId, i64)]) {
        for (id, key) in plan {
            if let Some(schedule) = self.schedules.get_mut(id) {
                schedule.day_id = None;
                schedule.order_key = *key;
            }
        }
    }

    fn delete_days(&mut self, targets: &HashSet<DayId>) -> u64 {
        let before = self.days.len();
        self.days.retain(|id, _| !targets.contains(id));

        // ON DELETE SET NULL
        for schedule in self.schedules.values_mut() {
            if schedule.day_id.is_some_and(|id| targets.contains(&id)) {
                schedule.day_id = None;
            }
        }

        (before - self.days.len()) as u64
    }

    fn upsert(&mut self, trip: TripRecord, days: Vec<DayRecord>) {
        for day in days {
            self.days.insert(day.id, day);
        }
        self.trips.insert(trip.id, trip);
    }
}

/// In-memory planner store implementation for testing.
///
/// This implementation keeps every row in memory behind a single lock and
/// mirrors the foreign key behaviour of the PostgreSQL schema.
#[derive(Clone)]
pub struct InMemoryPlannerStore {
    state: Arc<RwLock<State>>,
    key_space: KeySpace,
    relocations: Arc<AtomicU64>,
}

impl Default for InMemoryPlannerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlannerStore {
    /// Creates a new empty store using the process-wide key space.
    pub fn new() -> Self {
        Self::with_key_space(KeySpace::current())
    }

    /// Creates a new empty store with an explicit key space.
    pub fn with_key_space(key_space: KeySpace) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            key_space,
            relocations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the total number of schedules stored.
    pub async fn schedule_count(&self) -> usize {
        self.state.read().await.schedules.len()
    }

    /// Returns how many times `relocate` has been called, failed calls
    /// included.
    pub fn relocation_count(&self) -> u64 {
        self.relocations.load(Ordering::SeqCst)
    }

    /// Clears all rows.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.trips.clear();
        state.days.clear();
        state.schedules.clear();
    }
}

#[async_trait]
impl TripStore for InMemoryPlannerStore {
    async fn find_by_id(&self, trip_id: TripId) -> Result<Option<TripRecord>> {
        let state = self.state.read().await;
        Ok(state.trips.get(&trip_id).cloned())
    }

    async fn find_by_id_with_days(
        &self,
        trip_id: TripId,
    ) -> Result<Option<(TripRecord, Vec<DayRecord>)>> {
        let state = self.state.read().await;
        let Some(trip) = state.trips.get(&trip_id).cloned() else {
            return Ok(None);
        };

        let mut days: Vec<_> = state
            .days
            .values()
            .filter(|d| d.trip_id == trip_id)
            .cloned()
            .collect();
        days.sort_by_key(|d| d.trip_date);

        Ok(Some((trip, days)))
    }

    async fn save(&self, trip: TripRecord, days: Vec<DayRecord>) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_unique_dates(&days, &HashSet::new())?;
        state.upsert(trip, days);
        Ok(())
    }

    async fn reconcile_period(
        &self,
        trip: TripRecord,
        days: Vec<DayRecord>,
        deleted_day_ids: &[DayId],
    ) -> Result<u64> {
        let mut state = self.state.write().await;
        let deleted: HashSet<_> = deleted_day_ids.iter().copied().collect();

        // Every check runs before the first write
        let plan = state.plan_migration(self.key_space, trip.id, deleted_day_ids)?;
        state.check_unique_dates(&days, &deleted)?;

        state.apply_migration(&plan);
        state.delete_days(&deleted);
        state.upsert(trip, days);

        Ok(plan.len() as u64)
    }

    async fn delete(&self, trip_id: TripId) -> Result<bool> {
        let mut state = self.state.write().await;
        let removed = state.trips.remove(&trip_id).is_some();
        state.days.retain(|_, d| d.trip_id != trip_id);
        state.schedules.retain(|_, s| s.trip_id != trip_id);
        Ok(removed)
    }
}

#[async_trait]
impl DayStore for InMemoryPlannerStore {
    async fn find_by_id_with_trip(
        &self,
        day_id: DayId,
    ) -> Result<Option<(DayRecord, TripRecord)>> {
        let state = self.state.read().await;
        Ok(state.days.get(&day_id).and_then(|day| {
            state
                .trips
                .get(&day.trip_id)
                .map(|trip| (day.clone(), trip.clone()))
        }))
    }

    async fn delete_all_by_ids(&self, day_ids: &[DayId]) -> Result<u64> {
        let mut state = self.state.write().await;
        let targets: HashSet<_> = day_ids.iter().copied().collect();
        Ok(state.delete_days(&targets))
    }

    async fn delete_all_by_trip(&self, trip_id: TripId) -> Result<u64> {
        let mut state = self.state.write().await;
        let targets: HashSet<_> = state
            .days
            .values()
            .filter(|d| d.trip_id == trip_id)
            .map(|d| d.id)
            .collect();
        Ok(state.delete_days(&targets))
    }
}

#[async_trait]
impl ScheduleStore for InMemoryPlannerStore {
    fn key_space(&self) -> KeySpace {
        self.key_space
    }

    async fn save(&self, schedule: ScheduleRecord) -> Result<()> {
        let mut state = self.state.write().await;

        if !state.trips.contains_key(&schedule.trip_id) {
            return Err(StoreError::TripNotFound(schedule.trip_id));
        }
        if let Some(day_id) = schedule.day_id
            && !state.days.contains_key(&day_id)
        {
            return Err(StoreError::DayNotFound(day_id));
        }

        state.schedules.insert(schedule.id, schedule);
        Ok(())
    }

    async fn delete(&self, schedule_id: ScheduleId) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.schedules.remove(&schedule_id).is_some())
    }

    async fn find_by_id_with_trip(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Option<(ScheduleRecord, TripRecord)>> {
        let state = self.state.read().await;
        Ok(state.schedules.get(&schedule_id).and_then(|schedule| {
            state
                .trips
                .get(&schedule.trip_id)
                .map(|trip| (schedule.clone(), trip.clone()))
        }))
    }

    async fn find_all_by_trip(&self, trip_id: TripId) -> Result<Vec<ScheduleRecord>> {
        let state = self.state.read().await;
        let mut schedules: Vec<_> = state
            .schedules
            .values()
            .filter(|s| s.trip_id == trip_id)
            .cloned()
            .collect();
        schedules.sort_by_key(|s| (s.day_id, s.order_key, s.id));
        Ok(schedules)
    }

    async fn relocate(&self, trip_id: TripId, day_id: Option<DayId>) -> Result<u64> {
        self.relocations.fetch_add(1, Ordering::SeqCst);

        let key_space = self.key_space;
        let mut state = self.state.write().await;
        let mut list = state.list_mut(trip_id, day_id);

        let keys = (0..list.len() as u64)
            .map(|index| key_space.slot(0, index))
            .collect::<Option<Vec<_>>>()
            .ok_or(StoreError::RangeExceeded {
                trip_id,
                list: ListRef::from_day(day_id),
            })?;

        for (schedule, key) in list.iter_mut().zip(keys) {
            schedule.order_key = key;
        }

        tracing::debug!(%trip_id, ?day_id, touched = list.len(), "relocated schedule list");
        Ok(list.len() as u64)
    }

    async fn migrate_to_temporary_storage(
        &self,
        trip_id: TripId,
        day_ids: &[DayId],
    ) -> Result<u64> {
        let mut state = self.state.write().await;

        let plan = state.plan_migration(self.key_space, trip_id, day_ids)?;
        state.apply_migration(&plan);

        tracing::debug!(%trip_id, touched = plan.len(), "migrated schedules to temporary storage");
        Ok(plan.len() as u64)
    }

    async fn count_by_trip(&self, trip_id: TripId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .schedules
            .values()
            .filter(|s| s.trip_id == trip_id)
            .count() as u64)
    }

    async fn count_by_day(&self, day_id: DayId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .schedules
            .values()
            .filter(|s| s.day_id == Some(day_id))
            .count() as u64)
    }

    async fn delete_all_by_trip(&self, trip_id: TripId) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.schedules.len();
        state.schedules.retain(|_, s| s.trip_id != trip_id);
        Ok((before - state.schedules.len()) as u64)
    }
}
