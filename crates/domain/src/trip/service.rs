//! Trip service: loads the aggregate, applies one mutation, persists it.

use common::{DayId, OwnerId, ScheduleId, TripId};
use trip_store::{DayStore, ListRef, PlannerStore, ScheduleStore, StoreError, TripStore};

use super::{MoveOutcome, PeriodChange, Schedule, ScheduleDetails, Trip, TripError, TripPeriod};
use crate::config::PlannerConfig;
use crate::error::{CapacityScope, DomainError};

/// Outcome of [`TripService::change_period`].
#[derive(Debug, Clone)]
pub struct PeriodChanged {
    pub change: PeriodChange,

    /// The trip reloaded after migration, with migrated schedules in
    /// temporary storage.
    pub trip: Trip,
}

/// Service for managing trips and their schedules.
///
/// Each operation loads the trip aggregate, calls exactly one mutation on it
/// and writes the result back. When the aggregate runs out of ordering keys
/// the service relocates the affected list, throws the loaded aggregate
/// away, reloads it and retries the mutation once. Capacity limits are
/// checked against persisted counts before the aggregate is touched.
///
/// Keys are derived from the configured key space, which must match the
/// store's.
pub struct TripService<S: PlannerStore> {
    store: S,
    config: PlannerConfig,
}

impl<S: PlannerStore> TripService<S> {
    /// Creates a new trip service with default limits and the store's key
    /// space.
    pub fn new(store: S) -> Self {
        let config = PlannerConfig {
            key_space: store.key_space(),
            ..PlannerConfig::default()
        };
        Self { store, config }
    }

    /// Creates a trip service with explicit limits.
    ///
    /// Fails with [`DomainError::KeySpaceMismatch`] if `config` and `store`
    /// disagree on the key space.
    pub fn with_config(store: S, config: PlannerConfig) -> Result<Self, DomainError> {
        let store_space = store.key_space();
        if config.key_space != store_space {
            return Err(DomainError::KeySpaceMismatch {
                configured: config.key_space,
                store: store_space,
            });
        }
        Ok(Self { store, config })
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Loads a trip by ID.
    ///
    /// Returns None if the trip doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_trip(&self, trip_id: TripId) -> Result<Option<Trip>, DomainError> {
        match self.load(trip_id).await {
            Ok(trip) => Ok(Some(trip)),
            Err(DomainError::TripNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Loads a schedule by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_schedule(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Option<Schedule>, DomainError> {
        ScheduleStore::find_by_id_with_trip(&self.store, schedule_id)
            .await?
            .map(|(record, _)| Schedule::from_record_in(&self.config.key_space, record))
            .transpose()
    }

    /// Creates an undecided trip with no days.
    #[tracing::instrument(skip(self, title))]
    pub async fn create_trip(
        &self,
        owner_id: OwnerId,
        title: impl Into<String>,
    ) -> Result<Trip, DomainError> {
        let trip = Trip::new(owner_id, title);
        TripStore::save(&self.store, trip.to_record(), Vec::new()).await?;
        tracing::debug!(trip_id = %trip.id(), "trip created");
        Ok(trip)
    }

    #[tracing::instrument(skip(self, title))]
    pub async fn rename_trip(
        &self,
        trip_id: TripId,
        title: impl Into<String>,
    ) -> Result<Trip, DomainError> {
        let mut trip = self.load(trip_id).await?;
        trip.rename(title);
        TripStore::save(&self.store, trip.to_record(), trip.day_records()).await?;
        Ok(trip)
    }

    /// Deletes a trip with all of its days and schedules.
    #[tracing::instrument(skip(self))]
    pub async fn delete_trip(&self, trip_id: TripId) -> Result<(), DomainError> {
        if self.store.find_by_id(trip_id).await?.is_none() {
            return Err(DomainError::TripNotFound(trip_id));
        }

        let schedules = ScheduleStore::delete_all_by_trip(&self.store, trip_id).await?;
        let days = DayStore::delete_all_by_trip(&self.store, trip_id).await?;
        TripStore::delete(&self.store, trip_id).await?;

        tracing::info!(%trip_id, schedules, days, "trip deleted");
        Ok(())
    }

    /// Appends a new schedule to a day, or to temporary storage when
    /// `day_id` is None.
    #[tracing::instrument(skip(self, details))]
    pub async fn create_schedule(
        &self,
        trip_id: TripId,
        day_id: Option<DayId>,
        details: ScheduleDetails,
    ) -> Result<Schedule, DomainError> {
        self.check_trip_capacity(trip_id).await?;
        if let Some(day_id) = day_id {
            self.check_day_capacity(trip_id, day_id).await?;
        }

        let space = self.config.key_space;
        let (_, schedule) = self
            .mutate_with_relocation(trip_id, day_id, "create_schedule", |trip| {
                trip.create_schedule_in(&space, day_id, details.clone())
            })
            .await?;

        ScheduleStore::save(&self.store, schedule.to_record()).await?;
        Ok(schedule)
    }

    /// Replaces a schedule's title, content, place and time window.
    #[tracing::instrument(skip(self, details))]
    pub async fn update_schedule(
        &self,
        schedule_id: ScheduleId,
        details: ScheduleDetails,
    ) -> Result<Schedule, DomainError> {
        let trip_id = self.trip_of(schedule_id).await?;
        let mut trip = self.load(trip_id).await?;

        let schedule = trip.update_schedule(schedule_id, details)?;
        ScheduleStore::save(&self.store, schedule.to_record()).await?;
        Ok(schedule)
    }

    /// Moves a schedule to `target_order` within a day, or within temporary
    /// storage when `target_day` is None.
    #[tracing::instrument(skip(self))]
    pub async fn move_schedule(
        &self,
        schedule_id: ScheduleId,
        target_day: Option<DayId>,
        target_order: usize,
    ) -> Result<MoveOutcome, DomainError> {
        let (record, _) = ScheduleStore::find_by_id_with_trip(&self.store, schedule_id)
            .await?
            .ok_or(DomainError::ScheduleNotFound(schedule_id))?;

        if let Some(day_id) = target_day
            && record.day_id != target_day
        {
            self.check_day_capacity(record.trip_id, day_id).await?;
        }

        let space = self.config.key_space;
        let (trip, outcome) = self
            .mutate_with_relocation(record.trip_id, target_day, "move_schedule", |trip| {
                trip.move_schedule_in(&space, schedule_id, target_day, target_order)
            })
            .await?;

        if outcome.position_changed {
            let schedule = trip
                .schedule(schedule_id)
                .ok_or(DomainError::ScheduleNotFound(schedule_id))?;
            ScheduleStore::save(&self.store, schedule.to_record()).await?;
        }

        Ok(outcome)
    }

    /// Deletes a single schedule.
    #[tracing::instrument(skip(self))]
    pub async fn delete_schedule(&self, schedule_id: ScheduleId) -> Result<(), DomainError> {
        if !ScheduleStore::delete(&self.store, schedule_id).await? {
            return Err(DomainError::ScheduleNotFound(schedule_id));
        }
        Ok(())
    }

    /// Changes a trip's period, migrating schedules of removed days into
    /// temporary storage before the days are deleted.
    ///
    /// Migration, day deletion and the trip update are written as one unit.
    #[tracing::instrument(skip(self))]
    pub async fn change_period(
        &self,
        trip_id: TripId,
        period: TripPeriod,
    ) -> Result<PeriodChanged, DomainError> {
        let mut trip = self.load(trip_id).await?;
        let change = trip.change_period(period)?;

        let migrated = self
            .reconcile_with_relocation(&trip, &change.deleted_day_ids)
            .await?;
        if !change.deleted_day_ids.is_empty() {
            metrics::histogram!("planner_schedules_migrated").record(migrated as f64);
        }

        tracing::info!(
            %trip_id,
            deleted = change.deleted_day_ids.len(),
            created = change.created_days.len(),
            migrated = change.migrating_schedule_ids.len(),
            "trip period changed"
        );

        // Migrated keys were assigned by the store
        let trip = self.load(trip_id).await?;
        Ok(PeriodChanged { change, trip })
    }

    /// Renumbers one list of a trip to restore key spacing.
    #[tracing::instrument(skip(self))]
    pub async fn relocate(&self, trip_id: TripId, day_id: Option<DayId>) -> Result<u64, DomainError> {
        let list = ListRef::from_day(day_id);
        let touched = self.store.relocate(trip_id, day_id).await?;

        metrics::counter!("planner_relocations_total", "list" => list.label()).increment(1);
        tracing::info!(%trip_id, %list, touched, "relocated schedule keys");
        Ok(touched)
    }

    async fn load(&self, trip_id: TripId) -> Result<Trip, DomainError> {
        let (trip, days) = self
            .store
            .find_by_id_with_days(trip_id)
            .await?
            .ok_or(DomainError::TripNotFound(trip_id))?;
        let schedules = self.store.find_all_by_trip(trip_id).await?;

        Trip::from_records_in(&self.config.key_space, trip, days, schedules)
    }

    async fn trip_of(&self, schedule_id: ScheduleId) -> Result<TripId, DomainError> {
        ScheduleStore::find_by_id_with_trip(&self.store, schedule_id)
            .await?
            .map(|(record, _)| record.trip_id)
            .ok_or(DomainError::ScheduleNotFound(schedule_id))
    }

    /// Runs `mutate` against a freshly loaded trip. On a recoverable
    /// ordering failure, relocates `list`, reloads and runs it once more.
    async fn mutate_with_relocation<T, F>(
        &self,
        trip_id: TripId,
        list: Option<DayId>,
        operation: &'static str,
        mut mutate: F,
    ) -> Result<(Trip, T), DomainError>
    where
        F: FnMut(&mut Trip) -> Result<T, TripError>,
    {
        let mut trip = self.load(trip_id).await?;
        let error = match mutate(&mut trip) {
            Ok(value) => return Ok((trip, value)),
            Err(e) if e.is_recoverable() => e,
            Err(e) => return Err(e.into()),
        };

        tracing::warn!(%trip_id, operation, error = %error, "ordering keys exhausted, relocating");
        metrics::counter!("planner_mutation_retries_total", "operation" => operation).increment(1);

        self.relocate(trip_id, list).await?;

        // The loaded aggregate holds stale keys; never reuse it
        drop(trip);
        let mut trip = self.load(trip_id).await?;
        let value = mutate(&mut trip)?;
        Ok((trip, value))
    }

    /// Persists a period change. If temporary storage has no room for the
    /// migrated schedules, relocates it and writes once more.
    async fn reconcile_with_relocation(
        &self,
        trip: &Trip,
        deleted_day_ids: &[DayId],
    ) -> Result<u64, DomainError> {
        let trip_id = trip.id();
        let reconcile = || {
            self.store
                .reconcile_period(trip.to_record(), trip.day_records(), deleted_day_ids)
        };

        match reconcile().await {
            Err(StoreError::RangeExceeded { .. }) => {
                tracing::warn!(%trip_id, "temporary storage keys exhausted, relocating");
                metrics::counter!("planner_mutation_retries_total", "operation" => "change_period")
                    .increment(1);

                self.relocate(trip_id, None).await?;
                Ok(reconcile().await?)
            }
            result => Ok(result?),
        }
    }

    async fn check_trip_capacity(&self, trip_id: TripId) -> Result<(), DomainError> {
        let limit = self.config.max_schedules_per_trip;
        if self.store.count_by_trip(trip_id).await? >= limit {
            return Err(capacity_exceeded(CapacityScope::Trip, limit));
        }
        Ok(())
    }

    /// Counts the day's schedules once the day is known to belong to
    /// `trip_id`.
    async fn check_day_capacity(&self, trip_id: TripId, day_id: DayId) -> Result<(), DomainError> {
        match DayStore::find_by_id_with_trip(&self.store, day_id).await? {
            Some((day, _)) if day.trip_id == trip_id => {}
            _ => return Err(TripError::InvalidContainer { day_id }.into()),
        }

        let limit = self.config.max_schedules_per_day;
        if self.store.count_by_day(day_id).await? >= limit {
            return Err(capacity_exceeded(CapacityScope::Day, limit));
        }
        Ok(())
    }
}

fn capacity_exceeded(scope: CapacityScope, limit: u64) -> DomainError {
    metrics::counter!("planner_capacity_rejections_total").increment(1);
    tracing::debug!(%scope, limit, "capacity limit reached");
    DomainError::CapacityExceeded { scope, limit }
}
