use std::time::Instant;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    DayId, DayRecord, KeySpace, ListRef, OwnerId, Result, ScheduleId, ScheduleRecord, StoreError,
    TripId, TripRecord,
    store::{DayStore, ScheduleStore, TripStore},
};

const TRIP_COLUMNS: &str = "id, owner_id, title, start_date, end_date";

const SCHEDULE_COLUMNS: &str = "id, trip_id, day_id, title, content, place_id, place_name, \
     latitude, longitude, start_time, end_time, order_key";

/// PostgreSQL-backed planner store implementation.
#[derive(Clone)]
pub struct PostgresPlannerStore {
    pool: PgPool,
    key_space: KeySpace,
}

impl PostgresPlannerStore {
    /// Creates a new PostgreSQL store using the process-wide key space.
    pub fn new(pool: PgPool) -> Self {
        Self::with_key_space(pool, KeySpace::current())
    }

    /// Creates a new PostgreSQL store with an explicit key space.
    pub fn with_key_space(pool: PgPool, key_space: KeySpace) -> Self {
        Self { pool, key_space }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_trip(row: &PgRow) -> Result<TripRecord> {
        Ok(TripRecord {
            id: TripId::from_uuid(row.try_get::<Uuid, _>("id")?),
            owner_id: OwnerId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
            title: row.try_get("title")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
        })
    }

    fn row_to_day(row: &PgRow) -> Result<DayRecord> {
        Ok(DayRecord {
            id: DayId::from_uuid(row.try_get::<Uuid, _>("id")?),
            trip_id: TripId::from_uuid(row.try_get::<Uuid, _>("trip_id")?),
            trip_date: row.try_get("trip_date")?,
            color: row.try_get("color")?,
        })
    }

    fn row_to_schedule(row: &PgRow) -> Result<ScheduleRecord> {
        Ok(ScheduleRecord {
            id: ScheduleId::from_uuid(row.try_get::<Uuid, _>("id")?),
            trip_id: TripId::from_uuid(row.try_get::<Uuid, _>("trip_id")?),
            day_id: row
                .try_get::<Option<Uuid>, _>("day_id")?
                .map(DayId::from_uuid),
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            place_id: row.try_get("place_id")?,
            place_name: row.try_get("place_name")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            order_key: row.try_get("order_key")?,
        })
    }

    async fn fetch_trip(&self, trip_id: TripId) -> Result<Option<TripRecord>> {
        let row = sqlx::query(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"))
            .bind(trip_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_trip).transpose()
    }

    /// Fails with `RangeExceeded` if `count` keys starting at `start` do not
    /// fit in the key space.
    fn check_room(&self, trip_id: TripId, list: ListRef, start: i64, count: i64) -> Result<()> {
        let last = u64::try_from(count - 1).unwrap_or(0);
        if !self.key_space.contains(start) || self.key_space.slot(start, last).is_none() {
            return Err(StoreError::RangeExceeded { trip_id, list });
        }
        Ok(())
    }

    async fn count_list(
        tx: &mut Transaction<'_, Postgres>,
        trip_id: TripId,
        day_id: Option<DayId>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM schedules WHERE trip_id = $1 AND day_id IS NOT DISTINCT FROM $2",
        )
        .bind(trip_id.as_uuid())
        .bind(day_id.map(|id| id.as_uuid()))
        .fetch_one(&mut **tx)
        .await?;
        Ok(count)
    }

    /// Takes a row lock on the trip so bulk renumbering of its lists runs
    /// one transaction at a time. Returns false if the trip does not exist.
    async fn lock_trip(tx: &mut Transaction<'_, Postgres>, trip_id: TripId) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM trips WHERE id = $1 FOR UPDATE")
            .bind(trip_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.is_some())
    }

    async fn upsert_in(
        tx: &mut Transaction<'_, Postgres>,
        trip: &TripRecord,
        days: &[DayRecord],
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trips (id, owner_id, title, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date
            "#,
        )
        .bind(trip.id.as_uuid())
        .bind(trip.owner_id.as_uuid())
        .bind(&trip.title)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .execute(&mut **tx)
        .await?;

        for day in days {
            sqlx::query(
                r#"
                INSERT INTO days (id, trip_id, trip_date, color)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE SET
                    trip_date = EXCLUDED.trip_date,
                    color = EXCLUDED.color
                "#,
            )
            .bind(day.id.as_uuid())
            .bind(day.trip_id.as_uuid())
            .bind(day.trip_date)
            .bind(&day.color)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                map_constraint_error(e, || StoreError::DuplicateDay {
                    trip_id: day.trip_id,
                    date: day.trip_date,
                })
            })?;
        }

        Ok(())
    }

    async fn delete_days_in(tx: &mut Transaction<'_, Postgres>, day_ids: &[DayId]) -> Result<u64> {
        if day_ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = day_ids.iter().map(|id| id.as_uuid()).collect();
        let result = sqlx::query("DELETE FROM days WHERE id = ANY($1)")
            .bind(&ids[..])
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    /// Appends the schedules of `day_ids` to temporary storage. The caller
    /// holds the trip lock.
    ///
    /// The temporary storage tail is read by the UPDATE itself; the key
    /// bounds are checked afterwards and fail the transaction.
    async fn migrate_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        trip_id: TripId,
        day_ids: &[DayId],
    ) -> Result<u64> {
        if day_ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = day_ids.iter().map(|id| id.as_uuid()).collect();
        let result = sqlx::query(
            r#"
            UPDATE schedules AS s
            SET day_id = NULL,
                order_key = tail.start + ranked.position * $3
            FROM (
                SELECT sc.id,
                       ROW_NUMBER() OVER (ORDER BY d.trip_date ASC, sc.order_key ASC, sc.id ASC) - 1
                           AS position
                FROM schedules sc
                JOIN days d ON d.id = sc.day_id
                WHERE sc.trip_id = $1 AND sc.day_id = ANY($2)
            ) AS ranked,
            (
                SELECT COALESCE(MAX(order_key) + $3, 0) AS start
                FROM schedules
                WHERE trip_id = $1 AND day_id IS NULL
            ) AS tail
            WHERE s.id = ranked.id
            "#,
        )
        .bind(trip_id.as_uuid())
        .bind(&ids[..])
        .bind(self.key_space.gap())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(0);
        }

        let highest: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(order_key) FROM schedules WHERE trip_id = $1 AND day_id IS NULL",
        )
        .bind(trip_id.as_uuid())
        .fetch_one(&mut **tx)
        .await?;

        if highest.is_some_and(|key| !self.key_space.contains(key)) {
            return Err(StoreError::RangeExceeded {
                trip_id,
                list: ListRef::Temporary,
            });
        }

        Ok(result.rows_affected())
    }
}

fn map_constraint_error(e: sqlx::Error, on_unique: impl FnOnce() -> StoreError) -> StoreError {
    // Unique (trip_id, trip_date) violations surface as a domain-level conflict
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.constraint() == Some("unique_trip_date")
    {
        return on_unique();
    }
    StoreError::Database(e)
}

#[async_trait]
impl TripStore for PostgresPlannerStore {
    async fn find_by_id(&self, trip_id: TripId) -> Result<Option<TripRecord>> {
        self.fetch_trip(trip_id).await
    }

    async fn find_by_id_with_days(
        &self,
        trip_id: TripId,
    ) -> Result<Option<(TripRecord, Vec<DayRecord>)>> {
        let Some(trip) = self.fetch_trip(trip_id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT id, trip_id, trip_date, color
            FROM days
            WHERE trip_id = $1
            ORDER BY trip_date ASC
            "#,
        )
        .bind(trip_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let days = rows.iter().map(Self::row_to_day).collect::<Result<_>>()?;
        Ok(Some((trip, days)))
    }

    async fn save(&self, trip: TripRecord, days: Vec<DayRecord>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_in(&mut tx, &trip, &days).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn reconcile_period(
        &self,
        trip: TripRecord,
        days: Vec<DayRecord>,
        deleted_day_ids: &[DayId],
    ) -> Result<u64> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        Self::lock_trip(&mut tx, trip.id).await?;
        let migrated = self.migrate_in(&mut tx, trip.id, deleted_day_ids).await?;
        let deleted = Self::delete_days_in(&mut tx, deleted_day_ids).await?;
        Self::upsert_in(&mut tx, &trip, &days).await?;

        tx.commit().await?;

        metrics::histogram!("planner_store_bulk_update_seconds", "operation" => "reconcile")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(trip_id = %trip.id, migrated, deleted, "reconciled trip period");
        Ok(migrated)
    }

    async fn delete(&self, trip_id: TripId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(trip_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DayStore for PostgresPlannerStore {
    async fn find_by_id_with_trip(
        &self,
        day_id: DayId,
    ) -> Result<Option<(DayRecord, TripRecord)>> {
        let row = sqlx::query(
            r#"
            SELECT d.id, d.trip_id, d.trip_date, d.color,
                   t.owner_id, t.title, t.start_date, t.end_date
            FROM days d
            JOIN trips t ON t.id = d.trip_id
            WHERE d.id = $1
            "#,
        )
        .bind(day_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let day = Self::row_to_day(&row)?;
        let trip = TripRecord {
            id: day.trip_id,
            owner_id: OwnerId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
            title: row.try_get("title")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
        };
        Ok(Some((day, trip)))
    }

    async fn delete_all_by_ids(&self, day_ids: &[DayId]) -> Result<u64> {
        if day_ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = day_ids.iter().map(|id| id.as_uuid()).collect();
        let result = sqlx::query("DELETE FROM days WHERE id = ANY($1)")
            .bind(&ids[..])
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_all_by_trip(&self, trip_id: TripId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM days WHERE trip_id = $1")
            .bind(trip_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ScheduleStore for PostgresPlannerStore {
    fn key_space(&self) -> KeySpace {
        self.key_space
    }

    async fn save(&self, schedule: ScheduleRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schedules (id, trip_id, day_id, title, content, place_id, place_name,
                                   latitude, longitude, start_time, end_time, order_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                day_id = EXCLUDED.day_id,
                title = EXCLUDED.title,
                content = EXCLUDED.content,
                place_id = EXCLUDED.place_id,
                place_name = EXCLUDED.place_name,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                order_key = EXCLUDED.order_key
            "#,
        )
        .bind(schedule.id.as_uuid())
        .bind(schedule.trip_id.as_uuid())
        .bind(schedule.day_id.map(|id| id.as_uuid()))
        .bind(&schedule.title)
        .bind(&schedule.content)
        .bind(&schedule.place_id)
        .bind(&schedule.place_name)
        .bind(schedule.latitude)
        .bind(schedule.longitude)
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .bind(schedule.order_key)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return match schedule.day_id {
                    Some(day_id) if db_err.constraint() == Some("schedules_day_id_fkey") => {
                        StoreError::DayNotFound(day_id)
                    }
                    _ => StoreError::TripNotFound(schedule.trip_id),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn delete(&self, schedule_id: ScheduleId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(schedule_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id_with_trip(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Option<(ScheduleRecord, TripRecord)>> {
        let row = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = $1"
        ))
        .bind(schedule_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let schedule = Self::row_to_schedule(&row)?;
        Ok(self
            .fetch_trip(schedule.trip_id)
            .await?
            .map(|trip| (schedule, trip)))
    }

    async fn find_all_by_trip(&self, trip_id: TripId) -> Result<Vec<ScheduleRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE trip_id = $1 \
             ORDER BY day_id ASC NULLS FIRST, order_key ASC, id ASC"
        ))
        .bind(trip_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_schedule).collect()
    }

    async fn relocate(&self, trip_id: TripId, day_id: Option<DayId>) -> Result<u64> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        if !Self::lock_trip(&mut tx, trip_id).await? {
            return Ok(0);
        }
        let count = Self::count_list(&mut tx, trip_id, day_id).await?;
        self.check_room(trip_id, ListRef::from_day(day_id), 0, count)?;

        let result = sqlx::query(
            r#"
            UPDATE schedules AS s
            SET order_key = ranked.position * $3
            FROM (
                SELECT id, ROW_NUMBER() OVER (ORDER BY order_key ASC, id ASC) - 1 AS position
                FROM schedules
                WHERE trip_id = $1 AND day_id IS NOT DISTINCT FROM $2
            ) AS ranked
            WHERE s.id = ranked.id
            "#,
        )
        .bind(trip_id.as_uuid())
        .bind(day_id.map(|id| id.as_uuid()))
        .bind(self.key_space.gap())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        metrics::histogram!("planner_store_bulk_update_seconds", "operation" => "relocate")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(%trip_id, ?day_id, touched = result.rows_affected(), "relocated schedule list");
        Ok(result.rows_affected())
    }

    async fn migrate_to_temporary_storage(
        &self,
        trip_id: TripId,
        day_ids: &[DayId],
    ) -> Result<u64> {
        if day_ids.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        if !Self::lock_trip(&mut tx, trip_id).await? {
            return Ok(0);
        }
        let migrated = self.migrate_in(&mut tx, trip_id, day_ids).await?;

        tx.commit().await?;

        metrics::histogram!("planner_store_bulk_update_seconds", "operation" => "migrate")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(%trip_id, touched = migrated, "migrated schedules to temporary storage");
        Ok(migrated)
    }

    async fn count_by_trip(&self, trip_id: TripId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schedules WHERE trip_id = $1")
            .bind(trip_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_by_day(&self, day_id: DayId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schedules WHERE day_id = $1")
            .bind(day_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn delete_all_by_trip(&self, trip_id: TripId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM schedules WHERE trip_id = $1")
            .bind(trip_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
