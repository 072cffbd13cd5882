//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p trip-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use trip_store::{
    DayId, DayRecord, DayStore, KeySpace, OwnerId, PostgresPlannerStore, ScheduleId,
    ScheduleRecord, ScheduleStore, StoreError, TripId, TripRecord, TripStore,
};

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_planner_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresPlannerStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE schedules, days, trips")
        .execute(&pool)
        .await
        .unwrap();

    PostgresPlannerStore::with_key_space(pool, KeySpace::DEFAULT)
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

fn day(trip_id: TripId, on: u32) -> DayRecord {
    DayRecord {
        id: DayId::new(),
        trip_id,
        trip_date: date(on),
        color: "teal".to_string(),
    }
}

fn schedule(trip_id: TripId, day_id: Option<DayId>, order_key: i64) -> ScheduleRecord {
    ScheduleRecord {
        id: ScheduleId::new(),
        trip_id,
        day_id,
        title: format!("stop {order_key}"),
        content: "notes".to_string(),
        place_id: "ChIJ-place".to_string(),
        place_name: "Castelo".to_string(),
        latitude: 38.71,
        longitude: -9.13,
        start_time: NaiveTime::from_hms_opt(9, 0, 0),
        end_time: NaiveTime::from_hms_opt(10, 30, 0),
        order_key,
    }
}

async fn seed(store: &PostgresPlannerStore, days: &[u32]) -> (TripId, Vec<DayId>) {
    let trip_id = TripId::new();
    let trip = TripRecord {
        id: trip_id,
        owner_id: OwnerId::new(),
        title: "Lisbon".to_string(),
        start_date: Some(date(1)),
        end_date: Some(date(5)),
    };
    let days: Vec<_> = days.iter().map(|on| day(trip_id, *on)).collect();
    let ids = days.iter().map(|d| d.id).collect();
    TripStore::save(store, trip, days).await.unwrap();
    (trip_id, ids)
}

async fn list(
    store: &PostgresPlannerStore,
    trip_id: TripId,
    day_id: Option<DayId>,
) -> Vec<(String, i64)> {
    store
        .find_all_by_trip(trip_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.day_id == day_id)
        .map(|s| (s.title, s.order_key))
        .collect()
}

#[tokio::test]
#[serial]
async fn trip_and_days_round_trip() {
    let store = get_test_store().await;
    let (trip_id, days) = seed(&store, &[3, 1, 2]).await;

    let (trip, stored_days) = store.find_by_id_with_days(trip_id).await.unwrap().unwrap();
    assert_eq!(trip.title, "Lisbon");
    assert_eq!(stored_days.len(), 3);
    assert_eq!(
        stored_days.iter().map(|d| d.trip_date).collect::<Vec<_>>(),
        vec![date(1), date(2), date(3)]
    );

    let (found_day, found_trip) = DayStore::find_by_id_with_trip(&store, days[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found_day.trip_date, date(3));
    assert_eq!(found_trip.id, trip_id);
}

#[tokio::test]
#[serial]
async fn duplicate_day_date_is_rejected() {
    let store = get_test_store().await;
    let (trip_id, _) = seed(&store, &[1]).await;
    let trip = store.find_by_id(trip_id).await.unwrap().unwrap();

    let result = TripStore::save(&store, trip, vec![day(trip_id, 1)]).await;
    assert!(matches!(result, Err(StoreError::DuplicateDay { .. })));
}

#[tokio::test]
#[serial]
async fn schedule_save_maps_missing_day() {
    let store = get_test_store().await;
    let (trip_id, _) = seed(&store, &[]).await;
    let missing = DayId::new();

    let result = ScheduleStore::save(&store, schedule(trip_id, Some(missing), 0)).await;
    assert!(matches!(result, Err(StoreError::DayNotFound(id)) if id == missing));
}

#[tokio::test]
#[serial]
async fn schedule_upsert_and_lookup() {
    let store = get_test_store().await;
    let (trip_id, days) = seed(&store, &[1]).await;

    let mut record = schedule(trip_id, Some(days[0]), 0);
    ScheduleStore::save(&store, record.clone()).await.unwrap();

    record.order_key = 500;
    record.day_id = None;
    ScheduleStore::save(&store, record.clone()).await.unwrap();

    let (found, trip) = ScheduleStore::find_by_id_with_trip(&store, record.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, record);
    assert_eq!(trip.id, trip_id);
    assert_eq!(store.count_by_trip(trip_id).await.unwrap(), 1);
    assert_eq!(store.count_by_day(days[0]).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn relocate_renumbers_only_the_target_day() {
    let store = get_test_store().await;
    let (trip_id, days) = seed(&store, &[1, 2]).await;

    for key in [30, 10, 20] {
        ScheduleStore::save(&store, schedule(trip_id, Some(days[0]), key))
            .await
            .unwrap();
    }
    ScheduleStore::save(&store, schedule(trip_id, Some(days[1]), 7))
        .await
        .unwrap();
    ScheduleStore::save(&store, schedule(trip_id, None, 3))
        .await
        .unwrap();

    let touched = store.relocate(trip_id, Some(days[0])).await.unwrap();
    assert_eq!(touched, 3);

    let gap = KeySpace::DEFAULT.gap();
    assert_eq!(
        list(&store, trip_id, Some(days[0])).await,
        vec![
            ("stop 10".to_string(), 0),
            ("stop 20".to_string(), gap),
            ("stop 30".to_string(), 2 * gap),
        ]
    );
    assert_eq!(list(&store, trip_id, Some(days[1])).await, vec![("stop 7".to_string(), 7)]);
    assert_eq!(list(&store, trip_id, None).await, vec![("stop 3".to_string(), 3)]);
}

#[tokio::test]
#[serial]
async fn relocate_temporary_storage_is_repeatable() {
    let store = get_test_store().await;
    let (trip_id, _) = seed(&store, &[]).await;
    for key in [5, 6, 4] {
        ScheduleStore::save(&store, schedule(trip_id, None, key))
            .await
            .unwrap();
    }

    store.relocate(trip_id, None).await.unwrap();
    let first = list(&store, trip_id, None).await;
    store.relocate(trip_id, None).await.unwrap();

    assert_eq!(list(&store, trip_id, None).await, first);
    assert_eq!(
        first.iter().map(|(title, _)| title.as_str()).collect::<Vec<_>>(),
        vec!["stop 4", "stop 5", "stop 6"]
    );
}

#[tokio::test]
#[serial]
async fn migrate_orders_by_date_then_key() {
    let store = get_test_store().await;
    let (trip_id, days) = seed(&store, &[1, 2, 3]).await;

    ScheduleStore::save(&store, schedule(trip_id, Some(days[1]), -8))
        .await
        .unwrap();
    ScheduleStore::save(&store, schedule(trip_id, Some(days[0]), 40))
        .await
        .unwrap();
    ScheduleStore::save(&store, schedule(trip_id, Some(days[0]), 15))
        .await
        .unwrap();
    ScheduleStore::save(&store, schedule(trip_id, Some(days[2]), 1))
        .await
        .unwrap();
    ScheduleStore::save(&store, schedule(trip_id, None, 900))
        .await
        .unwrap();

    let touched = store
        .migrate_to_temporary_storage(trip_id, &[days[0], days[1]])
        .await
        .unwrap();
    assert_eq!(touched, 3);

    let gap = KeySpace::DEFAULT.gap();
    assert_eq!(
        list(&store, trip_id, None).await,
        vec![
            ("stop 900".to_string(), 900),
            ("stop 15".to_string(), 900 + gap),
            ("stop 40".to_string(), 900 + 2 * gap),
            ("stop -8".to_string(), 900 + 3 * gap),
        ]
    );
    assert_eq!(list(&store, trip_id, Some(days[2])).await, vec![("stop 1".to_string(), 1)]);
}

#[tokio::test]
#[serial]
async fn deleting_days_keeps_their_schedules() {
    let store = get_test_store().await;
    let (trip_id, days) = seed(&store, &[1, 2]).await;
    ScheduleStore::save(&store, schedule(trip_id, Some(days[0]), 0))
        .await
        .unwrap();

    assert_eq!(store.delete_all_by_ids(&days[..1]).await.unwrap(), 1);
    assert_eq!(store.count_by_trip(trip_id).await.unwrap(), 1);

    assert!(TripStore::delete(&store, trip_id).await.unwrap());
    assert_eq!(store.count_by_trip(trip_id).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn reconcile_period_migrates_deletes_and_upserts() {
    let store = get_test_store().await;
    let (trip_id, days) = seed(&store, &[1, 2]).await;
    ScheduleStore::save(&store, schedule(trip_id, Some(days[0]), 5))
        .await
        .unwrap();

    let mut trip = store.find_by_id(trip_id).await.unwrap().unwrap();
    trip.start_date = Some(date(2));
    trip.end_date = Some(date(3));
    let added = day(trip_id, 3);

    let migrated = store
        .reconcile_period(trip, vec![added.clone()], &days[..1])
        .await
        .unwrap();
    assert_eq!(migrated, 1);

    let (trip, stored_days) = store.find_by_id_with_days(trip_id).await.unwrap().unwrap();
    assert_eq!(trip.start_date, Some(date(2)));
    assert_eq!(
        stored_days.iter().map(|d| d.id).collect::<Vec<_>>(),
        vec![days[1], added.id]
    );
    assert_eq!(list(&store, trip_id, None).await, vec![("stop 5".to_string(), 0)]);
}

#[tokio::test]
#[serial]
async fn reconcile_period_rolls_back_when_keys_run_out() {
    let store = get_test_store().await;
    let narrow = KeySpace::new(10, -25, 25).unwrap();
    let store = PostgresPlannerStore::with_key_space(store.pool().clone(), narrow);
    let (trip_id, days) = seed(&store, &[1, 2]).await;
    ScheduleStore::save(&store, schedule(trip_id, Some(days[0]), 0))
        .await
        .unwrap();
    ScheduleStore::save(&store, schedule(trip_id, None, 20))
        .await
        .unwrap();

    let mut trip = store.find_by_id(trip_id).await.unwrap().unwrap();
    let before = trip.clone();
    trip.start_date = Some(date(2));

    let result = store.reconcile_period(trip, vec![], &days[..1]).await;
    assert!(matches!(result, Err(StoreError::RangeExceeded { .. })));

    let (trip, stored_days) = store.find_by_id_with_days(trip_id).await.unwrap().unwrap();
    assert_eq!(trip, before);
    assert_eq!(stored_days.len(), 2);
    assert_eq!(list(&store, trip_id, Some(days[0])).await, vec![("stop 0".to_string(), 0)]);
    assert_eq!(list(&store, trip_id, None).await, vec![("stop 20".to_string(), 20)]);
}
