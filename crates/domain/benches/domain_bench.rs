use chrono::NaiveDate;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Coordinate, OrderKey, OwnerId, Place, ScheduleDetails, Trip, TripPeriod, TripService,
};
use trip_store::{InMemoryPlannerStore, TripStore};

fn details(n: usize) -> ScheduleDetails {
    ScheduleDetails::new(
        format!("Stop {n}"),
        Place::new(format!("place-{n}"), format!("Place {n}"), Coordinate::new(35.0, 135.0)),
    )
}

fn week() -> TripPeriod {
    TripPeriod::decided(
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 6, 7).unwrap(),
    )
    .unwrap()
}

fn bench_order_keys(c: &mut Criterion) {
    c.bench_function("domain/order_key_bisect_to_conflict", |b| {
        b.iter(|| {
            let lower = OrderKey::ZERO;
            let mut upper = OrderKey::ZERO.next().unwrap();
            while let Ok(mid) = lower.mid(&upper) {
                upper = mid;
            }
        });
    });
}

fn bench_aggregate_moves(c: &mut Criterion) {
    let mut trip = Trip::new(OwnerId::new(), "Bench");
    trip.change_period(week()).unwrap();
    let day_id = trip.days()[0].id();
    for n in 0..50 {
        trip.create_schedule(Some(day_id), details(n)).unwrap();
    }

    c.bench_function("domain/move_tail_to_head_50", |b| {
        b.iter(|| {
            let mut trip = trip.clone();
            let last = trip.day(day_id).unwrap().schedules()[49].id();
            trip.move_schedule(last, Some(day_id), 0).unwrap();
        });
    });
}

fn bench_change_period(c: &mut Criterion) {
    let mut trip = Trip::new(OwnerId::new(), "Bench");
    trip.change_period(week()).unwrap();
    for day_id in trip.days().iter().map(|d| d.id()).collect::<Vec<_>>() {
        for n in 0..10 {
            trip.create_schedule(Some(day_id), details(n)).unwrap();
        }
    }
    let shifted = TripPeriod::decided(
        NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
    )
    .unwrap();

    c.bench_function("domain/change_period_70_schedules", |b| {
        b.iter(|| {
            let mut trip = trip.clone();
            trip.change_period(shifted).unwrap();
        });
    });
}

fn bench_service_create(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = TripService::new(InMemoryPlannerStore::new());

    c.bench_function("domain/service_trip_lifecycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                let trip = service.create_trip(OwnerId::new(), "Bench").await.unwrap();
                service
                    .create_schedule(trip.id(), None, details(0))
                    .await
                    .unwrap();
                service.delete_trip(trip.id()).await.unwrap();
            });
        });
    });
}

fn bench_trip_reload(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = TripService::new(InMemoryPlannerStore::new());
    let trip_id = rt.block_on(async {
        let trip = service.create_trip(OwnerId::new(), "Bench").await.unwrap();
        let changed = service.change_period(trip.id(), week()).await.unwrap();
        for day in changed.trip.days() {
            for n in 0..10 {
                service
                    .create_schedule(trip.id(), Some(day.id()), details(n))
                    .await
                    .unwrap();
            }
        }
        trip.id()
    });

    c.bench_function("domain/reload_trip_70_schedules", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (trip, days) = service
                    .store()
                    .find_by_id_with_days(trip_id)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(days.len(), 7);
                service.get_trip(trip.id).await.unwrap().unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_order_keys,
    bench_aggregate_moves,
    bench_change_period,
    bench_service_create,
    bench_trip_reload,
);
criterion_main!(benches);
