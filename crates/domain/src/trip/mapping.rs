//! Conversion between store records and the trip aggregate.

use std::collections::HashMap;

use common::KeySpace;
use trip_store::{DayRecord, ScheduleRecord, TripRecord};

use super::{Coordinate, Day, DayColor, Place, Schedule, ScheduleDetails, TimeWindow, Trip, TripPeriod};
use crate::error::DomainError;
use crate::order_key::OrderKey;

impl Trip {
    /// Assembles the aggregate from its persisted rows, checking keys
    /// against the process-wide key space.
    pub fn from_records(
        trip: TripRecord,
        days: Vec<DayRecord>,
        schedules: Vec<ScheduleRecord>,
    ) -> Result<Self, DomainError> {
        Self::from_records_in(&KeySpace::current(), trip, days, schedules)
    }

    /// Assembles the aggregate from its persisted rows.
    ///
    /// Every schedule must belong to the trip and point at one of its days
    /// (or at none), with a key inside `space`. Lists are ordered by key,
    /// ties broken by id.
    pub fn from_records_in(
        space: &KeySpace,
        trip: TripRecord,
        days: Vec<DayRecord>,
        schedules: Vec<ScheduleRecord>,
    ) -> Result<Self, DomainError> {
        let period = TripPeriod::from_bounds(trip.start_date, trip.end_date)
            .map_err(|e| invalid(format!("trip {}: {e}", trip.id)))?;

        let mut lists: HashMap<_, Vec<Schedule>> = HashMap::new();
        for record in schedules {
            if record.trip_id != trip.id {
                return Err(invalid(format!(
                    "schedule {} belongs to trip {}, not {}",
                    record.id, record.trip_id, trip.id
                )));
            }
            let schedule = Schedule::from_record_in(space, record)?;
            lists.entry(schedule.day_id()).or_default().push(schedule);
        }
        for list in lists.values_mut() {
            list.sort_by_key(|s| (s.order_key(), s.id()));
        }

        let mut restored = Vec::with_capacity(days.len());
        for record in days {
            if record.trip_id != trip.id || !period.contains(record.trip_date) {
                return Err(invalid(format!(
                    "day {} on {} is outside trip {}",
                    record.id, record.trip_date, trip.id
                )));
            }
            let color: DayColor = record
                .color
                .parse()
                .map_err(|e| invalid(format!("day {}: {e}", record.id)))?;
            let schedules = lists.remove(&Some(record.id)).unwrap_or_default();
            restored.push(Day::new(
                record.id,
                record.trip_id,
                record.trip_date,
                color,
                schedules,
            ));
        }
        restored.sort_by_key(Day::date);

        if restored.windows(2).any(|pair| pair[0].date() == pair[1].date()) {
            return Err(invalid(format!("trip {} has two days on one date", trip.id)));
        }

        let temporary = lists.remove(&None).unwrap_or_default();
        if let Some(orphan_day) = lists.keys().flatten().next() {
            return Err(invalid(format!(
                "schedules reference day {orphan_day} outside trip {}",
                trip.id
            )));
        }

        Ok(Trip::restore(
            trip.id,
            trip.owner_id,
            trip.title,
            period,
            restored,
            temporary,
        ))
    }

    pub fn to_record(&self) -> TripRecord {
        TripRecord {
            id: self.id(),
            owner_id: self.owner_id(),
            title: self.title().to_string(),
            start_date: self.period().start(),
            end_date: self.period().end(),
        }
    }

    /// Day rows for every day currently in the trip.
    pub fn day_records(&self) -> Vec<DayRecord> {
        self.days().iter().map(Day::to_record).collect()
    }
}

impl Day {
    pub fn to_record(&self) -> DayRecord {
        DayRecord {
            id: self.id(),
            trip_id: self.trip_id(),
            trip_date: self.date(),
            color: self.color().to_string(),
        }
    }
}

impl Schedule {
    pub fn to_record(&self) -> ScheduleRecord {
        let place = self.place();
        ScheduleRecord {
            id: self.id(),
            trip_id: self.trip_id(),
            day_id: self.day_id(),
            title: self.title().to_string(),
            content: self.content().to_string(),
            place_id: place.place_id.clone(),
            place_name: place.name.clone(),
            latitude: place.coordinate.latitude,
            longitude: place.coordinate.longitude,
            start_time: self.time().map(|t| t.start()),
            end_time: self.time().map(|t| t.end()),
            order_key: self.order_key().value(),
        }
    }

    pub(crate) fn from_record_in(
        space: &KeySpace,
        record: ScheduleRecord,
    ) -> Result<Self, DomainError> {
        let order_key = OrderKey::new_in(space, record.order_key)
            .map_err(|e| invalid(format!("schedule {}: {e}", record.id)))?;
        let time = TimeWindow::from_bounds(record.start_time, record.end_time)
            .map_err(|e| invalid(format!("schedule {}: {e}", record.id)))?;

        let details = ScheduleDetails {
            title: record.title,
            content: record.content,
            place: Place::new(
                record.place_id,
                record.place_name,
                Coordinate::new(record.latitude, record.longitude),
            ),
            time,
        };

        Ok(Schedule::new(
            record.id,
            record.trip_id,
            record.day_id,
            details,
            order_key,
        ))
    }
}

impl TryFrom<ScheduleRecord> for Schedule {
    type Error = DomainError;

    fn try_from(record: ScheduleRecord) -> Result<Self, Self::Error> {
        Self::from_record_in(&KeySpace::current(), record)
    }
}

fn invalid(message: String) -> DomainError {
    DomainError::InvalidRecord(message)
}
