//! Row-shaped records exchanged with the store.
//!
//! Records carry no behaviour; the domain crate maps them to and from the
//! `Trip` aggregate.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{DayId, OwnerId, ScheduleId, TripId};

/// A persisted trip row.
///
/// `start_date` and `end_date` are either both set (decided period) or
/// both empty (undecided).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: TripId,
    pub owner_id: OwnerId,
    pub title: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// A persisted day row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub id: DayId,
    pub trip_id: TripId,
    pub trip_date: NaiveDate,
    pub color: String,
}

/// A persisted schedule row. `day_id` is None while the schedule sits in
/// temporary storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub id: ScheduleId,
    pub trip_id: TripId,
    pub day_id: Option<DayId>,
    pub title: String,
    pub content: String,
    pub place_id: String,
    pub place_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub order_key: i64,
}
