use chrono::NaiveDate;
use common::{DayId, ScheduleId, TripId};
use serde::{Deserialize, Serialize};

use super::{DayColor, Schedule};

/// A dated bucket of schedules within a trip, ordered by ascending key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    id: DayId,
    trip_id: TripId,
    date: NaiveDate,
    color: DayColor,
    schedules: Vec<Schedule>,
}

impl Day {
    /// Creates an empty day with a color picked for its date.
    pub(crate) fn create(trip_id: TripId, date: NaiveDate) -> Self {
        Self::new(DayId::new(), trip_id, date, DayColor::for_date(date), Vec::new())
    }

    pub(crate) fn new(
        id: DayId,
        trip_id: TripId,
        date: NaiveDate,
        color: DayColor,
        schedules: Vec<Schedule>,
    ) -> Self {
        Self {
            id,
            trip_id,
            date,
            color,
            schedules,
        }
    }

    pub fn id(&self) -> DayId {
        self.id
    }

    pub fn trip_id(&self) -> TripId {
        self.trip_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn color(&self) -> DayColor {
        self.color
    }

    /// Schedules on this day in display order.
    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn schedule_ids(&self) -> Vec<ScheduleId> {
        self.schedules.iter().map(Schedule::id).collect()
    }

    pub(crate) fn schedules_mut(&mut self) -> &mut Vec<Schedule> {
        &mut self.schedules
    }

    pub(crate) fn into_schedules(self) -> Vec<Schedule> {
        self.schedules
    }
}
