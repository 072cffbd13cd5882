//! Schedules and their value objects.

use chrono::NaiveTime;
use common::{DayId, ScheduleId, TripId};
use serde::{Deserialize, Serialize};

use super::TripError;
use crate::order_key::OrderKey;

/// Geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A place a schedule visits, referenced by an external place id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub place_id: String,
    pub name: String,
    pub coordinate: Coordinate,
}

impl Place {
    pub fn new(place_id: impl Into<String>, name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            place_id: place_id.into(),
            name: name.into(),
            coordinate,
        }
    }
}

/// Optional visiting hours of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, TripError> {
        if start > end {
            return Err(TripError::InvalidTimeWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Builds a window from nullable columns. Both must be set for a window
    /// to exist.
    pub fn from_bounds(
        start: Option<NaiveTime>,
        end: Option<NaiveTime>,
    ) -> Result<Option<Self>, TripError> {
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end).map(Some),
            _ => Ok(None),
        }
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }
}

/// User-editable content of a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDetails {
    pub title: String,
    pub content: String,
    pub place: Place,
    pub time: Option<TimeWindow>,
}

impl ScheduleDetails {
    pub fn new(title: impl Into<String>, place: Place) -> Self {
        Self {
            title: title.into(),
            content: String::new(),
            place,
            time: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_time(mut self, time: TimeWindow) -> Self {
        self.time = Some(time);
        self
    }
}

/// A visit item placed either on a day or in temporary storage.
///
/// The schedule only refers to its trip and day by id; the trip aggregate
/// owns the ordered lists schedules live in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    id: ScheduleId,
    trip_id: TripId,
    day_id: Option<DayId>,
    details: ScheduleDetails,
    order_key: OrderKey,
}

impl Schedule {
    pub(crate) fn new(
        id: ScheduleId,
        trip_id: TripId,
        day_id: Option<DayId>,
        details: ScheduleDetails,
        order_key: OrderKey,
    ) -> Self {
        Self {
            id,
            trip_id,
            day_id,
            details,
            order_key,
        }
    }

    pub fn id(&self) -> ScheduleId {
        self.id
    }

    pub fn trip_id(&self) -> TripId {
        self.trip_id
    }

    /// The day holding this schedule, or None in temporary storage.
    pub fn day_id(&self) -> Option<DayId> {
        self.day_id
    }

    pub fn order_key(&self) -> OrderKey {
        self.order_key
    }

    pub fn title(&self) -> &str {
        &self.details.title
    }

    pub fn content(&self) -> &str {
        &self.details.content
    }

    pub fn place(&self) -> &Place {
        &self.details.place
    }

    pub fn time(&self) -> Option<TimeWindow> {
        self.details.time
    }

    pub fn details(&self) -> &ScheduleDetails {
        &self.details
    }

    pub(crate) fn set_details(&mut self, details: ScheduleDetails) {
        self.details = details;
    }

    pub(crate) fn place_at(&mut self, day_id: Option<DayId>, order_key: OrderKey) {
        self.day_id = day_id;
        self.order_key = order_key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
    }

    #[test]
    fn test_time_window_rejects_reversed_hours() {
        assert!(matches!(
            TimeWindow::new(time(12), time(9)),
            Err(TripError::InvalidTimeWindow { .. })
        ));
        assert!(TimeWindow::new(time(9), time(9)).is_ok());
    }

    #[test]
    fn test_time_window_from_partial_bounds_is_none() {
        assert_eq!(TimeWindow::from_bounds(Some(time(9)), None).unwrap(), None);
        assert_eq!(
            TimeWindow::from_bounds(Some(time(9)), Some(time(11))).unwrap(),
            Some(TimeWindow::new(time(9), time(11)).unwrap())
        );
    }

    #[test]
    fn test_details_builder() {
        let place = Place::new("p-1", "Belém Tower", Coordinate::new(38.69, -9.21));
        let window = TimeWindow::new(time(10), time(12)).unwrap();
        let details = ScheduleDetails::new("Tower", place.clone())
            .with_content("Buy tickets online")
            .with_time(window);

        assert_eq!(details.title, "Tower");
        assert_eq!(details.content, "Buy tickets online");
        assert_eq!(details.place, place);
        assert_eq!(details.time, Some(window));
    }
}
