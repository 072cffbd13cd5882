//! Trip period and the status derived from it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::TripError;

/// Planning status of a trip.
///
/// ```text
/// Undecided ──► Decided ──► Decided (period changed)
/// ```
/// A decided trip never returns to undecided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TripStatus {
    /// No dates chosen yet; the trip has no days.
    #[default]
    Undecided,

    /// A closed date range is set; the trip has one day per date.
    Decided,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Undecided => "Undecided",
            TripStatus::Decided => "Decided",
        }
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The dates a trip covers: either empty or a closed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TripPeriod {
    #[default]
    Undecided,
    Decided { start: NaiveDate, end: NaiveDate },
}

impl TripPeriod {
    /// Creates a decided period covering `start..=end`.
    pub fn decided(start: NaiveDate, end: NaiveDate) -> Result<Self, TripError> {
        if start > end {
            return Err(TripError::InvalidPeriod { start, end });
        }
        Ok(TripPeriod::Decided { start, end })
    }

    /// Builds a period from nullable start/end columns.
    pub fn from_bounds(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, TripError> {
        match (start, end) {
            (None, None) => Ok(TripPeriod::Undecided),
            (Some(start), Some(end)) => Self::decided(start, end),
            (Some(date), None) | (None, Some(date)) => Err(TripError::InvalidPeriod {
                start: date,
                end: date,
            }),
        }
    }

    pub fn is_decided(&self) -> bool {
        matches!(self, TripPeriod::Decided { .. })
    }

    pub fn status(&self) -> TripStatus {
        match self {
            TripPeriod::Undecided => TripStatus::Undecided,
            TripPeriod::Decided { .. } => TripStatus::Decided,
        }
    }

    pub fn start(&self) -> Option<NaiveDate> {
        match self {
            TripPeriod::Undecided => None,
            TripPeriod::Decided { start, .. } => Some(*start),
        }
    }

    pub fn end(&self) -> Option<NaiveDate> {
        match self {
            TripPeriod::Undecided => None,
            TripPeriod::Decided { end, .. } => Some(*end),
        }
    }

    /// Returns true if `date` falls inside the period.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match self {
            TripPeriod::Undecided => false,
            TripPeriod::Decided { start, end } => (*start..=*end).contains(&date),
        }
    }

    /// Every date of the period in ascending order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        match self {
            TripPeriod::Undecided => Vec::new(),
            TripPeriod::Decided { start, end } => start
                .iter_days()
                .take_while(|date| date <= end)
                .collect(),
        }
    }

    /// Number of days in the period.
    pub fn day_count(&self) -> usize {
        match self {
            TripPeriod::Undecided => 0,
            TripPeriod::Decided { start, end } => ((*end - *start).num_days() + 1) as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    #[test]
    fn test_decided_rejects_reversed_range() {
        let result = TripPeriod::decided(date(3, 5), date(3, 1));
        assert!(matches!(result, Err(TripError::InvalidPeriod { .. })));
    }

    #[test]
    fn test_single_day_period() {
        let period = TripPeriod::decided(date(3, 1), date(3, 1)).unwrap();
        assert_eq!(period.dates(), vec![date(3, 1)]);
        assert_eq!(period.day_count(), 1);
    }

    #[test]
    fn test_dates_cross_month_boundary() {
        let period = TripPeriod::decided(date(2, 27), date(3, 2)).unwrap();
        assert_eq!(
            period.dates(),
            vec![date(2, 27), date(2, 28), date(3, 1), date(3, 2)]
        );
        assert_eq!(period.day_count(), 4);
    }

    #[test]
    fn test_contains() {
        let period = TripPeriod::decided(date(3, 1), date(3, 4)).unwrap();
        assert!(period.contains(date(3, 1)));
        assert!(period.contains(date(3, 4)));
        assert!(!period.contains(date(3, 5)));
        assert!(!TripPeriod::Undecided.contains(date(3, 1)));
    }

    #[test]
    fn test_status_is_derived() {
        assert_eq!(TripPeriod::Undecided.status(), TripStatus::Undecided);
        let period = TripPeriod::decided(date(3, 1), date(3, 2)).unwrap();
        assert_eq!(period.status(), TripStatus::Decided);
    }

    #[test]
    fn test_from_bounds_requires_both_or_neither() {
        assert_eq!(
            TripPeriod::from_bounds(None, None).unwrap(),
            TripPeriod::Undecided
        );
        assert!(TripPeriod::from_bounds(Some(date(3, 1)), None).is_err());
        assert_eq!(
            TripPeriod::from_bounds(Some(date(3, 1)), Some(date(3, 3))).unwrap(),
            TripPeriod::Decided {
                start: date(3, 1),
                end: date(3, 3)
            }
        );
    }
}
