use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Display color of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayColor {
    Red,
    Orange,
    Yellow,
    Green,
    Teal,
    Blue,
    Purple,
    Pink,
}

impl DayColor {
    pub const PALETTE: [DayColor; 8] = [
        DayColor::Red,
        DayColor::Orange,
        DayColor::Yellow,
        DayColor::Green,
        DayColor::Teal,
        DayColor::Blue,
        DayColor::Purple,
        DayColor::Pink,
    ];

    /// Color assigned to a freshly created day. Consecutive dates never
    /// share a color.
    pub fn for_date(date: NaiveDate) -> Self {
        let index = date.num_days_from_ce().rem_euclid(Self::PALETTE.len() as i32);
        Self::PALETTE[index as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayColor::Red => "red",
            DayColor::Orange => "orange",
            DayColor::Yellow => "yellow",
            DayColor::Green => "green",
            DayColor::Teal => "teal",
            DayColor::Blue => "blue",
            DayColor::Purple => "purple",
            DayColor::Pink => "pink",
        }
    }
}

impl std::fmt::Display for DayColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown color name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown day color: {0}")]
pub struct UnknownColor(pub String);

impl FromStr for DayColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PALETTE
            .into_iter()
            .find(|color| color.as_str() == s)
            .ok_or_else(|| UnknownColor(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_dates_get_different_colors() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let colors: Vec<_> = start.iter_days().take(8).map(DayColor::for_date).collect();

        for pair in colors.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        for color in DayColor::PALETTE {
            assert!(colors.contains(&color));
        }
    }

    #[test]
    fn parses_its_own_names() {
        for color in DayColor::PALETTE {
            assert_eq!(color.as_str().parse::<DayColor>().unwrap(), color);
        }
        assert_eq!(
            "mauve".parse::<DayColor>(),
            Err(UnknownColor("mauve".to_string()))
        );
    }
}
