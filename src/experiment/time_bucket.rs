//! Time buckets (the `dy` column)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A discrete period over which counts were aggregated.
///
/// A dataset uses one kind of bucket throughout, taken from the type of its
/// `dy` column. Ordering within a kind is chronological for `Day` and `Date`
/// and lexicographic for `Label` (ISO date strings sort correctly).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeBucket {
    /// Integer day index
    Day(i64),
    /// Calendar date
    Date(NaiveDate),
    /// Free-form label (e.g. `"2024-03-01"` read as text)
    Label(String),
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day(day) => write!(f, "{day}"),
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Label(label) => f.write_str(label),
        }
    }
}

impl From<i64> for TimeBucket {
    fn from(day: i64) -> Self {
        Self::Day(day)
    }
}

impl From<NaiveDate> for TimeBucket {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

impl From<&str> for TimeBucket {
    fn from(label: &str) -> Self {
        Self::Label(label.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_ordering() {
        assert!(TimeBucket::Day(2) < TimeBucket::Day(10));
    }

    #[test]
    fn test_date_ordering_and_display() {
        let a = TimeBucket::from(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        let b = TimeBucket::from(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert!(a < b);
        assert_eq!(b.to_string(), "2024-02-01");
    }

    #[test]
    fn test_iso_labels_sort_chronologically() {
        let mut buckets = vec![
            TimeBucket::from("2024-03-02"),
            TimeBucket::from("2024-02-28"),
            TimeBucket::from("2024-03-01"),
        ];
        buckets.sort();
        assert_eq!(buckets[0].to_string(), "2024-02-28");
        assert_eq!(buckets[2].to_string(), "2024-03-02");
    }
}
