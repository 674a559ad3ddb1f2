//! Data types produced by the aggregation stage.

use serde::Serialize;
use std::fmt;

use crate::trip::{EnrichedTrip, YearMonth};

/// Pickup-time discretization used for grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    HourOfDay,
    DayOfWeek,
    WeekOfYear,
    MonthOfYear,
    YearMonth,
}

impl Bucket {
    pub const CYCLICAL: [Bucket; 4] = [
        Bucket::HourOfDay,
        Bucket::DayOfWeek,
        Bucket::WeekOfYear,
        Bucket::MonthOfYear,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Bucket::HourOfDay => "hour_of_day",
            Bucket::DayOfWeek => "day_of_week",
            Bucket::WeekOfYear => "week_of_year",
            Bucket::MonthOfYear => "month_of_year",
            Bucket::YearMonth => "year_month",
        }
    }

    /// The bucket `trip` falls in, or `None` when its stored value is out of
    /// range for this bucket.
    pub fn key(&self, trip: &EnrichedTrip) -> Option<BucketValue> {
        let index = |v: u32, range: std::ops::RangeInclusive<u32>| {
            range.contains(&v).then_some(BucketValue::Index(v))
        };
        match self {
            Bucket::HourOfDay => index(trip.hour_of_day, 0..=23),
            Bucket::DayOfWeek => index(trip.day_of_week, 0..=6),
            Bucket::WeekOfYear => index(trip.week_of_year, 1..=53),
            Bucket::MonthOfYear => index(trip.month_of_year, 1..=12),
            Bucket::YearMonth => (1..=12)
                .contains(&trip.year_month.month)
                .then_some(BucketValue::YearMonth(trip.year_month)),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A single bucket: a cyclical index (hour, weekday, week, month) or an
/// absolute calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum BucketValue {
    Index(u32),
    YearMonth(YearMonth),
}

impl fmt::Display for BucketValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketValue::Index(i) => write!(f, "{i}"),
            BucketValue::YearMonth(ym) => write!(f, "{ym}"),
        }
    }
}

/// Which scalar a [`BucketStats`] holds per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    /// Mean CO₂ kg per trip.
    Average,
    /// Summed CO₂ kg.
    Total,
}

/// One bucket's statistic and the number of trips behind it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketEntry {
    pub value: BucketValue,
    pub co2_kg: f64,
    pub trips: usize,
}

/// A bucketed statistic over a view, ordered by bucket value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketStats {
    pub bucket: Bucket,
    pub statistic: Statistic,
    pub entries: Vec<BucketEntry>,
}

impl BucketStats {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, value: BucketValue) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.co2_kg)
    }
}

/// Lowest and highest buckets of a [`BucketStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremes {
    pub lightest: BucketEntry,
    pub heaviest: BucketEntry,
}
