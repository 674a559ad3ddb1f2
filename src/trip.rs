//! Trip records for each pipeline stage and the keys that address them.

use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Taxi fleet a partition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CabType {
    Yellow,
    Green,
}

impl CabType {
    pub const ALL: [CabType; 2] = [CabType::Yellow, CabType::Green];

    pub fn as_str(&self) -> &'static str {
        match self {
            CabType::Yellow => "yellow",
            CabType::Green => "green",
        }
    }
}

impl fmt::Display for CabType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CabType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yellow" => Ok(CabType::Yellow),
            "green" => Ok(CabType::Green),
            other => Err(format!("unknown cab type '{other}'")),
        }
    }
}

/// Identifies one partition: a single cab type for a single calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PartitionKey {
    pub cab: CabType,
    pub year: i32,
}

impl PartitionKey {
    pub fn new(cab: CabType, year: i32) -> Self {
        Self { cab, year }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cab, self.year)
    }
}

/// An absolute calendar month, as opposed to the cyclical `month_of_year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(ts: &NaiveDateTime) -> Self {
        Self::new(ts.year(), ts.month())
    }

    /// The calendar month after this one.
    pub fn succ(&self) -> Self {
        if self.month >= 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{s}'"))?;
        let year: i32 = y.parse().map_err(|_| format!("bad year in '{s}'"))?;
        let month: u32 = m.parse().map_err(|_| format!("bad month in '{s}'"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in '{s}'"));
        }
        Ok(Self::new(year, month))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A trip as delivered by the acquisition side. Never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrip {
    pub cab_type: CabType,
    pub vendor_id: Option<i32>,
    pub pickup_datetime: NaiveDateTime,
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: Option<u32>,
    pub trip_distance: f64,
}

impl RawTrip {
    /// Exact elapsed time, fractional seconds included.
    pub fn duration(&self) -> TimeDelta {
        self.dropoff_datetime - self.pickup_datetime
    }
}

/// A trip that passed the record filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanTrip {
    pub cab_type: CabType,
    pub vendor_id: Option<i32>,
    #[serde(with = "timestamp")]
    pub pickup_datetime: NaiveDateTime,
    #[serde(with = "timestamp")]
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: Option<u32>,
    pub trip_distance: f64,
}

impl CleanTrip {
    pub fn duration(&self) -> TimeDelta {
        self.dropoff_datetime - self.pickup_datetime
    }
}

impl From<&RawTrip> for CleanTrip {
    fn from(raw: &RawTrip) -> Self {
        CleanTrip {
            cab_type: raw.cab_type,
            vendor_id: raw.vendor_id,
            pickup_datetime: raw.pickup_datetime,
            dropoff_datetime: raw.dropoff_datetime,
            passenger_count: raw.passenger_count,
            trip_distance: raw.trip_distance,
        }
    }
}

/// A clean trip with its emission estimate and pickup-time buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTrip {
    pub cab_type: CabType,
    pub vendor_id: Option<i32>,
    #[serde(with = "timestamp")]
    pub pickup_datetime: NaiveDateTime,
    #[serde(with = "timestamp")]
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: Option<u32>,
    pub trip_distance: f64,

    // derived
    pub trip_co2_kg: Option<f64>,
    pub avg_speed_mph: Option<f64>,
    pub hour_of_day: u32,
    pub day_of_week: u32,
    pub week_of_year: u32,
    pub month_of_year: u32,
    pub year_month: YearMonth,
}

impl EnrichedTrip {
    /// Builds the enriched row for `trip`, given its resolved emission factor.
    pub fn derive(trip: &CleanTrip, co2_grams_per_mile: f64) -> Self {
        let co2 = trip.trip_distance * co2_grams_per_mile / 1000.0;
        let duration = trip.duration();
        let avg_speed_mph = (duration > TimeDelta::zero()).then(|| {
            let seconds = duration.num_milliseconds() as f64 / 1000.0;
            trip.trip_distance / (seconds / SECONDS_PER_HOUR)
        });
        let pickup = &trip.pickup_datetime;

        EnrichedTrip {
            cab_type: trip.cab_type,
            vendor_id: trip.vendor_id,
            pickup_datetime: trip.pickup_datetime,
            dropoff_datetime: trip.dropoff_datetime,
            passenger_count: trip.passenger_count,
            trip_distance: trip.trip_distance,
            trip_co2_kg: co2.is_finite().then_some(co2),
            avg_speed_mph,
            hour_of_day: pickup.hour(),
            day_of_week: pickup.weekday().num_days_from_sunday(),
            week_of_year: pickup.iso_week().week(),
            month_of_year: pickup.month(),
            year_month: YearMonth::of(pickup),
        }
    }
}

pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Naive timestamps as `YYYY-MM-DD HH:MM:SS[.fff]`; an ISO `T` separator is
/// accepted on read.
pub mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
    const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn parse(s: &str) -> Option<NaiveDateTime> {
        let s = s.trim();
        NaiveDateTime::parse_from_str(s, FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(s, ISO_FORMAT))
            .ok()
    }

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{s}'")))
    }
}
