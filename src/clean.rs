//! Record filter: validation and exact-duplicate removal for one raw partition.

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use crate::trip::{CabType, CleanTrip, PartitionKey, RawTrip};

pub const MAX_TRIP_SECONDS: i64 = 86_400;
pub const MAX_TRIP_MILES: f64 = 100.0;

fn max_trip_duration() -> TimeDelta {
    TimeDelta::seconds(MAX_TRIP_SECONDS)
}

/// Whether a raw row satisfies every clean-trip invariant.
pub fn is_valid(trip: &RawTrip) -> bool {
    let duration = trip.duration();

    trip.passenger_count != Some(0)
        && trip.trip_distance > 0.0
        && trip.trip_distance <= MAX_TRIP_MILES
        && duration > TimeDelta::zero()
        && duration <= max_trip_duration()
}

/// Full-tuple identity used for duplicate removal. Distances compare by bit
/// pattern.
type TripIdentity = (CabType, Option<i32>, NaiveDateTime, NaiveDateTime, Option<u32>, u64);

fn identity(trip: &CleanTrip) -> TripIdentity {
    (
        trip.cab_type,
        trip.vendor_id,
        trip.pickup_datetime,
        trip.dropoff_datetime,
        trip.passenger_count,
        trip.trip_distance.to_bits(),
    )
}

/// Filters a raw partition down to clean trips.
///
/// Rows failing any invariant are dropped, then exact duplicates across all
/// six fields are collapsed. The first occurrence is kept, so output order
/// follows input order and repeated runs produce identical output.
pub fn clean_partition(raw: &[RawTrip]) -> Vec<CleanTrip> {
    let mut seen = HashSet::new();

    raw.iter()
        .filter(|t| is_valid(t))
        .map(CleanTrip::from)
        .filter(|t| seen.insert(identity(t)))
        .collect()
}

/// Row counts before and after cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanSummary {
    pub raw: usize,
    pub clean: usize,
    pub removed: usize,
}

impl CleanSummary {
    pub fn new(raw: usize, clean: usize) -> Self {
        Self {
            raw,
            clean,
            removed: raw.saturating_sub(clean),
        }
    }
}

/// Post hoc checks over a cleaned partition. Diagnostic only: every counter
/// other than `rows` should be zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub rows: usize,
    pub duplicates: usize,
    pub zero_passengers: usize,
    pub zero_miles: usize,
    pub over_max_miles: usize,
    pub over_one_day: usize,
    pub non_positive_duration: usize,
}

impl CleanReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0
            && self.zero_passengers == 0
            && self.zero_miles == 0
            && self.over_max_miles == 0
            && self.over_one_day == 0
            && self.non_positive_duration == 0
    }
}

/// Counts invariant violations in `trips`.
pub fn verify_clean(trips: &[CleanTrip]) -> CleanReport {
    let mut report = CleanReport {
        rows: trips.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();

    for trip in trips {
        if !seen.insert(identity(trip)) {
            report.duplicates += 1;
        }
        if trip.passenger_count == Some(0) {
            report.zero_passengers += 1;
        }
        if trip.trip_distance == 0.0 {
            report.zero_miles += 1;
        }
        if trip.trip_distance > MAX_TRIP_MILES {
            report.over_max_miles += 1;
        }
        let duration = trip.duration();
        if duration > max_trip_duration() {
            report.over_one_day += 1;
        }
        if duration <= TimeDelta::zero() {
            report.non_positive_duration += 1;
        }
    }

    report
}

/// Logs the before/after counts and the verification report for a partition.
pub fn log_clean_results(key: &PartitionKey, summary: &CleanSummary, report: &CleanReport) {
    info!(
        partition = %key,
        raw = summary.raw,
        clean = summary.clean,
        removed = summary.removed,
        "Partition cleaned"
    );
    info!(
        partition = %key,
        rows = report.rows,
        duplicates = report.duplicates,
        zero_passengers = report.zero_passengers,
        zero_miles = report.zero_miles,
        over_max_miles = report.over_max_miles,
        over_one_day = report.over_one_day,
        non_positive_duration = report.non_positive_duration,
        "Clean verification"
    );
}
