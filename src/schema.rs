//! Column sets for each stored artifact.
//!
//! In memory every stage works on typed rows. Headers are only checked here,
//! when a CSV artifact is read back in.

use csv::StringRecord;

use crate::error::{PipelineError, Result};

/// A required column and the header names accepted for it.
pub type Column = &'static [&'static str];

/// Raw partitions. `cab_type` is optional and filled from the partition key.
pub const RAW_COLUMNS: &[Column] = &[
    &["vendor_id", "VendorID"],
    &[
        "pickup_datetime",
        "tpep_pickup_datetime",
        "lpep_pickup_datetime",
    ],
    &[
        "dropoff_datetime",
        "tpep_dropoff_datetime",
        "lpep_dropoff_datetime",
    ],
    &["passenger_count"],
    &["trip_distance"],
];

pub const CLEAN_COLUMNS: &[Column] = &[
    &["cab_type"],
    &["vendor_id"],
    &["pickup_datetime"],
    &["dropoff_datetime"],
    &["passenger_count"],
    &["trip_distance"],
];

pub const ENRICHED_COLUMNS: &[Column] = &[
    &["cab_type"],
    &["vendor_id"],
    &["pickup_datetime"],
    &["dropoff_datetime"],
    &["passenger_count"],
    &["trip_distance"],
    &["trip_co2_kg"],
    &["avg_speed_mph"],
    &["hour_of_day"],
    &["day_of_week"],
    &["week_of_year"],
    &["month_of_year"],
    &["year_month"],
];

pub const EMISSION_FACTOR_COLUMNS: &[Column] = &[&["co2_grams_per_mile"]];

/// Fails with [`PipelineError::SchemaMismatch`] unless every column in
/// `expected` is present in `headers`. Matching ignores ASCII case.
pub fn verify_headers(artifact: &str, headers: &StringRecord, expected: &[Column]) -> Result<()> {
    let missing: Vec<String> = expected
        .iter()
        .filter(|names| {
            !names
                .iter()
                .any(|name| headers.iter().any(|h| h.trim().eq_ignore_ascii_case(name)))
        })
        .map(|names| names[0].to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::SchemaMismatch {
            artifact: artifact.to_string(),
            missing,
        })
    }
}

/// Position of `name` in `headers`, ignoring ASCII case.
pub fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}
