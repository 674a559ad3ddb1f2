//! Emission enricher: applies a per-cab CO₂ factor to clean trips and derives
//! the time buckets used by the analysis stage.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::schema::{EMISSION_FACTOR_COLUMNS, column_index, verify_headers};
use crate::trip::{CabType, CleanTrip, EnrichedTrip, PartitionKey};

#[derive(Debug, Clone, PartialEq)]
struct FactorRow {
    taxi_type: Option<String>,
    co2_grams_per_mile: f64,
}

/// Vehicle emission factors, optionally keyed by taxi type.
///
/// Stored as CSV with a `co2_grams_per_mile` column and an optional
/// `taxi_type` column:
/// ```text
/// taxi_type,co2_grams_per_mile
/// yellow,404.0
/// green,380.5
/// ```
/// Without `taxi_type`, the table must hold a single default factor.
#[derive(Debug, Clone)]
pub struct EmissionFactors {
    rows: Vec<FactorRow>,
    keyed: bool,
}

impl EmissionFactors {
    /// Loads the table from a CSV file at `path`.
    ///
    /// # Errors
    ///
    /// A missing file is [`PipelineError::MissingEmissionFactors`]; a missing
    /// `co2_grams_per_mile` column is a schema mismatch. Both are fatal.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingEmissionFactors {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let artifact = path.display().to_string();
        let mut rdr = csv::Reader::from_reader(file);

        let headers = rdr.headers()?.clone();
        verify_headers(&artifact, &headers, EMISSION_FACTOR_COLUMNS)?;
        let co2_idx = column_index(&headers, "co2_grams_per_mile").unwrap_or_default();
        let type_idx = column_index(&headers, "taxi_type");

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            let raw = record.get(co2_idx).unwrap_or("").trim();
            let co2_grams_per_mile = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| PipelineError::InvalidRecord {
                    artifact: artifact.clone(),
                    row: i as u64 + 1,
                    message: format!("co2_grams_per_mile '{raw}' is not a number"),
                })?;
            let taxi_type = type_idx
                .and_then(|idx| record.get(idx))
                .map(|s| s.trim().to_string());
            rows.push(FactorRow {
                taxi_type,
                co2_grams_per_mile,
            });
        }

        info!(path = %artifact, rows = rows.len(), keyed = type_idx.is_some(), "Emission factors loaded");
        Ok(Self {
            rows,
            keyed: type_idx.is_some(),
        })
    }

    /// A table with a single default factor for every cab type.
    pub fn uniform(co2_grams_per_mile: f64) -> Self {
        Self {
            rows: vec![FactorRow {
                taxi_type: None,
                co2_grams_per_mile,
            }],
            keyed: false,
        }
    }

    /// A table keyed by cab type.
    pub fn per_cab(factors: &[(CabType, f64)]) -> Self {
        Self {
            rows: factors
                .iter()
                .map(|(cab, v)| FactorRow {
                    taxi_type: Some(cab.to_string()),
                    co2_grams_per_mile: *v,
                })
                .collect(),
            keyed: true,
        }
    }

    /// Resolves the single factor that applies to `cab`.
    ///
    /// Rows repeating the same value are not ambiguous.
    pub fn resolve(&self, cab: CabType) -> Result<f64> {
        let distinct: BTreeSet<u64> = self
            .rows
            .iter()
            .filter(|r| {
                !self.keyed
                    || r.taxi_type
                        .as_deref()
                        .is_some_and(|t| t.eq_ignore_ascii_case(cab.as_str()))
            })
            .map(|r| r.co2_grams_per_mile.to_bits())
            .collect();

        if distinct.len() > 1 {
            return Err(PipelineError::AmbiguousFactor {
                cab,
                rows: distinct.len(),
            });
        }
        distinct
            .first()
            .map(|bits| f64::from_bits(*bits))
            .ok_or(PipelineError::NoFactorForCab { cab })
    }
}

/// Enriches one clean partition.
///
/// The factor is resolved once for the whole partition. Every input row maps
/// to exactly one output row, in the same order.
#[tracing::instrument(skip(key, trips, factors), fields(partition = %key, rows = trips.len()))]
pub fn enrich_partition(
    key: PartitionKey,
    trips: &[CleanTrip],
    factors: &EmissionFactors,
) -> Result<Vec<EnrichedTrip>> {
    let co2_grams_per_mile = factors
        .resolve(key.cab)
        .map_err(|e| e.in_stage("transform", key))?;

    let enriched: Vec<EnrichedTrip> = trips
        .iter()
        .map(|t| EnrichedTrip::derive(t, co2_grams_per_mile))
        .collect();

    for sample in enriched.iter().take(3) {
        debug!(
            trip_distance = sample.trip_distance,
            trip_co2_kg = ?sample.trip_co2_kg,
            avg_speed_mph = ?sample.avg_speed_mph,
            hour_of_day = sample.hour_of_day,
            day_of_week = sample.day_of_week,
            week_of_year = sample.week_of_year,
            month_of_year = sample.month_of_year,
            "Enriched sample"
        );
    }
    info!(rows = enriched.len(), co2_grams_per_mile, "Partition enriched");

    Ok(enriched)
}
