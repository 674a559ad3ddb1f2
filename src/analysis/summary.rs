//! Per-view report handed to the reporting layer.

use serde::Serialize;
use tracing::info;

use crate::analysis::aggregate::{
    bucketed_average, extremes, heaviest_trip, lightest_trip, monthly_totals, year_month_totals,
};
use crate::analysis::labels::bucket_label;
use crate::analysis::types::{Bucket, BucketEntry, BucketStats};
use crate::analysis::utility::mean;
use crate::consolidate::{LogicalView, ViewScope};
use crate::trip::{EnrichedTrip, PartitionKey};

/// The identifying fields of a single trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripHighlight {
    pub co2_kg: f64,
    pub trip_distance: f64,
    pub pickup_datetime: String,
    pub dropoff_datetime: String,
    pub cab_type: String,
    pub vendor_id: Option<i32>,
}

impl TripHighlight {
    fn from_trip(trip: &EnrichedTrip) -> Option<Self> {
        Some(Self {
            co2_kg: trip.trip_co2_kg?,
            trip_distance: trip.trip_distance,
            pickup_datetime: trip.pickup_datetime.to_string(),
            dropoff_datetime: trip.dropoff_datetime.to_string(),
            cab_type: trip.cab_type.to_string(),
            vendor_id: trip.vendor_id,
        })
    }
}

/// A labelled bucket with its average CO₂ per trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledBucket {
    pub label: String,
    pub avg_co2_kg: f64,
    pub trips: usize,
}

/// Lightest and heaviest bucket by average CO₂ per trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodExtremes {
    pub bucket: Bucket,
    pub lightest: LabeledBucket,
    pub heaviest: LabeledBucket,
}

impl PeriodExtremes {
    fn from_stats(stats: &BucketStats) -> Option<Self> {
        let ext = extremes(stats)?;
        let label = |e: &BucketEntry| LabeledBucket {
            label: bucket_label(stats.bucket, e.value),
            avg_co2_kg: e.co2_kg,
            trips: e.trips,
        };
        Some(Self {
            bucket: stats.bucket,
            lightest: label(&ext.lightest),
            heaviest: label(&ext.heaviest),
        })
    }
}

/// One month's total, labelled for plotting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTotal {
    pub label: String,
    pub total_co2_kg: f64,
    pub trips: usize,
}

fn month_totals(stats: &BucketStats) -> Vec<MonthTotal> {
    stats
        .entries
        .iter()
        .map(|e| MonthTotal {
            label: bucket_label(stats.bucket, e.value),
            total_co2_kg: e.co2_kg,
            trips: e.trips,
        })
        .collect()
}

/// Everything reported for one logical view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CabSummary {
    pub scope: ViewScope,
    /// `None` for a multi-year view.
    pub year: Option<i32>,
    pub partitions: Vec<PartitionKey>,
    pub trips: usize,
    pub total_co2_kg: f64,
    pub avg_co2_kg_per_trip: Option<f64>,
    pub heaviest_trip: Option<TripHighlight>,
    pub lightest_trip: Option<TripHighlight>,
    pub periods: Vec<PeriodExtremes>,
    /// Twelve entries, zero-filled.
    pub monthly_totals: Vec<MonthTotal>,
    /// Every month from the first to the last observed, zero-filled.
    pub year_month_totals: Vec<MonthTotal>,
}

impl CabSummary {
    pub fn from_view(view: &LogicalView<'_, EnrichedTrip>, year: Option<i32>) -> Self {
        let co2: Vec<f64> = view.rows().filter_map(|r| r.trip_co2_kg).collect();

        let periods = Bucket::CYCLICAL
            .iter()
            .filter_map(|b| PeriodExtremes::from_stats(&bucketed_average(view.rows(), *b)))
            .collect();

        CabSummary {
            scope: view.scope,
            year,
            partitions: view.partitions.clone(),
            trips: view.len(),
            total_co2_kg: co2.iter().sum(),
            avg_co2_kg_per_trip: mean(&co2),
            heaviest_trip: heaviest_trip(view.rows()).and_then(TripHighlight::from_trip),
            lightest_trip: lightest_trip(view.rows()).and_then(TripHighlight::from_trip),
            periods,
            monthly_totals: month_totals(&monthly_totals(view.rows())),
            year_month_totals: month_totals(&year_month_totals(view.rows(), true)),
        }
    }

    /// `yellow_2024`, `all_all`, ...
    pub fn name(&self) -> String {
        match self.year {
            Some(y) => format!("{}_{}", self.scope, y),
            None => format!("{}_all", self.scope),
        }
    }

    /// Logs the text form of the report.
    pub fn log(&self) {
        let label = self.name().to_uppercase();
        info!(view = %label, trips = self.trips, total_co2_kg = self.total_co2_kg, "Analysis");

        if let Some(top) = &self.heaviest_trip {
            info!(
                view = %label,
                co2_kg = format_args!("{:.3}", top.co2_kg),
                pickup = %top.pickup_datetime,
                dropoff = %top.dropoff_datetime,
                distance_miles = top.trip_distance,
                vendor_id = ?top.vendor_id,
                "Largest single-trip CO₂"
            );
        }

        for p in &self.periods {
            info!(
                view = %label,
                bucket = %p.bucket,
                lightest = %p.lightest.label,
                lightest_avg_co2_kg = format_args!("{:.3}", p.lightest.avg_co2_kg),
                heaviest = %p.heaviest.label,
                heaviest_avg_co2_kg = format_args!("{:.3}", p.heaviest.avg_co2_kg),
                "Lightest/heaviest average CO₂ per trip"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidate::consolidate;
    use crate::trip::CabType;
    use crate::trip::fixtures::{enriched_at, ts};
    use std::collections::BTreeMap;

    fn yellow_2024(rows: Vec<EnrichedTrip>) -> BTreeMap<PartitionKey, Vec<EnrichedTrip>> {
        BTreeMap::from([(PartitionKey::new(CabType::Yellow, 2024), rows)])
    }

    fn summarize(parts: &BTreeMap<PartitionKey, Vec<EnrichedTrip>>, year: Option<i32>) -> CabSummary {
        let view = consolidate(parts, ViewScope::Cab(CabType::Yellow)).unwrap();
        CabSummary::from_view(&view, year)
    }

    #[test]
    fn test_summary_of_small_view() {
        let parts = yellow_2024(vec![
            enriched_at(ts(2024, 1, 7, 0, 0, 0), 2.0),
            enriched_at(ts(2024, 3, 8, 13, 0, 0), 6.0),
        ]);

        let s = summarize(&parts, Some(2024));

        assert_eq!(s.name(), "yellow_2024");
        assert_eq!(s.trips, 2);
        assert_eq!(s.total_co2_kg, 8.0);
        assert_eq!(s.avg_co2_kg_per_trip, Some(4.0));
        assert_eq!(s.heaviest_trip.as_ref().unwrap().co2_kg, 6.0);
        assert_eq!(s.lightest_trip.as_ref().unwrap().co2_kg, 2.0);
        assert_eq!(s.periods.len(), 4);
        assert_eq!(s.monthly_totals.len(), 12);
        assert_eq!(s.monthly_totals[1].label, "Feb");
        assert_eq!(s.monthly_totals[1].total_co2_kg, 0.0);
        assert_eq!(s.year_month_totals.len(), 3);

        let hours = &s.periods[0];
        assert_eq!(hours.bucket, Bucket::HourOfDay);
        // midnight is reported as hour 1
        assert_eq!(hours.lightest.label, "1");
        assert_eq!(hours.heaviest.label, "14");

        let days = &s.periods[1];
        assert_eq!(days.lightest.label, "Sun");
        assert_eq!(days.heaviest.label, "Fri");
    }

    #[test]
    fn test_summary_of_empty_view() {
        let s = summarize(&yellow_2024(vec![]), None);

        assert_eq!(s.name(), "yellow_all");
        assert_eq!(s.trips, 0);
        assert_eq!(s.avg_co2_kg_per_trip, None);
        assert!(s.heaviest_trip.is_none());
        assert!(s.periods.is_empty());
        assert_eq!(s.monthly_totals.len(), 12);
        assert!(s.year_month_totals.is_empty());
        s.log();
    }
}
