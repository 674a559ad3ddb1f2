use std::collections::BTreeMap;

use crate::analysis::types::{Bucket, BucketEntry, BucketStats, BucketValue, Extremes, Statistic};
use crate::analysis::utility::first_extreme;
use crate::trip::{EnrichedTrip, YearMonth};

/// Sums CO₂ and counts trips per bucket, skipping rows with no bucket or no
/// CO₂ value.
fn accumulate<'a>(
    rows: impl IntoIterator<Item = &'a EnrichedTrip>,
    bucket: Bucket,
) -> BTreeMap<BucketValue, (f64, usize)> {
    let mut acc: BTreeMap<BucketValue, (f64, usize)> = BTreeMap::new();

    for row in rows {
        let (Some(value), Some(co2)) = (bucket.key(row), row.trip_co2_kg) else {
            continue;
        };
        let slot = acc.entry(value).or_default();
        slot.0 += co2;
        slot.1 += 1;
    }

    acc
}

/// Mean CO₂ per trip for every bucket that has at least one trip.
pub fn bucketed_average<'a>(rows: impl IntoIterator<Item = &'a EnrichedTrip>, bucket: Bucket) -> BucketStats {
    let entries = accumulate(rows, bucket)
        .into_iter()
        .map(|(value, (sum, trips))| BucketEntry {
            value,
            co2_kg: sum / trips as f64,
            trips,
        })
        .collect();

    BucketStats {
        bucket,
        statistic: Statistic::Average,
        entries,
    }
}

/// Total CO₂ for every bucket that has at least one trip.
pub fn bucketed_total<'a>(rows: impl IntoIterator<Item = &'a EnrichedTrip>, bucket: Bucket) -> BucketStats {
    let entries = accumulate(rows, bucket)
        .into_iter()
        .map(|(value, (sum, trips))| BucketEntry {
            value,
            co2_kg: sum,
            trips,
        })
        .collect();

    BucketStats {
        bucket,
        statistic: Statistic::Total,
        entries,
    }
}

/// Inserts a zero entry for each of `values` missing from `stats`.
fn zero_fill(mut stats: BucketStats, values: impl IntoIterator<Item = BucketValue>) -> BucketStats {
    let mut filled: BTreeMap<BucketValue, BucketEntry> =
        stats.entries.drain(..).map(|e| (e.value, e)).collect();

    for value in values {
        filled.entry(value).or_insert(BucketEntry {
            value,
            co2_kg: 0.0,
            trips: 0,
        });
    }

    stats.entries = filled.into_values().collect();
    stats
}

/// Total CO₂ per calendar month (1–12), with all twelve months present.
/// Months without trips total 0.0.
pub fn monthly_totals<'a>(rows: impl IntoIterator<Item = &'a EnrichedTrip>) -> BucketStats {
    zero_fill(
        bucketed_total(rows, Bucket::MonthOfYear),
        (1..=12).map(BucketValue::Index),
    )
}

/// Total CO₂ per absolute year-month.
///
/// With `fill_gaps`, every month between the first and last observed
/// year-month is present, at 0.0 when it had no trips.
pub fn year_month_totals<'a>(
    rows: impl IntoIterator<Item = &'a EnrichedTrip>,
    fill_gaps: bool,
) -> BucketStats {
    let stats = bucketed_total(rows, Bucket::YearMonth);
    if !fill_gaps {
        return stats;
    }

    let bounds = match (stats.entries.first(), stats.entries.last()) {
        (Some(first), Some(last)) => Some((first.value, last.value)),
        _ => None,
    };
    let Some((BucketValue::YearMonth(first), BucketValue::YearMonth(last))) = bounds else {
        return stats;
    };

    let months = std::iter::successors(Some(first), |ym: &YearMonth| Some(ym.succ()))
        .take_while(move |ym| *ym <= last)
        .map(BucketValue::YearMonth);
    zero_fill(stats, months)
}

/// The buckets with the lowest and highest statistic. Ties go to the lower
/// bucket value. `None` when `stats` is empty.
pub fn extremes(stats: &BucketStats) -> Option<Extremes> {
    let lightest = first_extreme(stats.entries.iter(), |e| e.co2_kg, |a, b| a < b)?;
    let heaviest = first_extreme(stats.entries.iter(), |e| e.co2_kg, |a, b| a > b)?;

    Some(Extremes {
        lightest: *lightest,
        heaviest: *heaviest,
    })
}

/// The trip with the most CO₂. Ties go to the first such trip in row order.
pub fn heaviest_trip<'a>(rows: impl IntoIterator<Item = &'a EnrichedTrip>) -> Option<&'a EnrichedTrip> {
    first_extreme(
        rows.into_iter().filter(|r| r.trip_co2_kg.is_some()),
        |r| r.trip_co2_kg.unwrap_or(f64::NEG_INFINITY),
        |a, b| a > b,
    )
}

/// The trip with the least CO₂. Ties go to the first such trip in row order.
pub fn lightest_trip<'a>(rows: impl IntoIterator<Item = &'a EnrichedTrip>) -> Option<&'a EnrichedTrip> {
    first_extreme(
        rows.into_iter().filter(|r| r.trip_co2_kg.is_some()),
        |r| r.trip_co2_kg.unwrap_or(f64::INFINITY),
        |a, b| a < b,
    )
}
