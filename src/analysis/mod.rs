//! Aggregation and extremal queries over enriched views.
//!
//! Statistics are grouped by a pickup-time [`Bucket`](types::Bucket).
//! Averages only cover buckets that contain trips; the monthly totals used
//! for plotting are zero-filled so every month appears.

pub mod aggregate;
pub mod labels;
pub mod summary;
pub mod types;
pub mod utility;

pub use aggregate::{
    bucketed_average, bucketed_total, extremes, heaviest_trip, lightest_trip, monthly_totals,
    year_month_totals,
};
pub use summary::CabSummary;
pub use types::{Bucket, BucketEntry, BucketStats, BucketValue, Extremes, Statistic};
