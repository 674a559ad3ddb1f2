use crate::analysis::types::{Bucket, BucketValue};

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Short weekday name for a `day_of_week` value (0 = Sunday).
pub fn day_name(day: u32) -> &'static str {
    DAY_NAMES.get(day as usize).copied().unwrap_or("?")
}

/// Short month name for a `month_of_year` value (1 = January).
pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i as usize))
        .copied()
        .unwrap_or("?")
}

/// Converts a stored 0–23 hour into the 1–24 form used in reports.
pub fn report_hour(hour: u32) -> u32 {
    hour % 24 + 1
}

/// Human-readable label for a bucket value.
///
/// | Bucket        | Stored  | Label        |
/// |---------------|---------|--------------|
/// | hour_of_day   | 0–23    | 1–24         |
/// | day_of_week   | 0–6     | Sun–Sat      |
/// | week_of_year  | 1–53    | 1–53         |
/// | month_of_year | 1–12    | Jan–Dec      |
/// | year_month    | YYYY-MM | YYYY-MM      |
pub fn bucket_label(bucket: Bucket, value: BucketValue) -> String {
    match (bucket, value) {
        (Bucket::HourOfDay, BucketValue::Index(h)) => report_hour(h).to_string(),
        (Bucket::DayOfWeek, BucketValue::Index(d)) => day_name(d).to_string(),
        (Bucket::MonthOfYear, BucketValue::Index(m)) => month_name(m).to_string(),
        (_, v) => v.to_string(),
    }
}
