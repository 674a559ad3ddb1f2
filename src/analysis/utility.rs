/// Computes the arithmetic mean of a slice of values. Returns `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Returns the first item whose score beats every earlier one under `better`.
///
/// With a strict comparison, ties resolve to the earliest item.
pub fn first_extreme<T, I, F>(items: I, score: impl Fn(&T) -> f64, better: F) -> Option<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(f64, f64) -> bool,
{
    items.into_iter().fold(None, |best, item| match best {
        Some(b) if !better(score(&item), score(&b)) => Some(b),
        _ => Some(item),
    })
}
