//! Partition consolidator: unions per-(cab, year) partitions into logical views.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

use crate::trip::{CabType, PartitionKey};

/// Which partitions a logical view covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ViewScope {
    Cab(CabType),
    AllCabs,
}

impl ViewScope {
    /// Every scope the pipeline builds: one per cab type, then all cabs.
    pub fn all() -> Vec<ViewScope> {
        CabType::ALL
            .iter()
            .copied()
            .map(ViewScope::Cab)
            .chain(std::iter::once(ViewScope::AllCabs))
            .collect()
    }

    pub fn includes(&self, key: &PartitionKey) -> bool {
        match self {
            ViewScope::Cab(cab) => key.cab == *cab,
            ViewScope::AllCabs => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewScope::Cab(cab) => cab.as_str(),
            ViewScope::AllCabs => "all",
        }
    }
}

impl fmt::Display for ViewScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The union of every available partition within a scope. Rows are borrowed
/// from the partitions, never copied.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalView<'a, T> {
    pub scope: ViewScope,
    pub partitions: Vec<PartitionKey>,
    slices: Vec<&'a [T]>,
}

impl<'a, T> LogicalView<'a, T> {
    /// Rows in partition-key order.
    pub fn rows(&self) -> impl Iterator<Item = &'a T> + '_ {
        self.slices.iter().copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.slices.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Concatenates the partitions in `scope`, in the order `partitions` yields
/// them (key order for a `BTreeMap`).
///
/// Returns `None` when no partition falls within the scope. A view built
/// from partitions that are themselves empty is `Some` with no rows.
pub fn consolidate<'a, T: 'a>(
    partitions: impl IntoIterator<Item = (&'a PartitionKey, &'a Vec<T>)>,
    scope: ViewScope,
) -> Option<LogicalView<'a, T>> {
    let (keys, slices): (Vec<PartitionKey>, Vec<&'a [T]>) = partitions
        .into_iter()
        .filter(|(k, _)| scope.includes(k))
        .map(|(k, rows)| (*k, rows.as_slice()))
        .unzip();

    if keys.is_empty() {
        info!(view = %scope, "No partitions to union");
        return None;
    }

    let view = LogicalView {
        scope,
        partitions: keys,
        slices,
    };
    info!(view = %scope, partitions = view.partitions.len(), rows = view.len(), "View consolidated");
    Some(view)
}

/// Builds every view in [`ViewScope::all`], skipping those with no partitions.
pub fn consolidate_all<'a, T: 'a, I>(partitions: I) -> BTreeMap<ViewScope, LogicalView<'a, T>>
where
    I: IntoIterator<Item = (&'a PartitionKey, &'a Vec<T>)> + Clone,
{
    ViewScope::all()
        .into_iter()
        .filter_map(|scope| consolidate(partitions.clone(), scope).map(|v| (scope, v)))
        .collect()
}
