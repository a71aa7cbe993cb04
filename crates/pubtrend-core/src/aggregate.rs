//! Month × category counting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::categories::{SetMapping, parent_of};
use crate::identifier::parse_year_month;
use crate::models::{CountRow, HeaderRecord, YearMonth};
use crate::sync::SyncWindow;

/// Counts keyed by month, then category id.
///
/// Serializes as a JSON object with `"YYYY:MM"` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Buckets(BTreeMap<YearMonth, BTreeMap<String, u64>>);

impl Buckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, month: YearMonth, category_id: &str, by: u64) {
        *self
            .0
            .entry(month)
            .or_default()
            .entry(category_id.to_string())
            .or_default() += by;
    }

    pub fn get(&self, month: YearMonth, category_id: &str) -> u64 {
        self.0
            .get(&month)
            .and_then(|cats| cats.get(category_id))
            .copied()
            .unwrap_or(0)
    }

    /// Merges `other` in, replacing any `(month, category)` already present.
    ///
    /// Re-running a set after a resume therefore replaces its earlier
    /// counts instead of adding to them.
    pub fn merge_overwrite(&mut self, other: Buckets) {
        for (month, cats) in other.0 {
            let slot = self.0.entry(month).or_default();
            for (category_id, count) in cats {
                slot.insert(category_id, count);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Number of `(month, category)` cells.
    pub fn cell_count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// Sum of every cell.
    pub fn total(&self) -> u64 {
        self.0.values().flat_map(BTreeMap::values).sum()
    }

    pub fn months(&self) -> impl Iterator<Item = &YearMonth> {
        self.0.keys()
    }

    /// Flattens into store rows, ordered by month then category.
    pub fn to_rows(&self) -> Vec<CountRow> {
        self.0
            .iter()
            .flat_map(|(month, cats)| {
                cats.iter().map(move |(category_id, &count)| CountRow {
                    category_id: category_id.clone(),
                    year: month.year(),
                    month: month.month(),
                    count,
                })
            })
            .collect()
    }
}

/// Bookkeeping for one aggregation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregateStats {
    /// Category increments made.
    pub counted: u64,
    /// Records whose identifier carries no `YYMM` fragment.
    pub unparsed: usize,
    /// Records whose month falls outside the window.
    pub out_of_window: usize,
    /// Records with no tracked category under the walked set.
    pub untracked: usize,
}

impl AggregateStats {
    /// Records that did not contribute to any count.
    pub fn skipped(&self) -> usize {
        self.unparsed + self.out_of_window + self.untracked
    }
}

/// Buckets the records of one top-level set.
///
/// The month comes from the identifier, not the datestamp. Only set specs
/// under `parent` are counted: a record cross-listed in `cs:cs:AI` and
/// `stat:stat:ML` is seen by both the `cs` and `stat` walks, and each walk
/// counts only its own half.
pub fn aggregate_records(
    records: &[HeaderRecord],
    parent: &str,
    mapping: &SetMapping,
    window: &SyncWindow,
) -> (Buckets, AggregateStats) {
    let mut buckets = Buckets::new();
    let mut stats = AggregateStats::default();

    for record in records {
        let Some(month) = parse_year_month(&record.identifier) else {
            stats.unparsed += 1;
            continue;
        };
        if !window.contains(month) {
            stats.out_of_window += 1;
            continue;
        }

        let mut seen: Vec<&str> = Vec::new();
        for spec in &record.set_specs {
            if parent_of(spec) != parent {
                continue;
            }
            let Some(category_id) = mapping.category(spec) else {
                continue;
            };
            if seen.contains(&category_id) {
                continue;
            }
            seen.push(category_id);
            buckets.increment(month, category_id, 1);
            stats.counted += 1;
        }

        if seen.is_empty() {
            stats.untracked += 1;
        }
    }

    (buckets, stats)
}
