//! Row-count estimates supplied by the caller

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Approximate row counts keyed by table name
///
/// Names are matched exactly as they appear in the migration. A table with
/// no entry and no default is unknown, which disables impact refinement for
/// that table only. Unknown is never treated as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowEstimate {
    /// Count applied to every table without an explicit entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<u64>,

    /// Explicit per-table counts
    #[serde(default)]
    pub tables: BTreeMap<String, u64>,
}

impl RowEstimate {
    /// An estimate that knows nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// The same count for every table
    pub fn uniform(rows: u64) -> Self {
        Self {
            default: Some(rows),
            tables: BTreeMap::new(),
        }
    }

    /// Add an explicit entry
    pub fn with_table(mut self, table: impl Into<String>, rows: u64) -> Self {
        self.tables.insert(table.into(), rows);
        self
    }

    pub fn insert(&mut self, table: impl Into<String>, rows: u64) {
        self.tables.insert(table.into(), rows);
    }

    /// Row count for `table`, if known
    pub fn rows_for(&self, table: &str) -> Option<u64> {
        self.tables.get(table).copied().or(self.default)
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.tables.is_empty()
    }

    /// Overlay `other` on top of `self`; entries in `other` win
    pub fn merged(mut self, other: &RowEstimate) -> Self {
        if other.default.is_some() {
            self.default = other.default;
        }
        self.tables.extend(other.tables.iter().map(|(k, v)| (k.clone(), *v)));
        self
    }
}

impl FromIterator<(String, u64)> for RowEstimate {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            default: None,
            tables: iter.into_iter().collect(),
        }
    }
}
