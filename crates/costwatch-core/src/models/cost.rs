//! Point-in-time cost data

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Latest known spend for one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    /// Service identifier as produced by cost ingestion
    pub service: String,
    /// Spend for the evaluation window
    pub cost: f64,
}

impl CostEntry {
    /// Create a cost entry
    pub fn new(service: impl Into<String>, cost: f64) -> Self {
        Self {
            service: service.into(),
            cost,
        }
    }
}

/// Per-service spend for one evaluation cycle
///
/// Accepts either `[{"service": "EC2", "cost": 150.0}]` or `{"EC2": 150.0}`
/// when deserialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "SnapshotRepr")]
pub struct CostSnapshot {
    entries: Vec<CostEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotRepr {
    List(Vec<CostEntry>),
    Map(BTreeMap<String, f64>),
    Wrapped { entries: Vec<CostEntry> },
}

impl From<SnapshotRepr> for CostSnapshot {
    fn from(repr: SnapshotRepr) -> Self {
        match repr {
            SnapshotRepr::List(entries) | SnapshotRepr::Wrapped { entries } => Self { entries },
            SnapshotRepr::Map(map) => map
                .into_iter()
                .map(|(service, cost)| CostEntry { service, cost })
                .collect(),
        }
    }
}

impl CostSnapshot {
    /// Create a snapshot from entries
    pub fn new(entries: Vec<CostEntry>) -> Self {
        Self { entries }
    }

    /// All entries in input order
    pub fn entries(&self) -> &[CostEntry] {
        &self.entries
    }

    /// Whether the snapshot has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Cost of the first entry accepted by `matches`
    pub fn find_cost(&self, mut matches: impl FnMut(&str) -> bool) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| matches(&entry.service))
            .map(|entry| entry.cost)
    }

    /// Sum of every entry
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|entry| entry.cost).sum()
    }

    /// Reject entries no threshold can be compared against
    ///
    /// Negative costs are allowed; credits and refunds produce them.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.entries {
            if entry.service.trim().is_empty() {
                return Err(Error::invalid_snapshot("entry with empty service name"));
            }
            if !entry.cost.is_finite() {
                return Err(Error::invalid_snapshot(format!(
                    "cost for {} is not a finite number",
                    entry.service
                )));
            }
        }
        Ok(())
    }
}

impl FromIterator<CostEntry> for CostSnapshot {
    fn from_iter<I: IntoIterator<Item = CostEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for CostSnapshot {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(service, cost)| CostEntry::new(service, cost))
            .collect()
    }
}
