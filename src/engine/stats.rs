// src/engine/stats.rs

//! Per-account, per-module run counters.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{AccountId, ModuleType};

/// Counters for one `(account, module)` pair.
///
/// Counters only ever grow; they are reset by process restart and nothing
/// else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStats {
    pub success: u64,
    pub error: u64,
    /// Runs skipped because the feature is locked; neither success nor error.
    pub skipped: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    pub last_skipped: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct StatsTracker {
    stats: HashMap<(AccountId, ModuleType), ModuleStats>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            stats: HashMap::new(),
        }
    }

    fn entry(&mut self, account_id: &str, module: ModuleType) -> &mut ModuleStats {
        self.stats
            .entry((account_id.to_string(), module))
            .or_default()
    }

    pub fn record_success(&mut self, account_id: &str, module: ModuleType, at: DateTime<Utc>) {
        let stats = self.entry(account_id, module);
        stats.success += 1;
        stats.last_success = Some(at);
    }

    pub fn record_error(&mut self, account_id: &str, module: ModuleType, at: DateTime<Utc>) {
        let stats = self.entry(account_id, module);
        stats.error += 1;
        stats.last_error = Some(at);
    }

    pub fn record_skipped(&mut self, account_id: &str, module: ModuleType, at: DateTime<Utc>) {
        let stats = self.entry(account_id, module);
        stats.skipped += 1;
        stats.last_skipped = Some(at);
    }

    /// Counters for one pair; zeroes if it was never touched.
    pub fn get(&self, account_id: &str, module: ModuleType) -> ModuleStats {
        self.stats
            .get(&(account_id.to_string(), module))
            .copied()
            .unwrap_or_default()
    }

    /// Snapshot of all three modules for one account.
    pub fn snapshot_for(&self, account_id: &str) -> BTreeMap<ModuleType, ModuleStats> {
        ModuleType::ALL
            .into_iter()
            .map(|m| (m, self.get(account_id, m)))
            .collect()
    }
}
