// src/engine/status.rs

//! Read-only status snapshot exposed to dashboards and the CLI.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::stats::ModuleStats;
use crate::types::{AccountId, ModuleIntervals, ModuleType, Task};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStatus {
    pub is_running: bool,
    pub is_processing: bool,
    pub current_task: Option<Task>,
    pub queue_length: usize,
    pub queue: Vec<Task>,
    /// Ascending account id order.
    pub active_accounts: Vec<AccountStatus>,
}

impl OrchestratorStatus {
    pub fn account(&self, account_id: &str) -> Option<&AccountStatus> {
        self.active_accounts
            .iter()
            .find(|a| a.account_id == account_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    pub account_id: AccountId,
    pub email: String,
    pub intervals: ModuleIntervals,
    pub smart_mode: bool,
    pub last_run: BTreeMap<ModuleType, DateTime<Utc>>,
    /// Always holds all three module types.
    pub stats: BTreeMap<ModuleType, ModuleStats>,
}
