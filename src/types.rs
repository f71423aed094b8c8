// src/types.rs

//! Value types shared by the engine, the collaborator traits and the config
//! layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account identifier as used by the account directory and session provider.
pub type AccountId = String;

/// Monotonically increasing task identifier.
pub type TaskId = u64;

/// The automation cycles an account can run.
///
/// The declaration order is the iteration order used whenever several modules
/// are considered in the same tick (Farm, then Forestry, then Stalls).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    Farm,
    Forestry,
    Stalls,
}

impl ModuleType {
    pub const ALL: [ModuleType; 3] = [ModuleType::Farm, ModuleType::Forestry, ModuleType::Stalls];

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleType::Farm => "farm",
            ModuleType::Forestry => "forestry",
            ModuleType::Stalls => "stalls",
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "farm" => Ok(ModuleType::Farm),
            "forestry" => Ok(ModuleType::Forestry),
            "stalls" => Ok(ModuleType::Stalls),
            other => Err(format!(
                "invalid module type: {other} (expected \"farm\", \"forestry\" or \"stalls\")"
            )),
        }
    }
}

/// A unit of pending work: run `module` for `account_id` once.
///
/// Tasks are immutable; they are created by a trigger and consumed when
/// dequeued, whatever the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub account_id: AccountId,
    pub module: ModuleType,
    pub created_at: DateTime<Utc>,
}

/// Per-module interval settings in minutes; `0` disables the module's timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleIntervals {
    pub farm: u64,
    pub forestry: u64,
    pub stalls: u64,
}

impl ModuleIntervals {
    pub fn minutes(&self, module: ModuleType) -> u64 {
        match module {
            ModuleType::Farm => self.farm,
            ModuleType::Forestry => self.forestry,
            ModuleType::Stalls => self.stalls,
        }
    }

    /// Modules with a non-zero interval, in iteration order.
    pub fn enabled(&self) -> impl Iterator<Item = ModuleType> + '_ {
        ModuleType::ALL
            .into_iter()
            .filter(|m| self.minutes(*m) > 0)
    }
}

/// Default seconds between two smart-mode checks of the same account.
pub const DEFAULT_CACHE_INTERVAL_SECS: u64 = 60;

/// Longest module interval the scheduler accepts (one week). Larger values
/// are rejected by config validation and clamped on activation.
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Options passed to `activate_account`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationOptions {
    pub intervals: ModuleIntervals,
    pub smart_mode: bool,
    /// Minimum seconds between two smart-mode checks of this account.
    pub cache_interval_secs: u64,
}

impl Default for ActivationOptions {
    fn default() -> Self {
        Self {
            intervals: ModuleIntervals::default(),
            smart_mode: false,
            cache_interval_secs: DEFAULT_CACHE_INTERVAL_SECS,
        }
    }
}

impl ActivationOptions {
    pub fn with_interval(mut self, module: ModuleType, minutes: u64) -> Self {
        match module {
            ModuleType::Farm => self.intervals.farm = minutes,
            ModuleType::Forestry => self.intervals.forestry = minutes,
            ModuleType::Stalls => self.intervals.stalls = minutes,
        }
        self
    }

    pub fn with_smart_mode(mut self, enabled: bool) -> Self {
        self.smart_mode = enabled;
        self
    }

    pub fn with_cache_interval_secs(mut self, secs: u64) -> Self {
        self.cache_interval_secs = secs;
        self
    }
}
