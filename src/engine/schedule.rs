// src/engine/schedule.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::time::{Duration, Instant};

use crate::engine::timers::TimerId;
use crate::types::{
    AccountId, ActivationOptions, DEFAULT_CACHE_INTERVAL_SECS, MAX_INTERVAL_MINUTES,
    ModuleIntervals, ModuleType,
};

/// Everything the orchestrator remembers about one active account.
///
/// A schedule exists exactly while the account is active; its timers live in
/// the core's [`TimerWheel`](crate::engine::timers::TimerWheel) and are torn
/// down together with it.
#[derive(Debug, Clone)]
pub struct AccountSchedule {
    pub account_id: AccountId,
    pub email: String,
    pub intervals: ModuleIntervals,
    pub smart_mode: bool,
    pub cache_interval: Duration,
    /// Live timer handles per module (only modules with interval > 0).
    pub timers: BTreeMap<ModuleType, TimerId>,
    /// Last time a task for the module was dispatched to the executor.
    pub last_run: BTreeMap<ModuleType, DateTime<Utc>>,
    /// Last time smart mode enqueued the module (suppression window start).
    pub last_smart_enqueue: BTreeMap<ModuleType, Instant>,
    /// Last time smart mode evaluated this account at all.
    pub last_smart_check: Option<Instant>,
}

impl AccountSchedule {
    pub fn new(account_id: AccountId, email: String, options: &ActivationOptions) -> Self {
        Self {
            account_id,
            email,
            intervals: options.intervals,
            smart_mode: options.smart_mode,
            cache_interval: Duration::from_secs(match options.cache_interval_secs {
                0 => DEFAULT_CACHE_INTERVAL_SECS,
                secs => secs,
            }),
            timers: BTreeMap::new(),
            last_run: BTreeMap::new(),
            last_smart_enqueue: BTreeMap::new(),
            last_smart_check: None,
        }
    }

    /// Interval for `module` as a timer period; `None` when disabled.
    ///
    /// Capped at [`MAX_INTERVAL_MINUTES`].
    pub fn period_of(&self, module: ModuleType) -> Option<Duration> {
        match self.intervals.minutes(module) {
            0 => None,
            mins => Some(Duration::from_secs(mins.min(MAX_INTERVAL_MINUTES) * 60)),
        }
    }

    /// True when the account's cache interval has elapsed since its last
    /// smart check (or it was never checked).
    pub fn smart_check_due(&self, now: Instant) -> bool {
        match self.last_smart_check {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cache_interval,
        }
    }

    /// True when smart mode may enqueue `module` again.
    pub fn smart_enqueue_allowed(&self, module: ModuleType, now: Instant, window: Duration) -> bool {
        match self.last_smart_enqueue.get(&module) {
            None => true,
            Some(last) => now.saturating_duration_since(*last) >= window,
        }
    }
}
