// src/engine/timers.rs

//! Deadline-ordered timer wheel.
//!
//! Every recurring module trigger and every one-shot smart-mode kickoff lives
//! here as a single entry keyed by [`TimerKey`]. The async shell only ever
//! sleeps until [`TimerWheel::next_deadline`], so there is exactly one timer
//! to tear down no matter how many accounts are active.

use std::collections::{BTreeMap, HashMap};

use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::types::{AccountId, ModuleType};

/// Handle identifying one scheduled entry. Stored in the account schedule so
/// the schedule can tell which of its timers are live.
pub type TimerId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    /// Fixed-interval trigger for one module of one account.
    Module {
        account_id: AccountId,
        module: ModuleType,
    },
    /// One-shot smart-mode check shortly after activation.
    SmartKickoff { account_id: AccountId },
}

impl TimerKey {
    pub fn account_id(&self) -> &str {
        match self {
            TimerKey::Module { account_id, .. } => account_id,
            TimerKey::SmartKickoff { account_id } => account_id,
        }
    }
}

#[derive(Debug, Clone)]
struct TimerEntry {
    key: TimerKey,
    /// `Some` for recurring entries.
    period: Option<Duration>,
}

/// A timer that came due, as reported by [`TimerWheel::pop_due`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTimer {
    pub key: TimerKey,
    pub deadline: Instant,
}

#[derive(Debug, Default)]
pub struct TimerWheel {
    /// Ordered by deadline, ties broken by registration order.
    by_deadline: BTreeMap<(Instant, TimerId), TimerEntry>,
    by_key: HashMap<TimerKey, (Instant, TimerId)>,
    next_id: TimerId,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn contains(&self, key: &TimerKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Register a recurring timer firing every `period`, first at `now + period`.
    ///
    /// Replaces any existing entry with the same key. Returns `None` (and
    /// registers nothing) when the first deadline is not representable.
    pub fn schedule_every(
        &mut self,
        key: TimerKey,
        period: Duration,
        now: Instant,
    ) -> Option<TimerId> {
        let Some(deadline) = now.checked_add(period) else {
            warn!(?key, ?period, "timer period out of range; not scheduled");
            self.cancel(&key);
            return None;
        };
        Some(self.insert(key, deadline, Some(period)))
    }

    /// Register a one-shot timer at `deadline`.
    pub fn schedule_once(&mut self, key: TimerKey, deadline: Instant) -> TimerId {
        self.insert(key, deadline, None)
    }

    fn insert(&mut self, key: TimerKey, deadline: Instant, period: Option<Duration>) -> TimerId {
        self.cancel(&key);

        let id = self.next_id;
        self.next_id += 1;

        debug!(?key, timer_id = id, ?period, "timer registered");
        self.by_key.insert(key.clone(), (deadline, id));
        self.by_deadline.insert((deadline, id), TimerEntry { key, period });
        id
    }

    /// Remove the entry for `key`; returns `true` if one existed.
    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        match self.by_key.remove(key) {
            Some(slot) => {
                self.by_deadline.remove(&slot);
                true
            }
            None => false,
        }
    }

    /// Remove every entry belonging to `account_id`; returns how many.
    pub fn cancel_account(&mut self, account_id: &str) -> usize {
        let keys: Vec<TimerKey> = self
            .by_key
            .keys()
            .filter(|k| k.account_id() == account_id)
            .cloned()
            .collect();

        for key in &keys {
            self.cancel(key);
        }
        keys.len()
    }

    pub fn clear(&mut self) {
        self.by_deadline.clear();
        self.by_key.clear();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.by_deadline.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pop every entry due at or before `now`, in deadline order.
    ///
    /// Recurring entries are re-armed at `deadline + period` (not `now +
    /// period`) so a late wake-up does not shift the cadence. If the loop was
    /// asleep across several periods, the entry fires once per missed period;
    /// callers rely on queue dedup to collapse those.
    pub fn pop_due(&mut self, now: Instant) -> Vec<FiredTimer> {
        let mut fired = Vec::new();

        while let Some((&(deadline, id), _)) = self.by_deadline.first_key_value() {
            if deadline > now {
                break;
            }

            let Some(entry) = self.by_deadline.remove(&(deadline, id)) else {
                break;
            };

            match entry.period.and_then(|period| deadline.checked_add(period)) {
                Some(next) => {
                    self.by_key.insert(entry.key.clone(), (next, id));
                    self.by_deadline.insert((next, id), entry.clone());
                }
                None => {
                    self.by_key.remove(&entry.key);
                }
            }

            fired.push(FiredTimer {
                key: entry.key,
                deadline,
            });
        }

        fired
    }
}
