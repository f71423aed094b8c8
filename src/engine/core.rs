// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that owns
//! every piece of orchestration state:
//! - the task queue
//! - one [`AccountSchedule`] per active account
//! - the timer wheel holding all module triggers and smart kickoffs
//! - per-module stats
//! - the in-flight guard
//!
//! Every method takes the current time explicitly and returns plain data (new
//! tasks, [`CoreCommand`]s). The async shell
//! ([`Orchestrator`](crate::engine::runtime::Orchestrator)) is responsible for:
//! - sleeping until the next deadline / poll tick
//! - fetching cache snapshots and running tasks through the collaborators
//! - carrying out the returned commands (closing sessions)
//!
//! The core is intended to be extensively tested without any Tokio runtime,
//! channels, sessions or modules.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::cache::GameStatusCache;
use crate::backend::{Account, ModuleReport};
use crate::engine::EngineSettings;
use crate::engine::queue::TaskQueue;
use crate::engine::schedule::AccountSchedule;
use crate::engine::smart;
use crate::engine::stats::StatsTracker;
use crate::engine::status::{AccountStatus, OrchestratorStatus};
use crate::engine::timers::{TimerKey, TimerWheel};
use crate::types::{
    AccountId, ActivationOptions, MAX_INTERVAL_MINUTES, ModuleType, Task, TaskId,
};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Close the account's session (best effort).
    CloseSession(AccountId),
}

/// How a dequeued task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The module ran its full cycle.
    Succeeded(ModuleReport),
    /// The module's feature is locked; nothing ran.
    Skipped(String),
    /// Session, login or module failure.
    Failed(String),
    /// The account record could not be resolved; nothing ran.
    Aborted,
}

/// Report sent back to the core once a task's lifecycle is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task: Task,
    pub outcome: TaskOutcome,
    pub finished_at: DateTime<Utc>,
}

/// Result of [`CoreRuntime::fire_due_timers`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FiredTriggers {
    /// Tasks newly inserted into the queue.
    pub enqueued: Vec<Task>,
    /// Accounts whose smart-mode kickoff came due.
    pub smart_kickoffs: Vec<AccountId>,
}

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio runtime dependency, and does not perform
/// any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    settings: EngineSettings,
    queue: TaskQueue,
    schedules: BTreeMap<AccountId, AccountSchedule>,
    timers: TimerWheel,
    stats: StatsTracker,
    next_task_id: TaskId,
    /// In-flight guard. Stays set through the post-task cooldown.
    processing: bool,
    current: Option<Task>,
    /// Accounts that may hold an open session (a task was dispatched for them).
    session_accounts: BTreeSet<AccountId>,
}

impl CoreRuntime {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            queue: TaskQueue::new(),
            schedules: BTreeMap::new(),
            timers: TimerWheel::new(),
            stats: StatsTracker::new(),
            next_task_id: 1,
            processing: false,
            current: None,
            session_accounts: BTreeSet::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    pub fn timers(&self) -> &TimerWheel {
        &self.timers
    }

    pub fn schedule(&self, account_id: &str) -> Option<&AccountSchedule> {
        self.schedules.get(account_id)
    }

    pub fn is_active(&self, account_id: &str) -> bool {
        self.schedules.contains_key(account_id)
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current.as_ref()
    }

    /// Nothing queued and nothing in flight.
    pub fn is_idle(&self) -> bool {
        !self.processing && self.queue.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Queue a task for `(account_id, module)` unless one is already queued.
    pub fn enqueue(&mut self, account_id: &str, module: ModuleType, wall_now: DateTime<Utc>) -> Option<Task> {
        let task = Task {
            id: self.next_task_id,
            account_id: account_id.to_string(),
            module,
            created_at: wall_now,
        };

        if self.queue.insert_if_absent(task.clone()) {
            self.next_task_id += 1;
            Some(task)
        } else {
            None
        }
    }

    /// Build a fresh schedule for `account`, tearing down any previous one.
    ///
    /// Every enabled module gets one immediate task plus a recurring timer.
    /// Smart mode gets a one-shot kickoff shortly after activation.
    pub fn activate(
        &mut self,
        account: &Account,
        options: ActivationOptions,
        now: Instant,
        wall_now: DateTime<Utc>,
    ) -> Vec<CoreCommand> {
        let mut commands = Vec::new();

        if self.schedules.contains_key(&account.id) {
            debug!(account = %account.id, "account already active; tearing down previous schedule");
            commands.extend(self.deactivate(&account.id));
        }

        let mut schedule = AccountSchedule::new(account.id.clone(), account.email.clone(), &options);

        for module in options.intervals.enabled() {
            let Some(period) = schedule.period_of(module) else {
                continue;
            };

            self.enqueue(&account.id, module, wall_now);

            let key = TimerKey::Module {
                account_id: account.id.clone(),
                module,
            };
            if options.intervals.minutes(module) > MAX_INTERVAL_MINUTES {
                warn!(
                    account = %account.id,
                    %module,
                    minutes = options.intervals.minutes(module),
                    max = MAX_INTERVAL_MINUTES,
                    "interval too large; clamped"
                );
            }
            if let Some(timer_id) = self.timers.schedule_every(key, period, now) {
                schedule.timers.insert(module, timer_id);
            }
        }

        if options.smart_mode {
            let kickoff = now
                .checked_add(self.settings.smart_kickoff_delay)
                .unwrap_or(now);
            self.timers.schedule_once(
                TimerKey::SmartKickoff {
                    account_id: account.id.clone(),
                },
                kickoff,
            );
        }

        info!(
            account = %account.id,
            email = %account.email,
            farm = options.intervals.farm,
            forestry = options.intervals.forestry,
            stalls = options.intervals.stalls,
            smart_mode = options.smart_mode,
            cache_interval_secs = schedule.cache_interval.as_secs(),
            "account activated"
        );

        self.schedules.insert(account.id.clone(), schedule);
        commands
    }

    /// Drop the account's schedule, timers and queued tasks.
    ///
    /// No-op (and no commands) when the account is not active.
    pub fn deactivate(&mut self, account_id: &str) -> Vec<CoreCommand> {
        if self.schedules.remove(account_id).is_none() {
            return Vec::new();
        }

        let timers = self.timers.cancel_account(account_id);
        let removed = self.queue.remove_account(account_id);
        self.session_accounts.remove(account_id);

        info!(account = %account_id, timers, removed, "account deactivated");
        vec![CoreCommand::CloseSession(account_id.to_string())]
    }

    /// Fire every timer due at `now`.
    ///
    /// Module timers enqueue a task for their account; smart kickoffs are
    /// returned so the shell can run a check for those accounts.
    pub fn fire_due_timers(&mut self, now: Instant, wall_now: DateTime<Utc>) -> FiredTriggers {
        let mut fired = FiredTriggers::default();

        for timer in self.timers.pop_due(now) {
            match timer.key {
                TimerKey::Module { account_id, module } => {
                    if !self.schedules.contains_key(&account_id) {
                        continue;
                    }
                    debug!(account = %account_id, %module, "interval elapsed");
                    if let Some(task) = self.enqueue(&account_id, module, wall_now) {
                        fired.enqueued.push(task);
                    }
                }
                TimerKey::SmartKickoff { account_id } => {
                    fired.smart_kickoffs.push(account_id);
                }
            }
        }

        fired
    }

    /// Accounts due for a smart-mode check on this global tick.
    ///
    /// Claims the check (stamps the account's last check time) for every
    /// returned account, in ascending account order.
    pub fn smart_due_accounts(&mut self, now: Instant) -> Vec<AccountId> {
        self.schedules
            .values_mut()
            .filter(|s| s.smart_mode && s.smart_check_due(now))
            .map(|s| {
                s.last_smart_check = Some(now);
                s.account_id.clone()
            })
            .collect()
    }

    /// Claim an out-of-band smart check (the activation kickoff), ignoring
    /// the account's cache interval. Returns `false` if the account is no
    /// longer active or has smart mode off.
    pub fn claim_smart_kickoff(&mut self, account_id: &str, now: Instant) -> bool {
        match self.schedules.get_mut(account_id) {
            Some(s) if s.smart_mode => {
                s.last_smart_check = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Apply a smart-mode evaluation of `cache` for one account.
    ///
    /// Each ready module is enqueued unless smart mode already enqueued it
    /// within the suppression window. Missing or stale snapshots do nothing.
    pub fn apply_smart_check(
        &mut self,
        account_id: &str,
        cache: Option<&GameStatusCache>,
        now: Instant,
        wall_now: DateTime<Utc>,
    ) -> Vec<Task> {
        let ready = smart::ready_modules(cache, wall_now, self.settings.cache_max_age);
        let window = self.settings.smart_suppression;

        let Some(schedule) = self.schedules.get_mut(account_id) else {
            return Vec::new();
        };
        if !schedule.smart_mode {
            return Vec::new();
        }

        let mut to_enqueue = Vec::new();
        for module in ready {
            if schedule.smart_enqueue_allowed(module, now, window) {
                schedule.last_smart_enqueue.insert(module, now);
                to_enqueue.push(module);
            } else {
                debug!(account = %account_id, %module, "smart trigger suppressed");
            }
        }

        let mut enqueued = Vec::new();
        for module in to_enqueue {
            info!(account = %account_id, %module, "smart mode detected work");
            if let Some(task) = self.enqueue(account_id, module, wall_now) {
                enqueued.push(task);
            }
        }
        enqueued
    }

    /// Take the head of the queue for execution.
    ///
    /// Returns `None` while another task holds the in-flight guard or when the
    /// queue is empty.
    pub fn begin_next(&mut self, wall_now: DateTime<Utc>) -> Option<Task> {
        if self.processing {
            return None;
        }

        let task = self.queue.pop_front()?;
        self.processing = true;
        self.current = Some(task.clone());
        self.session_accounts.insert(task.account_id.clone());

        if let Some(schedule) = self.schedules.get_mut(&task.account_id) {
            schedule.last_run.insert(task.module, wall_now);
        }

        debug!(
            account = %task.account_id,
            module = %task.module,
            task_id = task.id,
            remaining = self.queue.len(),
            "task dequeued"
        );
        Some(task)
    }

    /// Record the outcome of the in-flight task.
    ///
    /// Returns `true` when more work is queued; in that case the in-flight
    /// guard stays held until [`end_cooldown`](Self::end_cooldown).
    pub fn finish_task(&mut self, report: &TaskReport) -> bool {
        let task = &report.task;

        match self.current.as_ref() {
            Some(current) if current.id == task.id => {}
            other => warn!(
                task_id = task.id,
                current = ?other.map(|t| t.id),
                "finished task does not match the in-flight task"
            ),
        }

        match &report.outcome {
            TaskOutcome::Succeeded(_) => {
                self.stats
                    .record_success(&task.account_id, task.module, report.finished_at);
            }
            TaskOutcome::Failed(_) => {
                self.stats
                    .record_error(&task.account_id, task.module, report.finished_at);
            }
            TaskOutcome::Skipped(_) => {
                self.stats
                    .record_skipped(&task.account_id, task.module, report.finished_at);
            }
            TaskOutcome::Aborted => {}
        }

        self.current = None;

        let more = !self.queue.is_empty();
        if !more {
            self.processing = false;
        }
        more
    }

    /// Release the in-flight guard after the post-task cooldown.
    pub fn end_cooldown(&mut self) {
        self.processing = false;
    }

    /// Tear everything down: timers, queue and schedules.
    ///
    /// Returns a close command for every account that is active or had a
    /// task dispatched since the last teardown. Stats survive.
    pub fn stop(&mut self) -> Vec<CoreCommand> {
        self.timers.clear();
        self.queue.clear();

        let mut accounts: BTreeSet<AccountId> = std::mem::take(&mut self.session_accounts);
        accounts.extend(std::mem::take(&mut self.schedules).into_keys());

        info!(accounts = accounts.len(), "core stopped; all schedules cleared");
        accounts.into_iter().map(CoreCommand::CloseSession).collect()
    }

    /// Pending tasks for one account, in queue order.
    pub fn account_queue(&self, account_id: &str) -> Vec<Task> {
        self.queue.for_account(account_id)
    }

    pub fn status(&self, is_running: bool) -> OrchestratorStatus {
        let active_accounts = self
            .schedules
            .values()
            .map(|s| AccountStatus {
                account_id: s.account_id.clone(),
                email: s.email.clone(),
                intervals: s.intervals,
                smart_mode: s.smart_mode,
                last_run: s.last_run.clone(),
                stats: self.stats.snapshot_for(&s.account_id),
            })
            .collect();

        OrchestratorStatus {
            is_running,
            is_processing: self.processing,
            current_task: self.current.clone(),
            queue_length: self.queue.len(),
            queue: self.queue.iter().cloned().collect(),
            active_accounts,
        }
    }
}
