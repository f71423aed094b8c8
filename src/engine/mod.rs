// src/engine/mod.rs

//! Orchestration engine for farmhand.
//!
//! This module ties together:
//! - the task queue (one pending task per account/module at most)
//! - the trigger sources: fixed-interval timers and smart-mode checks
//! - the single serialized executor (one task in flight system-wide)
//! - per-module stats
//! - the lifecycle: start/stop, account activation/deactivation
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`], and the per-task lifecycle in [`executor`].

use tokio::time::Duration;

pub mod core;
pub mod executor;
pub mod queue;
pub mod runtime;
pub mod schedule;
pub mod smart;
pub mod stats;
pub mod status;
pub mod timers;

pub use self::core::{CoreCommand, CoreRuntime, FiredTriggers, TaskOutcome, TaskReport};
pub use executor::TaskError;
pub use queue::TaskQueue;
pub use runtime::Orchestrator;
pub use schedule::AccountSchedule;
pub use stats::{ModuleStats, StatsTracker};
pub use status::{AccountStatus, OrchestratorStatus};
pub use timers::{TimerKey, TimerWheel};

/// Timing constants of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Cadence of the queue poll that starts the next task.
    pub queue_poll: Duration,
    /// Cadence of the global smart-mode tick.
    pub smart_poll: Duration,
    /// Pause between two tasks when more work is queued, so the released
    /// session can shut down before the next one starts.
    pub cooldown: Duration,
    /// Delay of the first smart check after an account is activated.
    pub smart_kickoff_delay: Duration,
    /// Cache snapshots older than this are ignored by smart mode.
    pub cache_max_age: Duration,
    /// Minimum spacing between two smart-mode enqueues of the same
    /// account/module.
    pub smart_suppression: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            queue_poll: Duration::from_secs(5),
            smart_poll: Duration::from_secs(30),
            cooldown: Duration::from_secs(3),
            smart_kickoff_delay: Duration::from_secs(5),
            cache_max_age: Duration::from_secs(60 * 60),
            smart_suppression: Duration::from_secs(5 * 60),
        }
    }
}
