// src/backend/mod.rs

//! Collaborator abstractions.
//!
//! The engine never talks to a browser, a login form, a database or a
//! notification transport directly. It talks to the traits below instead,
//! which are bundled into [`Collaborators`] and injected into the
//! orchestrator at construction time.
//!
//! - Production implementations live in [`crate::exec`].
//! - Tests provide fakes (see the `farmhand-test-utils` crate) that record
//!   calls and script outcomes.
//!
//! Async methods return boxed futures so the traits stay object safe.

pub mod cache;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, ModuleType};

pub use cache::{GameStatusCache, PlayerInfo};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An account record as known to the account directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
}

/// Looks up account records by id.
pub trait AccountDirectory: Send + Sync {
    fn find<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<Option<Account>>>;
}

/// Owns one long-lived automation session per account.
///
/// `acquire` returns the existing session for the account if there is one,
/// otherwise it creates it. `release` closes it; releasing an account with no
/// open session must succeed.
pub trait SessionProvider: Send + Sync + 'static {
    type Session: Send + Sync + 'static;

    fn acquire<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, Result<Arc<Self::Session>>>;

    fn release<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Makes sure a session is logged in.
pub trait Authenticator<S>: Send + Sync {
    /// Log in if needed. An error aborts the task and counts as a failure.
    fn ensure_logged_in<'a>(&'a self, session: &'a S, account: &'a Account) -> BoxFuture<'a, Result<()>>;

    /// Player info as currently visible in the session, if the collaborator
    /// can observe it.
    fn player_info<'a>(
        &'a self,
        _session: &'a S,
        _account: &'a Account,
    ) -> BoxFuture<'a, Result<Option<PlayerInfo>>> {
        Box::pin(async { Ok(None) })
    }
}

/// Result object of a module's full cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReport {
    pub summary: String,
    /// Number of in-game actions performed (harvests, plantings, sales...).
    #[serde(default)]
    pub actions: u32,
}

impl ModuleReport {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            actions: 0,
        }
    }
}

/// What a dispatched module produced, as reported to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModuleResult {
    Completed(ModuleReport),
    Skipped { reason: String },
}

/// One automation cycle (farm, forestry or stalls).
pub trait GameModule<S>: Send + Sync {
    /// Whether the feature this module automates is unlocked for the account.
    /// A locked module is skipped without counting as success or failure.
    fn is_unlocked<'a>(&'a self, _session: &'a S, _account: &'a Account) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async { Ok(true) })
    }

    fn run_full_cycle<'a>(&'a self, session: &'a S, account: &'a Account) -> BoxFuture<'a, Result<ModuleReport>>;
}

/// Static dispatch table from [`ModuleType`] to its module implementation.
pub struct ModuleTable<S> {
    pub farm: Arc<dyn GameModule<S>>,
    pub forestry: Arc<dyn GameModule<S>>,
    pub stalls: Arc<dyn GameModule<S>>,
}

impl<S> ModuleTable<S> {
    pub fn get(&self, module: ModuleType) -> &Arc<dyn GameModule<S>> {
        match module {
            ModuleType::Farm => &self.farm,
            ModuleType::Forestry => &self.forestry,
            ModuleType::Stalls => &self.stalls,
        }
    }
}

impl<S> Clone for ModuleTable<S> {
    fn clone(&self) -> Self {
        Self {
            farm: Arc::clone(&self.farm),
            forestry: Arc::clone(&self.forestry),
            stalls: Arc::clone(&self.stalls),
        }
    }
}

/// User-facing notification hooks. Fire-and-forget: implementations must not
/// block and must not fail the task.
pub trait Notifier: Send + Sync {
    fn module_started(&self, account_id: &str, email: &str, module: ModuleType, message: &str);

    fn module_completed(&self, account_id: &str, email: &str, module: ModuleType, result: &ModuleResult);

    fn module_error(&self, account_id: &str, email: &str, module: ModuleType, message: &str);

    fn level_up(&self, account_id: &str, email: &str, old_level: u32, new_level: u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Error,
    Skipped,
}

/// One persisted line of the action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLogEntry {
    pub account_id: AccountId,
    pub module: ModuleType,
    pub status: ActionStatus,
    pub message: String,
    pub at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Persists action-log entries.
pub trait ActionLog: Send + Sync {
    fn record<'a>(&'a self, entry: ActionLogEntry) -> BoxFuture<'a, Result<()>>;
}

/// Read access to the game status cache.
pub trait StatusCache: Send + Sync {
    fn fetch<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<Option<GameStatusCache>>>;
}

/// Every collaborator the orchestrator needs, injected at construction.
pub struct Collaborators<P: SessionProvider> {
    pub accounts: Arc<dyn AccountDirectory>,
    pub sessions: Arc<P>,
    pub auth: Arc<dyn Authenticator<P::Session>>,
    pub modules: ModuleTable<P::Session>,
    pub notifier: Arc<dyn Notifier>,
    pub action_log: Arc<dyn ActionLog>,
    pub status_cache: Arc<dyn StatusCache>,
}

impl<P: SessionProvider> Clone for Collaborators<P> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            sessions: Arc::clone(&self.sessions),
            auth: Arc::clone(&self.auth),
            modules: self.modules.clone(),
            notifier: Arc::clone(&self.notifier),
            action_log: Arc::clone(&self.action_log),
            status_cache: Arc::clone(&self.status_cache),
        }
    }
}
