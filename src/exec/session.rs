// src/exec/session.rs

//! Per-account session bookkeeping with optional open/close hooks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::backend::{Account, BoxFuture, SessionProvider};
use crate::exec::command::run_shell;
use crate::types::AccountId;

/// One long-lived automation context for an account.
///
/// The session records the player level last observed by the login step so
/// modules can gate on it.
#[derive(Debug)]
pub struct CommandSession {
    id: String,
    account_id: AccountId,
    opened_at: DateTime<Utc>,
    player_level: Mutex<Option<u32>>,
}

impl CommandSession {
    pub fn new(id: impl Into<String>, account_id: impl Into<AccountId>) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            opened_at: Utc::now(),
            player_level: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn player_level(&self) -> Option<u32> {
        *self.player_level.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_player_level(&self, level: u32) {
        *self.player_level.lock().unwrap_or_else(PoisonError::into_inner) = Some(level);
    }
}

/// Keeps at most one [`CommandSession`] per account.
///
/// `open` runs when a session is first created for an account, `close` when
/// it is released. Both receive `FARMHAND_ACCOUNT_ID`, `FARMHAND_EMAIL` (open
/// only) and `FARMHAND_SESSION_ID`.
#[derive(Debug, Default)]
pub struct CommandSessionProvider {
    open_cmd: Option<String>,
    close_cmd: Option<String>,
    sessions: Mutex<HashMap<AccountId, Arc<CommandSession>>>,
    counter: AtomicU64,
}

impl CommandSessionProvider {
    pub fn new(open_cmd: Option<String>, close_cmd: Option<String>) -> Self {
        Self {
            open_cmd,
            close_cmd,
            sessions: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<AccountId, Arc<CommandSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions().len()
    }
}

impl SessionProvider for CommandSessionProvider {
    type Session = CommandSession;

    fn acquire<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, Result<Arc<CommandSession>>> {
        Box::pin(async move {
            if let Some(existing) = self.sessions().get(&account.id).cloned() {
                debug!(account = %account.id, session = %existing.id(), "reusing session");
                return Ok(existing);
            }

            let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
            let session = Arc::new(CommandSession::new(format!("{}-{n}", account.id), account.id.clone()));

            if let Some(cmd) = &self.open_cmd {
                let envs = [
                    ("FARMHAND_ACCOUNT_ID", account.id.clone()),
                    ("FARMHAND_EMAIL", account.email.clone()),
                    ("FARMHAND_SESSION_ID", session.id().to_string()),
                ];
                let output = run_shell(cmd, &envs).await?;
                if !output.success {
                    return Err(anyhow!("session open hook failed ({})", output.failure_detail()));
                }
            }

            info!(account = %account.id, session = %session.id(), "session opened");
            self.sessions()
                .insert(account.id.clone(), Arc::clone(&session));
            Ok(session)
        })
    }

    fn release<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(session) = self.sessions().remove(account_id) else {
                return Ok(());
            };

            if let Some(cmd) = &self.close_cmd {
                let envs = [
                    ("FARMHAND_ACCOUNT_ID", session.account_id().to_string()),
                    ("FARMHAND_SESSION_ID", session.id().to_string()),
                ];
                let output = run_shell(cmd, &envs).await?;
                if !output.success {
                    return Err(anyhow!("session close hook failed ({})", output.failure_detail()));
                }
            }

            debug!(
                account = %session.account_id(),
                session = %session.id(),
                open_secs = (Utc::now() - session.opened_at()).num_seconds(),
                "session closed"
            );
            Ok(())
        })
    }
}
