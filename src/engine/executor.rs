// src/engine/executor.rs

//! Lifecycle of a single task.
//!
//! [`run_task`] takes one dequeued task from account lookup to session
//! release and always produces a [`TaskReport`]. Every error raised along the
//! way is absorbed here: it is logged, written to the action log, sent to the
//! notifier and turned into a failed outcome. Nothing propagates to the
//! orchestrator loop.
//!
//! The session is released on every path once it may have been acquired,
//! whether the module succeeded, failed or was skipped.

use anyhow::Context;
use chrono::Utc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{
    Account, ActionLogEntry, ActionStatus, Collaborators, ModuleResult, SessionProvider,
};
use crate::engine::core::{TaskOutcome, TaskReport};
use crate::types::Task;

/// Failure inside a task's lifecycle. Always counted as a module error.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("session unavailable: {0:#}")]
    Session(anyhow::Error),

    #[error("login failed: {0:#}")]
    Auth(anyhow::Error),

    #[error("module failed: {0:#}")]
    Module(anyhow::Error),
}

/// Run one task through the collaborators.
pub async fn run_task<P: SessionProvider>(task: Task, collab: &Collaborators<P>) -> TaskReport {
    let started = Instant::now();

    let account = match collab.accounts.find(&task.account_id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            warn!(
                account = %task.account_id,
                module = %task.module,
                task_id = task.id,
                "account not found; aborting task"
            );
            return aborted(task);
        }
        Err(err) => {
            warn!(
                account = %task.account_id,
                module = %task.module,
                task_id = task.id,
                error = %format!("{err:#}"),
                "account lookup failed; aborting task"
            );
            return aborted(task);
        }
    };

    info!(
        account = %account.id,
        module = %task.module,
        task_id = task.id,
        "starting module"
    );
    collab.notifier.module_started(
        &account.id,
        &account.email,
        task.module,
        &format!("starting {} cycle", task.module),
    );

    let result = run_task_inner(&task, &account, collab).await;
    let finished_at = Utc::now();
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (outcome, status, message) = match result {
        Ok(ModuleResult::Completed(report)) => {
            info!(
                account = %account.id,
                module = %task.module,
                task_id = task.id,
                duration_ms,
                summary = %report.summary,
                "module completed"
            );
            let result = ModuleResult::Completed(report.clone());
            collab
                .notifier
                .module_completed(&account.id, &account.email, task.module, &result);
            let message = report.summary.clone();
            (TaskOutcome::Succeeded(report), ActionStatus::Success, message)
        }
        Ok(ModuleResult::Skipped { reason }) => {
            info!(
                account = %account.id,
                module = %task.module,
                task_id = task.id,
                %reason,
                "module skipped"
            );
            let result = ModuleResult::Skipped {
                reason: reason.clone(),
            };
            collab
                .notifier
                .module_completed(&account.id, &account.email, task.module, &result);
            (TaskOutcome::Skipped(reason.clone()), ActionStatus::Skipped, reason)
        }
        Err(err) => {
            let message = err.to_string();
            warn!(
                account = %account.id,
                module = %task.module,
                task_id = task.id,
                duration_ms,
                error = %message,
                "module failed"
            );
            collab
                .notifier
                .module_error(&account.id, &account.email, task.module, &message);
            (TaskOutcome::Failed(message.clone()), ActionStatus::Error, message)
        }
    };

    let entry = ActionLogEntry {
        account_id: account.id.clone(),
        module: task.module,
        status,
        message,
        at: finished_at,
        duration_ms,
    };
    if let Err(err) = collab.action_log.record(entry).await {
        warn!(
            account = %account.id,
            module = %task.module,
            error = %format!("{err:#}"),
            "failed to write action log entry"
        );
    }

    release_session(collab, &account.id).await;

    TaskReport {
        task,
        outcome,
        finished_at,
    }
}

async fn run_task_inner<P: SessionProvider>(
    task: &Task,
    account: &Account,
    collab: &Collaborators<P>,
) -> Result<ModuleResult, TaskError> {
    let previous_level = cached_level(collab, &account.id).await;

    let session = collab
        .sessions
        .acquire(account)
        .await
        .map_err(TaskError::Session)?;
    let session: &P::Session = &session;

    collab
        .auth
        .ensure_logged_in(session, account)
        .await
        .map_err(TaskError::Auth)?;

    match collab.auth.player_info(session, account).await {
        Ok(Some(player)) => {
            if let Some(old) = previous_level.filter(|lvl| *lvl > 0)
                && player.level > old
            {
                info!(account = %account.id, old, new = player.level, "level up");
                collab
                    .notifier
                    .level_up(&account.id, &account.email, old, player.level);
            }
        }
        Ok(None) => {}
        Err(err) => {
            debug!(account = %account.id, error = %format!("{err:#}"), "could not read player info");
        }
    }

    let module = collab.modules.get(task.module);

    let unlocked = module
        .is_unlocked(session, account)
        .await
        .with_context(|| format!("checking whether {} is unlocked", task.module))
        .map_err(TaskError::Module)?;
    if !unlocked {
        return Ok(ModuleResult::Skipped {
            reason: format!("{} is not unlocked for this account", task.module),
        });
    }

    let report = module
        .run_full_cycle(session, account)
        .await
        .map_err(TaskError::Module)?;

    Ok(ModuleResult::Completed(report))
}

/// Player level from the cache snapshot taken before this run.
async fn cached_level<P: SessionProvider>(collab: &Collaborators<P>, account_id: &str) -> Option<u32> {
    match collab.status_cache.fetch(account_id).await {
        Ok(cache) => cache.and_then(|c| c.player_level()),
        Err(err) => {
            debug!(account = %account_id, error = %format!("{err:#}"), "could not read cached player level");
            None
        }
    }
}

/// Release the account's session, swallowing failures.
pub(crate) async fn release_session<P: SessionProvider>(collab: &Collaborators<P>, account_id: &str) {
    match collab.sessions.release(account_id).await {
        Ok(()) => debug!(account = %account_id, "session released"),
        Err(err) => debug!(
            account = %account_id,
            error = %format!("{err:#}"),
            "session release failed; ignoring"
        ),
    }
}

fn aborted(task: Task) -> TaskReport {
    TaskReport {
        task,
        outcome: TaskOutcome::Aborted,
        finished_at: Utc::now(),
    }
}
