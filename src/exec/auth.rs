// src/exec/auth.rs

use anyhow::{Result, anyhow};
use tracing::{debug, info};

use crate::backend::{Account, Authenticator, BoxFuture, PlayerInfo};
use crate::exec::command::{account_env, run_shell};
use crate::exec::session::CommandSession;

/// Login step backed by an optional shell command.
///
/// The command runs before every task. A non-zero exit aborts the task as a
/// login failure. If it prints `level=<n>`, the level is stored on the
/// session and reported as the current player info.
#[derive(Debug, Clone, Default)]
pub struct CommandAuthenticator {
    login_cmd: Option<String>,
}

impl CommandAuthenticator {
    pub fn new(login_cmd: Option<String>) -> Self {
        Self { login_cmd }
    }
}

impl Authenticator<CommandSession> for CommandAuthenticator {
    fn ensure_logged_in<'a>(
        &'a self,
        session: &'a CommandSession,
        account: &'a Account,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(cmd) = &self.login_cmd else {
                debug!(account = %account.id, "no login command configured");
                return Ok(());
            };

            let output = run_shell(cmd, &account_env(account, session)).await?;
            if !output.success {
                return Err(anyhow!("login command failed ({})", output.failure_detail()));
            }

            if let Some(level) = output.numeric_field("level") {
                session.set_player_level(level);
            }
            info!(account = %account.id, level = ?session.player_level(), "logged in");
            Ok(())
        })
    }

    fn player_info<'a>(
        &'a self,
        session: &'a CommandSession,
        _account: &'a Account,
    ) -> BoxFuture<'a, Result<Option<PlayerInfo>>> {
        Box::pin(async move { Ok(session.player_level().map(|level| PlayerInfo { level })) })
    }
}
