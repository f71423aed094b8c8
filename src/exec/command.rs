// src/exec/command.rs

//! Shell command runner and the command-backed game modules.

use std::process::Stdio;
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

use crate::backend::{Account, BoxFuture, GameModule, ModuleReport};
use crate::exec::session::CommandSession;
use crate::types::ModuleType;

/// Captured result of a finished shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CommandOutput {
    /// Last non-empty stdout line.
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .iter()
            .rev()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
    }

    /// Short description of a failure for error messages.
    pub fn failure_detail(&self) -> String {
        let line = self
            .stderr
            .iter()
            .rev()
            .chain(self.stdout.iter().rev())
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .unwrap_or("no output");
        match self.code {
            Some(code) => format!("exit code {code}: {line}"),
            None => format!("terminated by signal: {line}"),
        }
    }

    /// First `key=<n>` / `key: <n>` value printed on stdout.
    pub fn numeric_field(&self, key: &str) -> Option<u32> {
        self.stdout.iter().find_map(|line| {
            let caps = key_value_regex()?.captures(line.trim())?;
            if caps.get(1)?.as_str().eq_ignore_ascii_case(key) {
                caps.get(2)?.as_str().parse().ok()
            } else {
                None
            }
        })
    }
}

fn key_value_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_]+)\s*[=:]\s*(\d+)$").ok())
        .as_ref()
}

/// Run `cmd` through the platform shell with the given environment and wait
/// for it to exit.
///
/// The child is killed if the returned future is dropped.
pub async fn run_shell(cmd: &str, envs: &[(&str, String)]) -> Result<CommandOutput> {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    for (key, value) in envs {
        command.env(key, value);
    }

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command
        .spawn()
        .with_context(|| format!("spawning command '{cmd}'"))?;

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for command '{cmd}'"))?;

    let stdout: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect();
    let stderr: Vec<String> = String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::to_string)
        .collect();

    for line in &stderr {
        debug!(cmd = %cmd, "stderr: {}", line);
    }

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout,
        stderr,
    })
}

/// Environment handed to every command run on behalf of an account.
pub fn account_env(account: &Account, session: &CommandSession) -> Vec<(&'static str, String)> {
    vec![
        ("FARMHAND_ACCOUNT_ID", account.id.clone()),
        ("FARMHAND_EMAIL", account.email.clone()),
        ("FARMHAND_SESSION_ID", session.id().to_string()),
    ]
}

/// A game module implemented as an external script.
///
/// The script receives the account in its environment plus
/// `FARMHAND_MODULE`. Exit code 0 means the cycle completed; the last stdout
/// line becomes the summary and an `actions=<n>` line, if printed, the action
/// count. Any other exit code is a module failure.
#[derive(Debug, Clone)]
pub struct CommandModule {
    module: ModuleType,
    cmd: String,
    /// Player level at which the feature unlocks; 0 means always unlocked.
    min_level: u32,
}

impl CommandModule {
    pub fn new(module: ModuleType, cmd: impl Into<String>, min_level: u32) -> Self {
        Self {
            module,
            cmd: cmd.into(),
            min_level,
        }
    }
}

impl GameModule<CommandSession> for CommandModule {
    fn is_unlocked<'a>(
        &'a self,
        session: &'a CommandSession,
        _account: &'a Account,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            if self.min_level == 0 {
                return Ok(true);
            }
            // Unknown level: let the script decide.
            Ok(session
                .player_level()
                .is_none_or(|level| level >= self.min_level))
        })
    }

    fn run_full_cycle<'a>(
        &'a self,
        session: &'a CommandSession,
        account: &'a Account,
    ) -> BoxFuture<'a, Result<ModuleReport>> {
        Box::pin(async move {
            let mut envs = account_env(account, session);
            envs.push(("FARMHAND_MODULE", self.module.to_string()));

            info!(account = %account.id, module = %self.module, cmd = %self.cmd, "running module command");
            let output = run_shell(&self.cmd, &envs).await?;

            if !output.success {
                return Err(anyhow!("{} command failed ({})", self.module, output.failure_detail()));
            }

            let summary = output
                .last_line()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} cycle finished", self.module));

            Ok(ModuleReport {
                summary,
                actions: output.numeric_field("actions").unwrap_or(0),
            })
        })
    }
}

/// Placeholder for a module with no command configured. Always reports the
/// feature as unavailable, so tasks for it are skipped rather than failed.
#[derive(Debug, Clone, Copy)]
pub struct UnconfiguredModule;

impl GameModule<CommandSession> for UnconfiguredModule {
    fn is_unlocked<'a>(
        &'a self,
        _session: &'a CommandSession,
        _account: &'a Account,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async { Ok(false) })
    }

    fn run_full_cycle<'a>(
        &'a self,
        _session: &'a CommandSession,
        _account: &'a Account,
    ) -> BoxFuture<'a, Result<ModuleReport>> {
        Box::pin(async { Err(anyhow!("no command configured for this module")) })
    }
}
