// src/lib.rs

pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::backend::{Collaborators, GameModule, ModuleTable};
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::{AccountConfig, ConfigFile};
use crate::engine::Orchestrator;
use crate::errors::FarmhandError;
use crate::exec::{
    CommandAuthenticator, CommandModule, CommandSession, CommandSessionProvider, JsonStatusCache,
    JsonlActionLog, StaticAccounts, TracingNotifier, UnconfiguredModule,
};
use crate::fs::RealFileSystem;
use crate::types::ModuleType;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the command-backed collaborators
/// - the orchestrator
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let selected = select_accounts(&cfg, args.account.as_deref())?;

    if args.dry_run {
        print_dry_run(&cfg, &selected);
        return Ok(());
    }

    let orchestrator = Orchestrator::new(build_collaborators(&cfg), cfg.engine.settings());

    if args.once {
        run_once(&orchestrator, &selected).await;
        return Ok(());
    }

    orchestrator.start();
    for (id, acc) in &selected {
        orchestrator
            .activate_account(id, acc.activation_options())
            .await?;
        info!(account = %id, "account activated");
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C; shutting down");
    } else {
        info!("Ctrl+C received; shutting down");
    }

    orchestrator.stop().await;
    Ok(())
}

/// One manual run of every interval-enabled module, then exit once drained.
async fn run_once(
    orchestrator: &Orchestrator<CommandSessionProvider>,
    selected: &[(&str, &AccountConfig)],
) {
    for (id, acc) in selected {
        for module in acc.intervals().enabled() {
            orchestrator.run_module(id, module);
        }
    }

    orchestrator.start();
    orchestrator.wait_idle().await;
    orchestrator.stop().await;

    let status = orchestrator.status();
    debug!(?status, "single pass finished");
}

/// Enabled accounts, optionally narrowed to the one named on the CLI.
fn select_accounts<'a>(
    cfg: &'a ConfigFile,
    only: Option<&str>,
) -> std::result::Result<Vec<(&'a str, &'a AccountConfig)>, FarmhandError> {
    match only {
        None => Ok(cfg.enabled_accounts().collect()),
        Some(id) => match cfg.accounts.get_key_value(id) {
            Some((id, acc)) => Ok(vec![(id.as_str(), acc)]),
            None => Err(FarmhandError::AccountNotFound(id.to_string())),
        },
    }
}

/// Production collaborators: shell commands, files under `[paths]`, and a
/// tracing notifier.
pub fn build_collaborators(cfg: &ConfigFile) -> Collaborators<CommandSessionProvider> {
    Collaborators {
        accounts: Arc::new(StaticAccounts::new(cfg.account_records())),
        sessions: Arc::new(CommandSessionProvider::new(
            cfg.session.open.clone(),
            cfg.session.close.clone(),
        )),
        auth: Arc::new(CommandAuthenticator::new(cfg.auth.login.clone())),
        modules: ModuleTable {
            farm: module_for(cfg, ModuleType::Farm),
            forestry: module_for(cfg, ModuleType::Forestry),
            stalls: module_for(cfg, ModuleType::Stalls),
        },
        notifier: Arc::new(TracingNotifier),
        action_log: Arc::new(JsonlActionLog::new(RealFileSystem, cfg.paths.action_log.clone())),
        status_cache: Arc::new(JsonStatusCache::new(RealFileSystem, cfg.paths.status_dir.clone())),
    }
}

fn module_for(cfg: &ConfigFile, module: ModuleType) -> Arc<dyn GameModule<CommandSession>> {
    match cfg.module(module) {
        Some(m) => Arc::new(CommandModule::new(module, m.cmd.clone(), m.min_level)),
        None => Arc::new(UnconfiguredModule),
    }
}

/// Simple dry-run output: engine timings, modules and account schedules.
fn print_dry_run(cfg: &ConfigFile, selected: &[(&str, &AccountConfig)]) {
    let settings = cfg.engine.settings();

    println!("farmhand dry-run");
    println!("  engine.queue_poll = {:?}", settings.queue_poll);
    println!("  engine.smart_poll = {:?}", settings.smart_poll);
    println!("  engine.cooldown = {:?}", settings.cooldown);
    println!("  engine.cache_max_age = {:?}", settings.cache_max_age);
    println!("  engine.smart_suppression = {:?}", settings.smart_suppression);
    println!();

    println!("modules:");
    for module in ModuleType::ALL {
        match cfg.module(module) {
            Some(m) if m.min_level > 0 => {
                println!("  - {module}: {} (from level {})", m.cmd, m.min_level)
            }
            Some(m) => println!("  - {module}: {}", m.cmd),
            None => println!("  - {module}: (not configured, runs are skipped)"),
        }
    }
    println!();

    println!("accounts ({}):", selected.len());
    for (id, acc) in selected {
        println!("  - {id} <{}>", acc.email);
        for module in ModuleType::ALL {
            let minutes = acc.intervals().minutes(module);
            if minutes > 0 {
                println!("      {module}: every {minutes} min");
            }
        }
        if acc.smart_mode {
            println!("      smart mode: every {} s", acc.cache_interval);
        }
        if !acc.enabled {
            println!("      disabled");
        }
    }

    debug!("dry-run complete (no execution)");
}
