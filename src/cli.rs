// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `farmhand`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "farmhand",
    version,
    about = "Run periodic game automation modules for several accounts, one task at a time.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Farmhand.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Farmhand.toml")]
    pub config: String,

    /// Run every enabled module of every account once, then exit.
    ///
    /// No recurring timers and no smart mode in this mode.
    #[arg(long)]
    pub once: bool,

    /// Only activate this account.
    #[arg(long, value_name = "ID")]
    pub account: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FARMHAND_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the schedule, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
