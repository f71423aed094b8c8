// src/logging.rs

//! Tracing subscriber setup for the `farmhand` binary.
//!
//! The filter comes from `--log-level` when given. Otherwise `FARMHAND_LOG`
//! is read as a full `EnvFilter` directive string, so per-target levels such
//! as `info,farmhand::engine=debug` work. Without either, `info` is used.
//!
//! Output goes to stderr; stdout is reserved for `--dry-run`.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

const LOG_ENV: &str = "FARMHAND_LOG";

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level)?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

fn build_filter(cli_level: Option<LogLevel>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(level.as_directive()));
    }

    match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives.trim())
            .with_context(|| format!("parsing {LOG_ENV}")),
        _ => Ok(EnvFilter::new("info")),
    }
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
