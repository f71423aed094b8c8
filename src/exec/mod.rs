// src/exec/mod.rs

//! Production collaborators used by the binary.
//!
//! Everything that touches the outside world is driven by shell commands
//! and files:
//!
//! - [`command`] runs shell commands via `tokio::process::Command` and
//!   implements the game modules on top of them.
//! - [`session`] keeps one session per account, with optional open/close
//!   hooks.
//! - [`auth`] runs the login command and records the reported player level.
//! - [`status_cache`] reads the JSON status snapshots smart mode works from.
//! - [`action_log`] appends JSON lines for every finished task.
//! - [`notifier`] turns notifications into log events.
//! - [`accounts`] serves account records from the config file.

pub mod accounts;
pub mod action_log;
pub mod auth;
pub mod command;
pub mod notifier;
pub mod session;
pub mod status_cache;

pub use accounts::StaticAccounts;
pub use action_log::JsonlActionLog;
pub use auth::CommandAuthenticator;
pub use command::{CommandModule, CommandOutput, UnconfiguredModule, run_shell};
pub use notifier::TracingNotifier;
pub use session::{CommandSession, CommandSessionProvider};
pub use status_cache::JsonStatusCache;
