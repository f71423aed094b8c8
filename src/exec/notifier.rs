// src/exec/notifier.rs

use tracing::{info, warn};

use crate::backend::{ModuleResult, Notifier};
use crate::types::ModuleType;

/// Emits notifications as log events under the `farmhand::notify` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn module_started(&self, account_id: &str, email: &str, module: ModuleType, message: &str) {
        info!(target: "farmhand::notify", account = %account_id, %email, %module, "{message}");
    }

    fn module_completed(&self, account_id: &str, email: &str, module: ModuleType, result: &ModuleResult) {
        match result {
            ModuleResult::Completed(report) => info!(
                target: "farmhand::notify",
                account = %account_id,
                %email,
                %module,
                actions = report.actions,
                "{} done: {}",
                module,
                report.summary
            ),
            ModuleResult::Skipped { reason } => info!(
                target: "farmhand::notify",
                account = %account_id,
                %email,
                %module,
                "{} skipped: {}",
                module,
                reason
            ),
        }
    }

    fn module_error(&self, account_id: &str, email: &str, module: ModuleType, message: &str) {
        warn!(target: "farmhand::notify", account = %account_id, %email, %module, "{} failed: {}", module, message);
    }

    fn level_up(&self, account_id: &str, email: &str, old_level: u32, new_level: u32) {
        info!(
            target: "farmhand::notify",
            account = %account_id,
            %email,
            old_level,
            new_level,
            "level up: {} -> {}",
            old_level,
            new_level
        );
    }
}
