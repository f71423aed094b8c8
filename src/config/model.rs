// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use tokio::time::Duration;

use crate::backend::Account;
use crate::engine::EngineSettings;
use crate::types::{ActivationOptions, DEFAULT_CACHE_INTERVAL_SECS, ModuleIntervals, ModuleType};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [engine]
/// queue_poll_secs = 5
///
/// [paths]
/// status_dir = "status"
///
/// [module.farm]
/// cmd = "scripts/farm.sh"
///
/// [auth]
/// login = "scripts/login.sh"
///
/// [account.alice]
/// email = "alice@example.com"
/// farm_interval = 5
/// smart_mode = true
/// ```
///
/// Every section except `[account.<id>]` is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub paths: PathsSection,

    /// `[module.<farm|forestry|stalls>]`. Keys are checked during validation.
    #[serde(default)]
    pub module: BTreeMap<String, ModuleConfig>,

    #[serde(default)]
    pub auth: AuthSection,

    #[serde(default)]
    pub session: SessionSection,

    /// `[account.<id>]`, keyed by account id.
    #[serde(default)]
    pub account: BTreeMap<String, AccountConfig>,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub paths: PathsSection,
    pub modules: BTreeMap<ModuleType, ModuleConfig>,
    pub auth: AuthSection,
    pub session: SessionSection,
    pub accounts: BTreeMap<String, AccountConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        raw: RawConfigFile,
        modules: BTreeMap<ModuleType, ModuleConfig>,
    ) -> Self {
        Self {
            engine: raw.engine,
            paths: raw.paths,
            modules,
            auth: raw.auth,
            session: raw.session,
            accounts: raw.account,
        }
    }

    /// Accounts with `enabled = true`, in id order.
    pub fn enabled_accounts(&self) -> impl Iterator<Item = (&str, &AccountConfig)> {
        self.accounts
            .iter()
            .filter(|(_, acc)| acc.enabled)
            .map(|(id, acc)| (id.as_str(), acc))
    }

    /// Every configured account record, enabled or not.
    pub fn account_records(&self) -> Vec<Account> {
        self.accounts
            .iter()
            .map(|(id, acc)| acc.account(id))
            .collect()
    }

    pub fn module(&self, module: ModuleType) -> Option<&ModuleConfig> {
        self.modules.get(&module)
    }
}

/// `[engine]` timing overrides. Defaults match [`EngineSettings::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub queue_poll_secs: u64,
    pub smart_poll_secs: u64,
    pub cooldown_secs: u64,
    pub smart_kickoff_secs: u64,
    pub cache_max_age_mins: u64,
    pub smart_suppression_mins: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            queue_poll_secs: 5,
            smart_poll_secs: 30,
            cooldown_secs: 3,
            smart_kickoff_secs: 5,
            cache_max_age_mins: 60,
            smart_suppression_mins: 5,
        }
    }
}

impl EngineSection {
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            queue_poll: Duration::from_secs(self.queue_poll_secs),
            smart_poll: Duration::from_secs(self.smart_poll_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
            smart_kickoff_delay: Duration::from_secs(self.smart_kickoff_secs),
            cache_max_age: Duration::from_secs(self.cache_max_age_mins.saturating_mul(60)),
            smart_suppression: Duration::from_secs(self.smart_suppression_mins.saturating_mul(60)),
        }
    }

    pub(crate) fn named_values(&self) -> [(&'static str, u64); 6] {
        [
            ("queue_poll_secs", self.queue_poll_secs),
            ("smart_poll_secs", self.smart_poll_secs),
            ("cooldown_secs", self.cooldown_secs),
            ("smart_kickoff_secs", self.smart_kickoff_secs),
            ("cache_max_age_mins", self.cache_max_age_mins),
            ("smart_suppression_mins", self.smart_suppression_mins),
        ]
    }
}

/// `[paths]` section. Relative paths resolve against the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Directory holding one `<account_id>.json` status snapshot per account.
    pub status_dir: PathBuf,
    /// JSON-lines file every finished task is appended to.
    pub action_log: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            status_dir: PathBuf::from("status"),
            action_log: PathBuf::from("farmhand-actions.jsonl"),
        }
    }
}

/// `[module.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleConfig {
    /// Shell command running one full cycle of the module.
    pub cmd: String,

    /// Player level that unlocks the module; `0` means always unlocked.
    #[serde(default)]
    pub min_level: u32,
}

/// `[auth]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthSection {
    /// Command run before every task to make sure the session is logged in.
    #[serde(default)]
    pub login: Option<String>,
}

/// `[session]` section: hooks run when a session is opened or closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionSection {
    #[serde(default)]
    pub open: Option<String>,
    #[serde(default)]
    pub close: Option<String>,
}

/// `[account.<id>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountConfig {
    pub email: String,

    /// Minutes between farm runs; `0` disables the farm timer.
    #[serde(default)]
    pub farm_interval: u64,

    #[serde(default)]
    pub forestry_interval: u64,

    #[serde(default)]
    pub stalls_interval: u64,

    #[serde(default)]
    pub smart_mode: bool,

    /// Seconds between two smart-mode checks of this account.
    #[serde(default = "default_cache_interval")]
    pub cache_interval: u64,

    /// Disabled accounts are known to the account directory but never
    /// activated.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_cache_interval() -> u64 {
    DEFAULT_CACHE_INTERVAL_SECS
}

fn default_enabled() -> bool {
    true
}

impl AccountConfig {
    pub fn intervals(&self) -> ModuleIntervals {
        ModuleIntervals {
            farm: self.farm_interval,
            forestry: self.forestry_interval,
            stalls: self.stalls_interval,
        }
    }

    pub fn activation_options(&self) -> ActivationOptions {
        ActivationOptions {
            intervals: self.intervals(),
            smart_mode: self.smart_mode,
            cache_interval_secs: self.cache_interval,
        }
    }

    pub fn account(&self, id: &str) -> Account {
        Account {
            id: id.to_string(),
            email: self.email.clone(),
        }
    }
}
