#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use farmhand::backend::cache::{
    FieldStatus, ForestryStatus, ProductionBuilding, SlotState, StallSlot, StallStatus,
};
use farmhand::backend::{GameStatusCache, PlayerInfo};
use farmhand::config::{
    AccountConfig, AuthSection, ConfigFile, EngineSection, ModuleConfig, PathsSection,
    RawConfigFile, SessionSection,
};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                engine: EngineSection::default(),
                paths: PathsSection::default(),
                module: BTreeMap::new(),
                auth: AuthSection::default(),
                session: SessionSection::default(),
                account: BTreeMap::new(),
            },
        }
    }

    pub fn with_account(mut self, id: &str, account: AccountConfig) -> Self {
        self.config.account.insert(id.to_string(), account);
        self
    }

    pub fn with_module(mut self, name: &str, cmd: &str) -> Self {
        self.config.module.insert(
            name.to_string(),
            ModuleConfig {
                cmd: cmd.to_string(),
                min_level: 0,
            },
        );
        self
    }

    pub fn with_login(mut self, cmd: &str) -> Self {
        self.config.auth.login = Some(cmd.to_string());
        self
    }

    pub fn with_engine(mut self, engine: EngineSection) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `AccountConfig`.
pub struct AccountConfigBuilder {
    account: AccountConfig,
}

impl AccountConfigBuilder {
    pub fn new(email: &str) -> Self {
        Self {
            account: AccountConfig {
                email: email.to_string(),
                farm_interval: 0,
                forestry_interval: 0,
                stalls_interval: 0,
                smart_mode: false,
                cache_interval: 60,
                enabled: true,
            },
        }
    }

    pub fn farm(mut self, minutes: u64) -> Self {
        self.account.farm_interval = minutes;
        self
    }

    pub fn forestry(mut self, minutes: u64) -> Self {
        self.account.forestry_interval = minutes;
        self
    }

    pub fn stalls(mut self, minutes: u64) -> Self {
        self.account.stalls_interval = minutes;
        self
    }

    pub fn smart(mut self, cache_interval: u64) -> Self {
        self.account.smart_mode = true;
        self.account.cache_interval = cache_interval;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.account.enabled = false;
        self
    }

    pub fn build(self) -> AccountConfig {
        self.account
    }
}

/// Builder for status cache snapshots.
pub struct CacheBuilder {
    cache: GameStatusCache,
}

impl CacheBuilder {
    pub fn at(updated_at: DateTime<Utc>) -> Self {
        Self {
            cache: GameStatusCache::at(updated_at),
        }
    }

    pub fn field(mut self, status: &str, ready_time: Option<&str>) -> Self {
        self.cache.fields_status.push(FieldStatus {
            status: status.to_string(),
            ready_time: ready_time.map(str::to_string),
        });
        self
    }

    pub fn tree(mut self, status: &str) -> Self {
        self.forestry().trees.push(SlotState {
            status: status.to_string(),
        });
        self
    }

    pub fn building(mut self, slot_statuses: &[&str]) -> Self {
        let slots = slot_statuses
            .iter()
            .map(|s| SlotState {
                status: s.to_string(),
            })
            .collect();
        self.forestry().buildings.push(ProductionBuilding { slots });
        self
    }

    pub fn stall(mut self, slots: &[(&str, Option<i64>)]) -> Self {
        let slots = slots
            .iter()
            .map(|(status, stock)| StallSlot {
                status: status.to_string(),
                current_stock: *stock,
            })
            .collect();
        self.cache.stalls_status.push(StallStatus { slots });
        self
    }

    pub fn level(mut self, level: u32) -> Self {
        self.cache.player_info = Some(PlayerInfo { level });
        self
    }

    fn forestry(&mut self) -> &mut ForestryStatus {
        self.cache.forestry_status.get_or_insert_with(ForestryStatus::default)
    }

    pub fn build(self) -> GameStatusCache {
        self.cache
    }
}
