// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, ModuleConfig, RawConfigFile};
use crate::errors::{FarmhandError, Result};
use crate::types::{MAX_INTERVAL_MINUTES, ModuleType};

/// Upper bound for every `[engine]` value given in seconds (one day).
const MAX_ENGINE_SECS: u64 = 24 * 60 * 60;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FarmhandError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_accounts(&raw)?;
        validate_engine(&raw)?;
        validate_accounts(&raw)?;
        let modules = parse_modules(&raw)?;
        ensure_interval_modules_configured(&raw, &modules)?;
        Ok(ConfigFile::new_unchecked(raw, modules))
    }
}

fn ensure_has_accounts(cfg: &RawConfigFile) -> Result<()> {
    if cfg.account.is_empty() {
        return Err(FarmhandError::ConfigError(
            "config must contain at least one [account.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_engine(cfg: &RawConfigFile) -> Result<()> {
    for (name, value) in cfg.engine.named_values() {
        if value == 0 {
            return Err(FarmhandError::ConfigError(format!(
                "[engine].{name} must be >= 1 (got 0)"
            )));
        }
        let max = if name.ends_with("_mins") {
            MAX_INTERVAL_MINUTES
        } else {
            MAX_ENGINE_SECS
        };
        if value > max {
            return Err(FarmhandError::ConfigError(format!(
                "[engine].{name} must be <= {max} (got {value})"
            )));
        }
    }
    Ok(())
}

fn validate_accounts(cfg: &RawConfigFile) -> Result<()> {
    for (id, acc) in cfg.account.iter() {
        if id.trim().is_empty() {
            return Err(FarmhandError::ConfigError(
                "account ids must not be empty".to_string(),
            ));
        }
        if acc.email.trim().is_empty() {
            return Err(FarmhandError::ConfigError(format!(
                "account '{id}' has an empty email"
            )));
        }
        if acc.cache_interval == 0 {
            return Err(FarmhandError::ConfigError(format!(
                "account '{id}': cache_interval must be >= 1 (got 0)"
            )));
        }
        if acc.cache_interval > MAX_ENGINE_SECS {
            return Err(FarmhandError::ConfigError(format!(
                "account '{id}': cache_interval must be <= {MAX_ENGINE_SECS} (got {})",
                acc.cache_interval
            )));
        }
        for module in ModuleType::ALL {
            let minutes = acc.intervals().minutes(module);
            if minutes > MAX_INTERVAL_MINUTES {
                return Err(FarmhandError::ConfigError(format!(
                    "account '{id}': {module}_interval must be <= {MAX_INTERVAL_MINUTES} minutes (got {minutes})"
                )));
            }
        }
    }
    Ok(())
}

fn parse_modules(cfg: &RawConfigFile) -> Result<BTreeMap<ModuleType, ModuleConfig>> {
    let mut modules = BTreeMap::new();
    for (name, module_cfg) in cfg.module.iter() {
        let module: ModuleType = name
            .parse()
            .map_err(|e| FarmhandError::ConfigError(format!("[module.{name}]: {e}")))?;
        if module_cfg.cmd.trim().is_empty() {
            return Err(FarmhandError::ConfigError(format!(
                "[module.{name}].cmd must not be empty"
            )));
        }
        if modules.insert(module, module_cfg.clone()).is_some() {
            return Err(FarmhandError::ConfigError(format!(
                "module '{module}' is configured more than once"
            )));
        }
    }
    Ok(modules)
}

fn ensure_interval_modules_configured(
    cfg: &RawConfigFile,
    modules: &BTreeMap<ModuleType, ModuleConfig>,
) -> Result<()> {
    for (id, acc) in cfg.account.iter().filter(|(_, acc)| acc.enabled) {
        for module in acc.intervals().enabled() {
            if !modules.contains_key(&module) {
                return Err(FarmhandError::ConfigError(format!(
                    "account '{id}' runs {module} every {} min but no [module.{module}] command is configured",
                    acc.intervals().minutes(module)
                )));
            }
        }
    }
    Ok(())
}
