// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a config file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_str(&contents)
}

pub fn parse_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a config file and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` attributes and `Default` impls).
/// - Checks for:
///   - at least one account, each with an email,
///   - non-zero engine timings and cache intervals,
///   - known `[module.<name>]` keys,
///   - a command for every module an enabled account runs on an interval.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Farmhand.toml")
}
