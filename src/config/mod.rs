// src/config/mod.rs

//! Configuration loading and validation for farmhand.
//!
//! - `model.rs` defines the TOML-backed data model.
//! - `loader.rs` reads a config file from disk.
//! - `validate.rs` turns a [`RawConfigFile`] into a checked [`ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{
    AccountConfig, AuthSection, ConfigFile, EngineSection, ModuleConfig, PathsSection,
    RawConfigFile, SessionSection,
};
