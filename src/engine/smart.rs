// src/engine/smart.rs

//! Smart-mode readiness heuristics.
//!
//! These functions look at a cached [`GameStatusCache`] snapshot and decide
//! whether a module has something to do right now. They are pure: the
//! freshness gate, the per-account check cadence and the suppression window
//! are applied by the core around them.
//!
//! Malformed data never makes a module ready. A countdown that does not parse
//! is reported as a [`TriggerError`] and the field is treated as not ready.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;
use tokio::time::Duration;

use crate::backend::cache::{FieldStatus, GameStatusCache, SlotState, StallSlot};
use crate::types::ModuleType;

/// Localised label the game uses for "ready" in the forestry views.
const GOTOWE: &str = "Gotowe";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("malformed countdown: {0:?}")]
    MalformedCountdown(String),
}

fn countdown_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(-)?(\d+):(\d{1,2}):(\d{1,2})\s*$").ok())
        .as_ref()
}

/// Parse a `HH:MM:SS` countdown into total seconds.
///
/// A leading `-` makes the total negative (overdue). Minutes and seconds
/// above 59 are rejected.
pub fn parse_countdown(s: &str) -> Result<i64, TriggerError> {
    let malformed = || TriggerError::MalformedCountdown(s.to_string());

    let caps = countdown_regex()
        .and_then(|re| re.captures(s))
        .ok_or_else(malformed)?;

    let field = |i: usize| -> Result<i64, TriggerError> {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .ok_or_else(malformed)
    };

    let hours = field(2)?;
    let minutes = field(3)?;
    let seconds = field(4)?;
    if minutes > 59 || seconds > 59 {
        return Err(malformed());
    }

    let total = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
        .ok_or_else(malformed)?;

    Ok(if caps.get(1).is_some() { -total } else { total })
}

fn field_ready(field: &FieldStatus) -> bool {
    match field.status.as_str() {
        "ready" => true,
        "growing" => match field.ready_time.as_deref() {
            Some(countdown) => matches!(parse_countdown(countdown), Ok(total) if total <= 0),
            None => false,
        },
        _ => false,
    }
}

fn slot_ready(slot: &SlotState) -> bool {
    slot.status == "ready" || slot.status == GOTOWE
}

fn stall_slot_needs_restock(slot: &StallSlot) -> bool {
    slot.status == "empty" || slot.status == "sold" || slot.current_stock == Some(0)
}

/// Any field ready to harvest.
pub fn farm_ready(cache: &GameStatusCache) -> bool {
    cache.fields_status.iter().any(field_ready)
}

/// Any tree or production slot ready to collect.
pub fn forestry_ready(cache: &GameStatusCache) -> bool {
    let Some(forestry) = cache.forestry_status.as_ref() else {
        return false;
    };

    forestry.trees.iter().any(slot_ready)
        || forestry
            .buildings
            .iter()
            .flat_map(|b| b.slots.iter())
            .any(slot_ready)
}

/// Any stall slot empty, sold out, or with zero stock.
pub fn stalls_ready(cache: &GameStatusCache) -> bool {
    cache
        .stalls_status
        .iter()
        .flat_map(|s| s.slots.iter())
        .any(stall_slot_needs_restock)
}

pub fn module_ready(module: ModuleType, cache: &GameStatusCache) -> bool {
    match module {
        ModuleType::Farm => farm_ready(cache),
        ModuleType::Forestry => forestry_ready(cache),
        ModuleType::Stalls => stalls_ready(cache),
    }
}

/// True when the snapshot is too old to act on.
///
/// A snapshot stamped in the future counts as fresh.
pub fn is_stale(cache: &GameStatusCache, wall_now: DateTime<Utc>, max_age: Duration) -> bool {
    match (wall_now - cache.updated_at).to_std() {
        Ok(age) => age > max_age,
        Err(_) => false,
    }
}

/// Modules the snapshot says have work, in iteration order.
///
/// Returns nothing for a missing or stale snapshot.
pub fn ready_modules(
    cache: Option<&GameStatusCache>,
    wall_now: DateTime<Utc>,
    max_age: Duration,
) -> Vec<ModuleType> {
    let Some(cache) = cache else {
        return Vec::new();
    };
    if is_stale(cache, wall_now, max_age) {
        return Vec::new();
    }

    ModuleType::ALL
        .into_iter()
        .filter(|m| module_ready(*m, cache))
        .collect()
}
