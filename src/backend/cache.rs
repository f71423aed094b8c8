// src/backend/cache.rs

//! Read model of the externally maintained game status cache.
//!
//! Snapshots are written by whatever scrapes the game (outside this crate)
//! and only ever read here. Field names follow the JSON the scraper emits,
//! e.g.:
//!
//! ```json
//! {
//!   "updatedAt": "2026-10-16T08:00:00Z",
//!   "fieldsStatus": [{ "status": "growing", "readyTime": "00:12:30" }],
//!   "forestryStatus": {
//!     "trees": [{ "status": "Gotowe" }],
//!     "buildings": [{ "slots": [{ "status": "working" }] }]
//!   },
//!   "stallsStatus": [{ "slots": [{ "status": "selling", "currentStock": 4 }] }],
//!   "playerInfo": { "level": 17 }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatusCache {
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub fields_status: Vec<FieldStatus>,
    #[serde(default)]
    pub forestry_status: Option<ForestryStatus>,
    #[serde(default)]
    pub stalls_status: Vec<StallStatus>,
    #[serde(default)]
    pub player_info: Option<PlayerInfo>,
}

impl GameStatusCache {
    /// Empty snapshot taken at `updated_at`.
    pub fn at(updated_at: DateTime<Utc>) -> Self {
        Self {
            updated_at,
            fields_status: Vec::new(),
            forestry_status: None,
            stalls_status: Vec::new(),
            player_info: None,
        }
    }

    /// Last known player level, if any.
    pub fn player_level(&self) -> Option<u32> {
        self.player_info.as_ref().map(|p| p.level)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStatus {
    pub status: String,
    /// Countdown `HH:MM:SS` while growing.
    #[serde(default)]
    pub ready_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForestryStatus {
    #[serde(default)]
    pub trees: Vec<SlotState>,
    #[serde(default)]
    pub buildings: Vec<ProductionBuilding>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionBuilding {
    #[serde(default)]
    pub slots: Vec<SlotState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotState {
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StallStatus {
    #[serde(default)]
    pub slots: Vec<StallSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StallSlot {
    pub status: String,
    #[serde(default)]
    pub current_stock: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub level: u32,
}
