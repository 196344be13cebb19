// Build documents, requests, cache keys, and the game-mode table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Summoner's Rift queues served by the ranked build source.
pub const RANKED_QUEUES: &[i64] = &[400, 420, 430, 440, 480, 490];
pub const ARAM_QUEUES: &[i64] = &[450];
pub const ARENA_QUEUES: &[i64] = &[1700, 1710];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Ranked,
    Aram,
    Arena,
}

impl GameMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::Ranked => "ranked",
            GameMode::Aram => "aram",
            GameMode::Arena => "arena",
        }
    }

    /// Supported mode for a client queue id; `None` for anything else
    /// (customs, co-op vs AI, rotating modes).
    pub fn from_queue(queue_id: i64) -> Option<Self> {
        if RANKED_QUEUES.contains(&queue_id) {
            Some(GameMode::Ranked)
        } else if ARAM_QUEUES.contains(&queue_id) {
            Some(GameMode::Aram)
        } else if ARENA_QUEUES.contains(&queue_id) {
            Some(GameMode::Arena)
        } else {
            None
        }
    }

    /// Mode for the live endpoint's `gameMode` string.
    pub fn from_live_game_mode(game_mode: &str) -> Option<Self> {
        match game_mode.to_ascii_uppercase().as_str() {
            "CLASSIC" => Some(GameMode::Ranked),
            "ARAM" => Some(GameMode::Aram),
            "CHERRY" => Some(GameMode::Arena),
            _ => None,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Build documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunePage {
    pub primary_style: i64,
    pub sub_style: i64,
    pub perks: Vec<i64>,
    pub win_rate: Option<f64>,
    pub games: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpellSet {
    pub spells: Vec<i64>,
    pub win_rate: Option<f64>,
    pub games: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemSet {
    pub items: Vec<i64>,
    pub win_rate: Option<f64>,
    pub games: Option<u32>,
}

/// Summoner's Rift build (ranked and ARAM share the shape).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiftBuild {
    pub champion_id: i64,
    /// Fetch time, epoch milliseconds.
    pub dt: i64,
    pub patch: Option<String>,
    pub runes: Vec<RunePage>,
    pub summoner_spells: Vec<SpellSet>,
    pub starting_items: Vec<ItemSet>,
    pub core_items: Vec<ItemSet>,
    pub situational_items: Vec<ItemSet>,
    pub skill_order: Vec<String>,
}

impl RiftBuild {
    pub fn item_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.starting_items
            .iter()
            .chain(&self.core_items)
            .chain(&self.situational_items)
            .flat_map(|set| set.items.iter().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AugmentPick {
    pub id: i64,
    pub win_rate: Option<f64>,
    pub pick_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArenaBuild {
    pub champion_id: i64,
    pub dt: i64,
    pub patch: Option<String>,
    pub augments: Vec<AugmentPick>,
    pub items: Vec<ItemSet>,
    pub prismatic_items: Vec<i64>,
}

impl ArenaBuild {
    pub fn item_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.items
            .iter()
            .flat_map(|set| set.items.iter().copied())
            .chain(self.prismatic_items.iter().copied())
    }
}

/// A resolved build, tagged by mode on the wire (`{"mode": "aram", ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BuildResult {
    Ranked(RiftBuild),
    Aram(RiftBuild),
    Arena(ArenaBuild),
}

impl BuildResult {
    pub fn mode(&self) -> GameMode {
        match self {
            BuildResult::Ranked(_) => GameMode::Ranked,
            BuildResult::Aram(_) => GameMode::Aram,
            BuildResult::Arena(_) => GameMode::Arena,
        }
    }

    pub fn champion_id(&self) -> i64 {
        match self {
            BuildResult::Ranked(b) | BuildResult::Aram(b) => b.champion_id,
            BuildResult::Arena(b) => b.champion_id,
        }
    }

    /// Fetch timestamp in epoch milliseconds; 0 when unknown.
    pub fn dt(&self) -> i64 {
        match self {
            BuildResult::Ranked(b) | BuildResult::Aram(b) => b.dt,
            BuildResult::Arena(b) => b.dt,
        }
    }

    pub fn set_dt(&mut self, dt: i64) {
        match self {
            BuildResult::Ranked(b) | BuildResult::Aram(b) => b.dt = dt,
            BuildResult::Arena(b) => b.dt = dt,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests and cache keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub mode: GameMode,
    pub champion_id: i64,
    pub champion_key: Option<String>,
    pub locale: Option<String>,
    pub region: Option<String>,
    pub tier: Option<String>,
}

impl BuildRequest {
    pub fn new(mode: GameMode, champion_id: i64) -> Self {
        Self {
            mode,
            champion_id,
            champion_key: None,
            locale: None,
            region: None,
            tier: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildCacheKey {
    pub mode: GameMode,
    pub champion_id: i64,
    pub locale: String,
    pub variant: String,
}

impl BuildCacheKey {
    pub fn for_request(request: &BuildRequest, variant: &str) -> Self {
        Self {
            mode: request.mode,
            champion_id: request.champion_id,
            locale: request.locale.clone().unwrap_or_default(),
            variant: variant.to_string(),
        }
    }
}
