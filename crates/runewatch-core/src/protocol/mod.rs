// Read models shared by the connector, the live watcher, and the context
// manager, plus the pure parsers that build them from raw payloads.

pub mod parse;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle phases of the local client that the core reacts to.
pub mod phase {
    pub const CHAMP_SELECT: &str = "ChampSelect";
    pub const IN_PROGRESS: &str = "InProgress";
    pub const LOBBY: &str = "Lobby";
}

// ---------------------------------------------------------------------------
// Control API status
// ---------------------------------------------------------------------------

/// Derived view of the local client, maintained by the connector.
///
/// When `connected` is false every derived field is cleared except the
/// last-known `summoner`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatus {
    pub connected: bool,
    pub phase: Option<String>,
    pub current_champion_id: Option<i64>,
    pub queue_id: Option<i64>,
    pub in_progress: Option<bool>,
    pub session: Option<TeamSession>,
    pub summoner: Option<SummonerInfo>,
}

impl ClientStatus {
    /// A disconnected status that keeps `summoner` for display continuity.
    pub fn disconnected(summoner: Option<SummonerInfo>) -> Self {
        Self {
            summoner,
            ..Self::default()
        }
    }

    pub fn phase_is(&self, phase: &str) -> bool {
        self.phase.as_deref() == Some(phase)
    }

    /// True during champ select or a running match.
    pub fn in_game_phase(&self) -> bool {
        self.phase_is(phase::CHAMP_SELECT) || self.phase_is(phase::IN_PROGRESS)
    }

    /// The champion the local player has locked: the current-champion value,
    /// or the local slot's pick in the team session.
    pub fn locked_champion_id(&self) -> Option<i64> {
        self.current_champion_id
            .filter(|id| *id > 0)
            .or_else(|| {
                self.session
                    .as_ref()
                    .and_then(|s| s.local_slot())
                    .and_then(|slot| slot.champion_id)
            })
            .filter(|id| *id > 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSession {
    pub local_player_cell_id: Option<i64>,
    pub my_team: Vec<PlayerSlot>,
    pub their_team: Vec<PlayerSlot>,
}

impl TeamSession {
    pub fn local_slot(&self) -> Option<&PlayerSlot> {
        let cell = self.local_player_cell_id?;
        self.my_team.iter().find(|slot| slot.cell_id == Some(cell))
    }
}

/// One champ-select participant. `champion_id` is the locked pick,
/// `champion_pick_intent` the hovered one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSlot {
    pub cell_id: Option<i64>,
    pub puuid: Option<String>,
    pub champion_id: Option<i64>,
    pub champion_pick_intent: Option<i64>,
    pub assigned_position: Option<String>,
}

impl PlayerSlot {
    /// A slot needs at least one of champion, puuid or cell id to be kept.
    pub fn has_identity(&self) -> bool {
        self.champion_id.is_some() || self.puuid.is_some() || self.cell_id.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonerInfo {
    pub puuid: String,
    pub summoner_id: Option<i64>,
    pub game_name: Option<String>,
    pub tag_line: Option<String>,
    pub display_name: Option<String>,
    pub profile_icon_id: Option<i64>,
    pub summoner_level: Option<i64>,
}

impl SummonerInfo {
    /// `name#tag` when both parts are known, else the legacy display name.
    pub fn riot_id(&self) -> Option<String> {
        match (&self.game_name, &self.tag_line) {
            (Some(name), Some(tag)) => Some(format!("{name}#{tag}")),
            (Some(name), None) => Some(name.clone()),
            _ => self.display_name.clone(),
        }
    }
}

/// Phase and queue reported by the gameflow session resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameflowSnapshot {
    pub phase: Option<String>,
    pub queue_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Career lookups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentMatch {
    pub game_id: i64,
    pub queue_id: Option<i64>,
    pub champion_id: Option<i64>,
    pub win: Option<bool>,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub game_creation: Option<i64>,
    pub game_duration_secs: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCareerSnapshot {
    pub summoner: SummonerInfo,
    pub recent_matches: Vec<RecentMatch>,
    pub fetched_at: DateTime<Utc>,
}

impl PlayerCareerSnapshot {
    pub fn wins(&self) -> usize {
        self.recent_matches
            .iter()
            .filter(|m| m.win == Some(true))
            .count()
    }

    pub fn losses(&self) -> usize {
        self.recent_matches
            .iter()
            .filter(|m| m.win == Some(false))
            .count()
    }

    /// (kills + assists) / deaths over the recent matches; deaths of zero
    /// count as one.
    pub fn kda(&self) -> f64 {
        let (k, d, a) = self
            .recent_matches
            .iter()
            .fold((0u64, 0u64, 0u64), |(k, d, a), m| {
                (
                    k + u64::from(m.kills),
                    d + u64::from(m.deaths),
                    a + u64::from(m.assists),
                )
            });
        (k + a) as f64 / d.max(1) as f64
    }
}

// ---------------------------------------------------------------------------
// Live endpoint status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    pub connected: bool,
    pub champion_name: Option<String>,
    pub champion_id: Option<i64>,
    pub game_mode: Option<String>,
    pub active_player_name: Option<String>,
    pub all_players: Vec<PlayerSnapshot>,
}

impl LiveStatus {
    pub fn disconnected() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub team: Option<String>,
    pub summoner_name: Option<String>,
    pub champion_name: Option<String>,
    pub champion_id: Option<i64>,
    pub is_bot: Option<bool>,
}
