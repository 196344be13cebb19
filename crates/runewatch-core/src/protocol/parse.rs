// Pure payload parsers: raw control-API / live-endpoint JSON to typed
// snapshots. None of these perform I/O; malformed input yields `None`,
// an empty collection, or a `MalformedPayload` error.

use serde::Deserialize;
use serde_json::Value;

use super::{
    GameflowSnapshot, LiveStatus, PlayerSlot, PlayerSnapshot, RecentMatch, SummonerInfo,
    TeamSession,
};
use crate::error::LcuError;

const RAW_CHAMPION_PREFIX: &str = "game_character_displayname_";

// ---------------------------------------------------------------------------
// Control API
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSummoner {
    #[serde(default)]
    puuid: String,
    summoner_id: Option<i64>,
    game_name: Option<String>,
    tag_line: Option<String>,
    display_name: Option<String>,
    profile_icon_id: Option<i64>,
    summoner_level: Option<i64>,
}

/// Parse `/lol-summoner/v1/current-summoner` or a by-puuid lookup.
///
/// A summoner without a puuid cannot key any cache, so it is rejected.
pub fn parse_summoner(value: &Value) -> Result<SummonerInfo, LcuError> {
    let raw: RawSummoner = serde_json::from_value(value.clone())?;
    if raw.puuid.trim().is_empty() {
        return Err(LcuError::MalformedPayload(
            "summoner payload has no puuid".to_string(),
        ));
    }
    Ok(SummonerInfo {
        puuid: raw.puuid,
        summoner_id: raw.summoner_id,
        game_name: non_empty(raw.game_name),
        tag_line: non_empty(raw.tag_line),
        display_name: non_empty(raw.display_name),
        profile_icon_id: raw.profile_icon_id,
        summoner_level: raw.summoner_level,
    })
}

/// Parse the gameflow-phase resource, a bare JSON string.
pub fn parse_phase(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse the current-champion resource, a bare integer. Zero means none.
pub fn parse_current_champion(value: &Value) -> Option<i64> {
    value.as_i64().filter(|id| *id > 0)
}

/// Parse `/lol-gameflow/v1/session` into phase and queue id.
pub fn parse_gameflow_session(value: &Value) -> GameflowSnapshot {
    let phase = value.get("phase").and_then(parse_phase);
    let queue_id = value
        .get("gameData")
        .and_then(|d| d.get("queue"))
        .and_then(|q| q.get("id"))
        .and_then(Value::as_i64)
        .filter(|id| *id > 0);
    GameflowSnapshot { phase, queue_id }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawTeamSession {
    local_player_cell_id: Option<i64>,
    my_team: Vec<RawSlot>,
    their_team: Vec<RawSlot>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSlot {
    cell_id: Option<i64>,
    puuid: Option<String>,
    champion_id: Option<i64>,
    champion_pick_intent: Option<i64>,
    assigned_position: Option<String>,
}

impl RawSlot {
    fn into_slot(self) -> Option<PlayerSlot> {
        let slot = PlayerSlot {
            cell_id: self.cell_id.filter(|id| *id >= 0),
            puuid: non_empty(self.puuid),
            champion_id: self.champion_id.filter(|id| *id > 0),
            champion_pick_intent: self.champion_pick_intent.filter(|id| *id > 0),
            assigned_position: non_empty(self.assigned_position),
        };
        slot.has_identity().then_some(slot)
    }
}

/// Parse `/lol-champ-select/v1/session`. Non-object payloads (including the
/// `null` delivered for a delete event) mean there is no session.
pub fn parse_team_session(value: &Value) -> Option<TeamSession> {
    if !value.is_object() {
        return None;
    }
    let raw: RawTeamSession = serde_json::from_value(value.clone()).ok()?;
    Some(TeamSession {
        local_player_cell_id: raw.local_player_cell_id,
        my_team: raw.my_team.into_iter().filter_map(RawSlot::into_slot).collect(),
        their_team: raw
            .their_team
            .into_iter()
            .filter_map(RawSlot::into_slot)
            .collect(),
    })
}

/// Parse the match-history document. Each game carries the queried
/// player's participant first.
pub fn parse_match_history(value: &Value) -> Vec<RecentMatch> {
    let Some(games) = value
        .get("games")
        .and_then(|g| g.get("games"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    games.iter().filter_map(parse_match).collect()
}

fn parse_match(game: &Value) -> Option<RecentMatch> {
    let game_id = game.get("gameId")?.as_i64()?;
    let participant = game
        .get("participants")
        .and_then(Value::as_array)
        .and_then(|p| p.first());
    let stats = participant.and_then(|p| p.get("stats"));
    let stat = |key: &str| {
        stats
            .and_then(|s| s.get(key))
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };

    Some(RecentMatch {
        game_id,
        queue_id: game.get("queueId").and_then(Value::as_i64),
        champion_id: participant
            .and_then(|p| p.get("championId"))
            .and_then(Value::as_i64)
            .filter(|id| *id > 0),
        win: stats.and_then(|s| s.get("win")).and_then(Value::as_bool),
        kills: stat("kills"),
        deaths: stat("deaths"),
        assists: stat("assists"),
        game_creation: game.get("gameCreation").and_then(Value::as_i64),
        game_duration_secs: game.get("gameDuration").and_then(Value::as_i64),
    })
}

// ---------------------------------------------------------------------------
// Live endpoint
// ---------------------------------------------------------------------------

/// Parse an `allgamedata` document into a connected `LiveStatus`.
///
/// Returns `None` unless the document is an object carrying an `allPlayers`
/// array or a `gameData` object; the endpoint answers some non-game states
/// with a 2xx error body. `resolve` maps a champion display name or key to
/// its numeric id.
pub fn parse_live_game<F>(value: &Value, resolve: F) -> Option<LiveStatus>
where
    F: Fn(&str) -> Option<i64>,
{
    let has_players = value.get("allPlayers").is_some_and(Value::is_array);
    let has_game_data = value.get("gameData").is_some_and(Value::is_object);
    if !value.is_object() || !(has_players || has_game_data) {
        return None;
    }

    let active_names = active_player_names(value.get("activePlayer"));

    let all_players: Vec<PlayerSnapshot> = value
        .get("allPlayers")
        .and_then(Value::as_array)
        .map(|players| {
            players
                .iter()
                .map(|p| parse_live_player(p, &resolve))
                .collect()
        })
        .unwrap_or_default();

    let me = value
        .get("allPlayers")
        .and_then(Value::as_array)
        .and_then(|players| {
            players
                .iter()
                .position(|p| player_matches(p, &active_names))
                .and_then(|idx| all_players.get(idx))
        });

    let champion_name = me.and_then(|p| p.champion_name.clone());
    let champion_id = me.and_then(|p| p.champion_id);

    Some(LiveStatus {
        connected: true,
        champion_name,
        champion_id,
        game_mode: value
            .get("gameData")
            .and_then(|d| d.get("gameMode"))
            .and_then(Value::as_str)
            .map(str::to_string),
        active_player_name: active_names.into_iter().next(),
        all_players,
    })
}

fn parse_live_player<F>(player: &Value, resolve: &F) -> PlayerSnapshot
where
    F: Fn(&str) -> Option<i64>,
{
    let text = |key: &str| {
        player
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let champion_name = text("championName");
    let raw_key = text("rawChampionName").map(|raw| {
        raw.strip_prefix(RAW_CHAMPION_PREFIX)
            .map(str::to_string)
            .unwrap_or(raw)
    });
    let champion_id = raw_key
        .as_deref()
        .and_then(|k| resolve(k))
        .or_else(|| champion_name.as_deref().and_then(|n| resolve(n)));

    PlayerSnapshot {
        team: text("team"),
        summoner_name: text("riotId").or_else(|| text("summonerName")),
        champion_name,
        champion_id,
        is_bot: player.get("isBot").and_then(Value::as_bool),
    }
}

/// Every name the active player may appear under in `allPlayers`, most
/// specific first.
fn active_player_names(active: Option<&Value>) -> Vec<String> {
    let Some(active) = active else {
        return Vec::new();
    };
    ["riotId", "summonerName", "riotIdGameName"]
        .iter()
        .filter_map(|key| active.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn player_matches(player: &Value, names: &[String]) -> bool {
    ["riotId", "summonerName", "riotIdGameName"]
        .iter()
        .filter_map(|key| player.get(*key).and_then(Value::as_str))
        .any(|candidate| names.iter().any(|n| n.eq_ignore_ascii_case(candidate.trim())))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
