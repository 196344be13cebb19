// The reconciled "current game" view and its change signature.

use serde::Serialize;

use crate::build::{BuildResult, GameMode};
use crate::protocol::{ClientStatus, LiveStatus, PlayerSlot, PlayerSnapshot};

/// Which source the detected champion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChampionSource {
    Client,
    LiveEndpoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameContext {
    /// Supported build mode, if the current queue (or live game mode) has one.
    pub mode: Option<GameMode>,
    pub is_supported_mode: bool,
    /// Champ select, a running match, or a reachable live endpoint.
    pub is_game_related: bool,
    pub detected_champion_id: Option<i64>,
    pub detected_champion_source: Option<ChampionSource>,
    pub client: ClientStatus,
    pub live: LiveStatus,
}

impl GameContext {
    /// Reconcile both sources. Pure; the manager calls this on every update.
    pub fn derive(client: &ClientStatus, live: &LiveStatus) -> Self {
        let is_game_related = client.in_game_phase() || live.connected;

        let mode = match client.queue_id {
            Some(queue) => GameMode::from_queue(queue),
            None if live.connected => live
                .game_mode
                .as_deref()
                .and_then(GameMode::from_live_game_mode),
            None => None,
        };

        let from_client = client
            .in_game_phase()
            .then(|| client.locked_champion_id())
            .flatten();
        let (detected_champion_id, detected_champion_source) = match from_client {
            Some(id) => (Some(id), Some(ChampionSource::Client)),
            None => match live.champion_id.filter(|_| live.connected) {
                Some(id) => (Some(id), Some(ChampionSource::LiveEndpoint)),
                None => (None, None),
            },
        };

        Self {
            mode,
            is_supported_mode: mode.is_some(),
            is_game_related,
            detected_champion_id,
            detected_champion_source,
            client: client.clone(),
            live: live.clone(),
        }
    }

    pub fn has_build_target(&self) -> bool {
        self.is_supported_mode && self.detected_champion_id.is_some()
    }

    /// Change-detection key over the fields consumers react to. Two contexts
    /// with equal signatures are treated as the same context.
    pub fn signature(&self) -> String {
        let session = self.client.session.as_ref();
        let sig = Signature {
            mode: self.mode,
            is_game_related: self.is_game_related,
            detected_champion_id: self.detected_champion_id,
            detected_champion_source: self.detected_champion_source,
            connected: self.client.connected,
            phase: self.client.phase.as_deref(),
            queue_id: self.client.queue_id,
            current_champion_id: self.client.current_champion_id,
            summoner: self.client.summoner.as_ref().map(|s| s.puuid.as_str()),
            local_cell: session.and_then(|s| s.local_player_cell_id),
            my_team: session.map(|s| s.my_team.as_slice()).unwrap_or_default(),
            their_team: session.map(|s| s.their_team.as_slice()).unwrap_or_default(),
            live_connected: self.live.connected,
            live_champion: self.live.champion_id,
            live_game_mode: self.live.game_mode.as_deref(),
            live_player: self.live.active_player_name.as_deref(),
            live_roster: &self.live.all_players,
        };
        serde_json::to_string(&sig).unwrap_or_default()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Signature<'a> {
    mode: Option<GameMode>,
    is_game_related: bool,
    detected_champion_id: Option<i64>,
    detected_champion_source: Option<ChampionSource>,
    connected: bool,
    phase: Option<&'a str>,
    queue_id: Option<i64>,
    current_champion_id: Option<i64>,
    summoner: Option<&'a str>,
    local_cell: Option<i64>,
    my_team: &'a [PlayerSlot],
    their_team: &'a [PlayerSlot],
    live_connected: bool,
    live_champion: Option<i64>,
    live_game_mode: Option<&'a str>,
    live_player: Option<&'a str>,
    live_roster: &'a [PlayerSnapshot],
}

/// Notifications published by the context manager, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextEvent {
    /// The context changed in a significant field.
    Changed(GameContext),
    /// A new champion (or mode) with a supported mode; a build fetch is
    /// scheduled.
    DetectedChampionChanged(GameContext),
    /// The active build was replaced or cleared.
    ActiveBuildChanged(Option<BuildResult>),
    /// The context stopped being game related.
    GameEnded(GameContext),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{phase, SummonerInfo, TeamSession};

    fn client(phase: &str, queue: Option<i64>, champion: Option<i64>) -> ClientStatus {
        ClientStatus {
            connected: true,
            phase: Some(phase.to_string()),
            queue_id: queue,
            current_champion_id: champion,
            ..ClientStatus::default()
        }
    }

    fn live(champion: i64, mode: &str) -> LiveStatus {
        LiveStatus {
            connected: true,
            champion_id: Some(champion),
            champion_name: Some("Garen".into()),
            game_mode: Some(mode.into()),
            ..LiveStatus::default()
        }
    }

    #[test]
    fn client_champion_wins_in_champ_select() {
        let ctx = GameContext::derive(
            &client(phase::CHAMP_SELECT, Some(420), Some(103)),
            &live(86, "CLASSIC"),
        );
        assert_eq!(ctx.mode, Some(GameMode::Ranked));
        assert!(ctx.is_supported_mode);
        assert!(ctx.is_game_related);
        assert_eq!(ctx.detected_champion_id, Some(103));
        assert_eq!(ctx.detected_champion_source, Some(ChampionSource::Client));
    }

    #[test]
    fn live_champion_is_the_fallback() {
        let ctx = GameContext::derive(&ClientStatus::default(), &live(86, "ARAM"));
        assert_eq!(ctx.mode, Some(GameMode::Aram));
        assert_eq!(ctx.detected_champion_id, Some(86));
        assert_eq!(ctx.detected_champion_source, Some(ChampionSource::LiveEndpoint));

        // Outside champ select / the match the client's champion is ignored.
        let lobby = client(phase::LOBBY, Some(450), Some(103));
        let ctx = GameContext::derive(&lobby, &live(86, "ARAM"));
        assert_eq!(ctx.detected_champion_id, Some(86));
    }

    #[test]
    fn session_pick_backs_up_current_champion() {
        let mut status = client(phase::IN_PROGRESS, Some(1700), None);
        status.session = Some(TeamSession {
            local_player_cell_id: Some(2),
            my_team: vec![PlayerSlot {
                cell_id: Some(2),
                champion_id: Some(222),
                ..PlayerSlot::default()
            }],
            ..TeamSession::default()
        });
        let ctx = GameContext::derive(&status, &LiveStatus::disconnected());
        assert_eq!(ctx.mode, Some(GameMode::Arena));
        assert_eq!(ctx.detected_champion_id, Some(222));
    }

    #[test]
    fn unsupported_queue_does_not_fall_back_to_live_mode() {
        let ctx = GameContext::derive(
            &client(phase::IN_PROGRESS, Some(830), Some(1)),
            &live(1, "CLASSIC"),
        );
        assert_eq!(ctx.mode, None);
        assert!(!ctx.is_supported_mode);
        assert!(!ctx.has_build_target());
    }

    #[test]
    fn idle_client_is_not_game_related() {
        let ctx = GameContext::derive(&client(phase::LOBBY, Some(420), None), &LiveStatus::default());
        assert!(!ctx.is_game_related);
        assert_eq!(ctx.detected_champion_id, None);
    }

    #[test]
    fn signature_ignores_insignificant_fields() {
        let mut a = client(phase::CHAMP_SELECT, Some(420), Some(103));
        a.summoner = Some(SummonerInfo {
            puuid: "me".into(),
            summoner_level: Some(30),
            ..SummonerInfo::default()
        });
        let mut b = a.clone();
        if let Some(s) = b.summoner.as_mut() {
            s.summoner_level = Some(31);
        }
        let live = LiveStatus::default();
        assert_eq!(
            GameContext::derive(&a, &live).signature(),
            GameContext::derive(&b, &live).signature()
        );
    }

    #[test]
    fn signature_tracks_pick_intent() {
        let slot = PlayerSlot {
            cell_id: Some(0),
            ..PlayerSlot::default()
        };
        let mut a = client(phase::CHAMP_SELECT, Some(420), None);
        a.session = Some(TeamSession {
            local_player_cell_id: Some(0),
            my_team: vec![slot.clone()],
            ..TeamSession::default()
        });
        let mut b = a.clone();
        if let Some(session) = b.session.as_mut() {
            session.my_team[0].champion_pick_intent = Some(55);
        }
        let live = LiveStatus::default();
        assert_ne!(
            GameContext::derive(&a, &live).signature(),
            GameContext::derive(&b, &live).signature()
        );
    }
}
