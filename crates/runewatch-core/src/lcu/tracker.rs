// Pure `ClientStatus` state machine. The connector feeds it socket events
// and refresh results; it returns the notifications to emit, in order.

use crate::lcu::endpoints;
use crate::lcu::transport::SocketEvent;
use crate::protocol::parse::{
    parse_current_champion, parse_gameflow_session, parse_phase, parse_team_session,
};
use crate::protocol::{phase, ClientStatus, GameflowSnapshot, SummonerInfo, TeamSession};

/// Notifications pushed upward by the connector.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    /// The derived client status after any update.
    Status(ClientStatus),
    /// Edge-triggered: a new non-zero champion id became current.
    ChampionChanged(i64),
}

/// Outcome of one resource request during a full refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Value(T),
    /// The resource does not exist right now (HTTP 404).
    Missing,
    /// Transport or decode failure; the previous value is kept.
    Failed,
}

/// Results of the eager refresh issued on connect and by `refresh_now`.
#[derive(Debug, Clone)]
pub struct Refresh {
    pub summoner: Fetched<SummonerInfo>,
    pub phase: Fetched<String>,
    pub gameflow: Fetched<GameflowSnapshot>,
    pub current_champion: Fetched<Option<i64>>,
    pub session: Fetched<Option<TeamSession>>,
}

#[derive(Debug, Default)]
pub struct StatusTracker {
    status: ClientStatus,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &ClientStatus {
        &self.status
    }

    pub fn set_connected(&mut self) -> Vec<ConnectorEvent> {
        self.status.connected = true;
        vec![ConnectorEvent::Status(self.status.clone())]
    }

    /// Clear everything but the summoner. Emits only if something changed.
    pub fn set_disconnected(&mut self) -> Vec<ConnectorEvent> {
        let next = ClientStatus::disconnected(self.status.summoner.clone());
        if next == self.status {
            return Vec::new();
        }
        self.status = next;
        vec![ConnectorEvent::Status(self.status.clone())]
    }

    /// Apply one pushed change. Events for resources the tracker does not
    /// follow produce nothing.
    pub fn apply_event(&mut self, event: &SocketEvent) -> Vec<ConnectorEvent> {
        if !self.status.connected {
            return Vec::new();
        }
        let previous_champion = self.status.current_champion_id;
        match event.uri.as_str() {
            endpoints::GAMEFLOW_PHASE => self.set_phase(parse_phase(&event.payload)),
            endpoints::GAMEFLOW_SESSION => {
                self.apply_gameflow(parse_gameflow_session(&event.payload))
            }
            endpoints::CURRENT_CHAMPION => {
                self.status.current_champion_id = parse_current_champion(&event.payload)
            }
            endpoints::CHAMP_SELECT_SESSION => {
                self.status.session = parse_team_session(&event.payload)
            }
            _ => return Vec::new(),
        }
        self.emit(previous_champion)
    }

    /// Apply a full refresh as a single update.
    pub fn apply_refresh(&mut self, refresh: Refresh) -> Vec<ConnectorEvent> {
        if !self.status.connected {
            return Vec::new();
        }
        let previous_champion = self.status.current_champion_id;

        if let Fetched::Value(summoner) = refresh.summoner {
            self.status.summoner = Some(summoner);
        }
        if let Fetched::Value(snapshot) = refresh.gameflow {
            self.apply_gameflow(snapshot);
        }
        if let Fetched::Value(phase) = refresh.phase {
            self.set_phase(Some(phase));
        }

        // Outside champ select these resources 404 as a matter of course;
        // the phase rule already cleared what needs clearing.
        let in_champ_select = self.status.phase_is(phase::CHAMP_SELECT);
        match refresh.current_champion {
            Fetched::Value(id) => self.status.current_champion_id = id,
            Fetched::Missing if in_champ_select => self.status.current_champion_id = None,
            _ => {}
        }
        match refresh.session {
            Fetched::Value(session) => self.status.session = session,
            Fetched::Missing if in_champ_select => self.status.session = None,
            _ => {}
        }

        self.emit(previous_champion)
    }

    fn apply_gameflow(&mut self, snapshot: GameflowSnapshot) {
        self.status.queue_id = snapshot.queue_id;
        if snapshot.phase.is_some() {
            self.set_phase(snapshot.phase);
        }
    }

    /// Leaving champ select drops the current champion; leaving both champ
    /// select and the match also drops the team session.
    fn set_phase(&mut self, next: Option<String>) {
        let next_is = |p: &str| next.as_deref() == Some(p);
        if !next_is(phase::CHAMP_SELECT) {
            self.status.current_champion_id = None;
            if !next_is(phase::IN_PROGRESS) {
                self.status.session = None;
            }
        }
        self.status.in_progress = next.as_ref().map(|p| p == phase::IN_PROGRESS);
        self.status.phase = next;
    }

    fn emit(&self, previous_champion: Option<i64>) -> Vec<ConnectorEvent> {
        let mut events = vec![ConnectorEvent::Status(self.status.clone())];
        if let Some(id) = self.status.current_champion_id {
            if id > 0 && previous_champion != Some(id) {
                events.push(ConnectorEvent::ChampionChanged(id));
            }
        }
        events
    }
}
