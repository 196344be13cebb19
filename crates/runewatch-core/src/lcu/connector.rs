// Connection driver for the client control API.
//
// One background task owns the probe timer and the event socket. Status
// updates are applied under a std mutex and sent on an unbounded channel
// while the lock is held, so consumers see them in arrival order.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::endpoints;
use super::tracker::{ConnectorEvent, Fetched, Refresh, StatusTracker};
use super::transport::{LcuApi, LcuTransport, SocketEvent};
use crate::credentials::CredentialSource;
use crate::error::LcuError;
use crate::protocol::parse::{
    parse_current_champion, parse_gameflow_session, parse_match_history, parse_phase,
    parse_summoner, parse_team_session,
};
use crate::protocol::{ClientStatus, PlayerCareerSnapshot, SummonerInfo};
use crate::throttle::{Backoff, LogThrottle};
use crate::ttl_cache::TtlCache;

/// Timing and cache parameters, normally built from the `[lcu]` and
/// `[cache]` config sections.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub probe_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_factor: f64,
    pub backoff_max: Duration,
    pub missing_credentials_log_interval: Duration,
    pub career_ttl: Duration,
    pub summoner_ttl: Duration,
    pub lookup_capacity: usize,
    pub match_history_count: usize,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(2),
            backoff_base: Duration::from_secs(2),
            backoff_factor: 1.5,
            backoff_max: Duration::from_secs(15),
            missing_credentials_log_interval: Duration::from_secs(30),
            career_ttl: Duration::from_secs(45),
            summoner_ttl: Duration::from_secs(20),
            lookup_capacity: 256,
            match_history_count: 20,
        }
    }
}

enum Link {
    Disconnected,
    Connecting,
    Connected {
        api: Arc<dyn LcuApi>,
        reader: Option<JoinHandle<()>>,
    },
}

struct ConnectorState {
    tracker: StatusTracker,
    link: Link,
    /// Bumped on every disconnect; work started under an older epoch is
    /// discarded when it completes.
    epoch: u64,
    backoff: Backoff,
    /// Set by `refresh_now`; the next probe ignores the backoff.
    forced_probe: bool,
    probe_log: LogThrottle,
    careers: TtlCache<String, PlayerCareerSnapshot>,
    summoners: TtlCache<String, SummonerInfo>,
}

impl ConnectorState {
    fn connected_api(&self) -> Option<(Arc<dyn LcuApi>, u64)> {
        match &self.link {
            Link::Connected { api, .. } => Some((Arc::clone(api), self.epoch)),
            _ => None,
        }
    }

    /// Drop the link, invalidate in-flight work, and forget cached lookups.
    fn teardown(&mut self) -> Vec<ConnectorEvent> {
        if let Link::Connected {
            reader: Some(reader),
            ..
        } = std::mem::replace(&mut self.link, Link::Disconnected)
        {
            reader.abort();
        }
        self.epoch += 1;
        self.careers.clear();
        self.summoners.clear();
        self.tracker.set_disconnected()
    }
}

struct Shared {
    source: Arc<dyn CredentialSource>,
    transport: Arc<dyn LcuTransport>,
    settings: ConnectorSettings,
    state: Mutex<ConnectorState>,
    events: mpsc::UnboundedSender<ConnectorEvent>,
    wake: Notify,
}

/// Owns credential discovery, the event socket, and the lookup caches.
pub struct LcuConnector {
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl LcuConnector {
    pub fn new(
        source: Arc<dyn CredentialSource>,
        transport: Arc<dyn LcuTransport>,
        settings: ConnectorSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectorEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let state = ConnectorState {
            tracker: StatusTracker::new(),
            link: Link::Disconnected,
            epoch: 0,
            backoff: Backoff::new(
                settings.backoff_base,
                settings.backoff_factor,
                settings.backoff_max,
            ),
            forced_probe: false,
            probe_log: LogThrottle::new(settings.missing_credentials_log_interval),
            careers: TtlCache::new(settings.career_ttl, settings.lookup_capacity),
            summoners: TtlCache::new(settings.summoner_ttl, settings.lookup_capacity),
        };
        let shared = Arc::new(Shared {
            source,
            transport,
            settings,
            state: Mutex::new(state),
            events,
            wake: Notify::new(),
        });
        (
            Self {
                shared,
                driver: Mutex::new(None),
            },
            rx,
        )
    }

    /// Start probing. The first probe runs immediately. Calling `start`
    /// while already running does nothing.
    pub fn start(&self) {
        let mut driver = self.driver_slot();
        if driver.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        info!("starting control API connector");
        *driver = Some(tokio::spawn(drive(Arc::clone(&self.shared))));
    }

    /// Stop probing, close the socket, and clear the lookup caches. The last
    /// known summoner is kept in the status.
    pub fn stop(&self) {
        if let Some(task) = self.driver_slot().take() {
            task.abort();
            info!("stopped control API connector");
        }
        let mut state = self.shared.state();
        state.backoff.reset();
        state.forced_probe = false;
        state.probe_log.reset();
        let events = state.teardown();
        self.shared.emit(events);
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state().connected_api().is_some()
    }

    pub fn status(&self) -> ClientStatus {
        self.shared.state().tracker.status().clone()
    }

    /// Probe right away, even while backing off, and, when connected,
    /// re-fetch every derived field.
    pub async fn refresh_now(&self) {
        self.shared.state().forced_probe = true;
        self.shared.wake.notify_one();
        self.shared.refresh_all().await;
    }

    /// Summoner profile plus recent matches for `puuid`.
    pub async fn get_player_career(&self, puuid: &str) -> Result<PlayerCareerSnapshot, LcuError> {
        let key = puuid.to_string();
        let (api, epoch) = {
            let mut state = self.shared.state();
            let connected = state.connected_api().ok_or(LcuError::NotConnected)?;
            if let Some(hit) = state.careers.get(&key) {
                return Ok(hit);
            }
            connected
        };

        let summoner_path = endpoints::summoner_by_puuid(puuid);
        let history_path =
            endpoints::match_history(puuid, self.shared.settings.match_history_count);
        let (summoner, history) =
            tokio::join!(api.request(&summoner_path), api.request(&history_path));
        let summoner = parse_summoner(&summoner?)?;
        let snapshot = PlayerCareerSnapshot {
            summoner: summoner.clone(),
            recent_matches: parse_match_history(&history?),
            fetched_at: Utc::now(),
        };

        let mut state = self.shared.state();
        if state.epoch == epoch {
            state.summoners.insert(key.clone(), summoner);
            state.careers.insert(key, snapshot.clone());
        }
        Ok(snapshot)
    }

    pub async fn get_summoner_by_id(&self, puuid: &str) -> Result<SummonerInfo, LcuError> {
        let key = puuid.to_string();
        let (api, epoch) = {
            let mut state = self.shared.state();
            let connected = state.connected_api().ok_or(LcuError::NotConnected)?;
            if let Some(hit) = state.summoners.get(&key) {
                return Ok(hit);
            }
            connected
        };

        let payload = api.request(&endpoints::summoner_by_puuid(puuid)).await?;
        let summoner = parse_summoner(&payload)?;

        let mut state = self.shared.state();
        if state.epoch == epoch {
            state.summoners.insert(key, summoner.clone());
        }
        Ok(summoner)
    }

    fn driver_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.driver.lock().expect("connector driver mutex poisoned")
    }
}

impl Drop for LcuConnector {
    fn drop(&mut self) {
        if let Ok(mut driver) = self.driver.lock() {
            if let Some(task) = driver.take() {
                task.abort();
            }
        }
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ConnectorState> {
        self.state.lock().expect("connector state mutex poisoned")
    }

    fn emit(&self, events: Vec<ConnectorEvent>) {
        for event in events {
            // A dropped receiver only means nobody is listening any more.
            let _ = self.events.send(event);
        }
    }

    /// One connection attempt. Returns the event receiver on success.
    async fn probe(&self) -> Option<mpsc::Receiver<SocketEvent>> {
        let epoch = {
            let mut state = self.state();
            let forced = std::mem::take(&mut state.forced_probe);
            if !matches!(state.link, Link::Disconnected)
                || !(forced || state.backoff.ready(Instant::now()))
            {
                return None;
            }
            state.link = Link::Connecting;
            state.epoch
        };

        let source = Arc::clone(&self.source);
        let found = tokio::task::spawn_blocking(move || source.discover())
            .await
            .ok()
            .flatten();

        let Some(credentials) = found else {
            let mut state = self.state();
            if matches!(state.link, Link::Connecting) {
                state.link = Link::Disconnected;
            }
            let now = Instant::now();
            let delay = state.backoff.record_failure(now);
            if state.probe_log.allow(now) {
                info!("client not detected; next probe in {:.1}s", delay.as_secs_f64());
            }
            return None;
        };

        let connected = self
            .transport
            .connect(&credentials, endpoints::SUBSCRIBED)
            .await;

        let events_rx = {
            let mut state = self.state();
            let session = match connected {
                Ok(session) => session,
                Err(e) => {
                    if matches!(state.link, Link::Connecting) {
                        state.link = Link::Disconnected;
                    }
                    let now = Instant::now();
                    let delay = state.backoff.record_failure(now);
                    if state.probe_log.allow(now) {
                        warn!(
                            port = credentials.port,
                            "control API connect failed: {e}; retrying in {:.1}s",
                            delay.as_secs_f64()
                        );
                    } else {
                        debug!("control API connect failed: {e}");
                    }
                    return None;
                }
            };

            // Stopped while connecting.
            if state.epoch != epoch || !matches!(state.link, Link::Connecting) {
                if let Some(reader) = session.reader {
                    reader.abort();
                }
                return None;
            }

            state.backoff.reset();
            state.probe_log.reset();
            state.link = Link::Connected {
                api: Arc::clone(&session.api),
                reader: session.reader,
            };
            let events = state.tracker.set_connected();
            self.emit(events);
            session.events
        };
        info!(port = credentials.port, "connected to client control API");

        self.refresh_all().await;
        Some(events_rx)
    }

    /// Re-fetch every derived field in parallel and apply the results as one
    /// update, unless the link changed meanwhile.
    async fn refresh_all(&self) {
        let Some((api, epoch)) = self.state().connected_api() else {
            return;
        };

        let (summoner, phase, gameflow, champion, session) = tokio::join!(
            api.request(endpoints::CURRENT_SUMMONER),
            api.request(endpoints::GAMEFLOW_PHASE),
            api.request(endpoints::GAMEFLOW_SESSION),
            api.request(endpoints::CURRENT_CHAMPION),
            api.request(endpoints::CHAMP_SELECT_SESSION),
        );

        let refresh = Refresh {
            summoner: fetched(summoner, |v| parse_summoner(v).ok()),
            phase: fetched(phase, parse_phase),
            gameflow: fetched(gameflow, |v| Some(parse_gameflow_session(v))),
            current_champion: fetched(champion, |v| Some(parse_current_champion(v))),
            session: fetched(session, |v| Some(parse_team_session(v))),
        };

        let mut state = self.state();
        if state.epoch != epoch {
            debug!("discarding control API refresh from a closed connection");
            return;
        }
        let events = state.tracker.apply_refresh(refresh);
        self.emit(events);
    }

    fn apply_socket_event(&self, event: SocketEvent) {
        let mut state = self.state();
        let events = state.tracker.apply_event(&event);
        if events.is_empty() {
            debug!(uri = %event.uri, "ignoring control API event");
        }
        self.emit(events);
    }

    fn socket_closed(&self) {
        let mut state = self.state();
        if !matches!(state.link, Link::Connected { .. }) {
            return;
        }
        warn!("control API connection lost");
        let events = state.teardown();
        self.emit(events);
    }
}

fn fetched<T>(
    result: Result<Value, LcuError>,
    parse: impl FnOnce(&Value) -> Option<T>,
) -> Fetched<T> {
    match result {
        Ok(value) => parse(&value).map_or(Fetched::Failed, Fetched::Value),
        Err(LcuError::NotFound) => Fetched::Missing,
        Err(e) => {
            debug!("control API refresh request failed: {e}");
            Fetched::Failed
        }
    }
}

enum Wake {
    Probe,
    Socket(Option<SocketEvent>),
}

async fn next_socket_event(socket: &mut Option<mpsc::Receiver<SocketEvent>>) -> Option<SocketEvent> {
    match socket {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn drive(shared: Arc<Shared>) {
    let mut probe = tokio::time::interval(shared.settings.probe_interval);
    probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut socket: Option<mpsc::Receiver<SocketEvent>> = None;

    loop {
        let wake = tokio::select! {
            _ = probe.tick() => Wake::Probe,
            _ = shared.wake.notified() => Wake::Probe,
            event = next_socket_event(&mut socket) => Wake::Socket(event),
        };

        match wake {
            Wake::Socket(Some(event)) => shared.apply_socket_event(event),
            Wake::Socket(None) => {
                socket = None;
                shared.socket_closed();
            }
            Wake::Probe => {
                if socket.is_none() {
                    socket = shared.probe().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;
    use crate::lcu::transport::LcuSession;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        available: Mutex<bool>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(available: bool) -> Arc<Self> {
            Arc::new(Self {
                available: Mutex::new(available),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl CredentialSource for FakeSource {
        fn discover(&self) -> Option<Credentials> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.available
                .lock()
                .unwrap()
                .then(|| Credentials::new(50000, "token"))
        }
    }

    #[derive(Default)]
    struct FakeApi {
        responses: Mutex<HashMap<String, Value>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn set(&self, endpoint: &str, value: Value) {
            self.responses
                .lock()
                .unwrap()
                .insert(endpoint.to_string(), value);
        }

        fn calls_to(&self, endpoint: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.as_str() == endpoint)
                .count()
        }
    }

    #[async_trait]
    impl LcuApi for FakeApi {
        async fn request(&self, endpoint: &str) -> Result<Value, LcuError> {
            self.calls.lock().unwrap().push(endpoint.to_string());
            self.responses
                .lock()
                .unwrap()
                .get(endpoint)
                .cloned()
                .ok_or(LcuError::NotFound)
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        api: Arc<FakeApi>,
        sockets: Mutex<Vec<mpsc::Sender<SocketEvent>>>,
        connects: AtomicUsize,
    }

    impl FakeTransport {
        fn push(&self, uri: &str, payload: Value) {
            let tx = self.sockets.lock().unwrap().last().cloned().unwrap();
            tx.try_send(SocketEvent::new(uri, payload)).unwrap();
        }

        fn close(&self) {
            self.sockets.lock().unwrap().clear();
        }

        fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LcuTransport for FakeTransport {
        async fn connect(
            &self,
            _credentials: &Credentials,
            resources: &[&str],
        ) -> Result<LcuSession, LcuError> {
            assert_eq!(resources, endpoints::SUBSCRIBED);
            self.connects.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(64);
            self.sockets.lock().unwrap().push(tx);
            Ok(LcuSession {
                api: self.api.clone(),
                events: rx,
                reader: None,
            })
        }
    }

    fn seed_champ_select(api: &FakeApi) {
        api.set(
            endpoints::CURRENT_SUMMONER,
            json!({ "puuid": "me", "gameName": "Me", "tagLine": "EUW" }),
        );
        api.set(endpoints::GAMEFLOW_PHASE, json!("ChampSelect"));
        api.set(
            endpoints::GAMEFLOW_SESSION,
            json!({ "phase": "ChampSelect", "gameData": { "queue": { "id": 420 } } }),
        );
        api.set(endpoints::CURRENT_CHAMPION, json!(103));
        api.set(
            endpoints::CHAMP_SELECT_SESSION,
            json!({ "localPlayerCellId": 0, "myTeam": [{ "cellId": 0, "championId": 103 }] }),
        );
    }

    fn seed_career(api: &FakeApi, puuid: &str) {
        api.set(
            &endpoints::summoner_by_puuid(puuid),
            json!({ "puuid": puuid, "gameName": "Friend" }),
        );
        api.set(
            &endpoints::match_history(puuid, 20),
            json!({ "games": { "games": [{ "gameId": 1, "participants": [
                { "championId": 1, "stats": { "win": true, "kills": 1, "deaths": 1, "assists": 1 } }
            ] }] } }),
        );
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ConnectorEvent>) -> Vec<ConnectorEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn last_status(events: &[ConnectorEvent]) -> ClientStatus {
        events
            .iter()
            .rev()
            .find_map(|e| match e {
                ConnectorEvent::Status(s) => Some(s.clone()),
                _ => None,
            })
            .expect("no status event")
    }

    async fn connected_fixture() -> (
        LcuConnector,
        mpsc::UnboundedReceiver<ConnectorEvent>,
        Arc<FakeTransport>,
    ) {
        let transport = Arc::new(FakeTransport::default());
        seed_champ_select(&transport.api);
        let (connector, mut rx) = LcuConnector::new(
            FakeSource::new(true),
            transport.clone(),
            ConnectorSettings::default(),
        );
        connector.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        settle().await;
        assert!(connector.is_connected());
        drain(&mut rx);
        (connector, rx, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn connect_refreshes_eagerly() {
        let transport = Arc::new(FakeTransport::default());
        seed_champ_select(&transport.api);
        let (connector, mut rx) = LcuConnector::new(
            FakeSource::new(true),
            transport.clone(),
            ConnectorSettings::default(),
        );
        connector.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        settle().await;

        let events = drain(&mut rx);
        assert!(events.contains(&ConnectorEvent::ChampionChanged(103)));
        let status = last_status(&events);
        assert!(status.connected);
        assert_eq!(status.phase.as_deref(), Some("ChampSelect"));
        assert_eq!(status.queue_id, Some(420));
        assert_eq!(status.current_champion_id, Some(103));
        assert_eq!(status.summoner.unwrap().puuid, "me");
        assert_eq!(transport.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pushed_phase_change_clears_champion() {
        let (connector, mut rx, transport) = connected_fixture().await;

        transport.push(endpoints::GAMEFLOW_PHASE, json!("Lobby"));
        settle().await;

        let status = last_status(&drain(&mut rx));
        assert_eq!(status.phase.as_deref(), Some("Lobby"));
        assert_eq!(status.current_champion_id, None);
        assert_eq!(status.session, None);
        assert_eq!(connector.status(), status);
    }

    #[tokio::test(start_paused = true)]
    async fn socket_close_disconnects_and_keeps_summoner() {
        let (connector, mut rx, transport) = connected_fixture().await;

        transport.close();
        settle().await;

        let status = last_status(&drain(&mut rx));
        assert!(!status.connected);
        assert_eq!(status.phase, None);
        assert_eq!(status.summoner.unwrap().puuid, "me");
        assert!(!connector.is_connected());

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert!(connector.is_connected(), "prober should reconnect");
        assert_eq!(transport.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credentials_back_off() {
        let source = FakeSource::new(false);
        let (connector, _rx) = LcuConnector::new(
            source.clone(),
            Arc::new(FakeTransport::default()),
            ConnectorSettings::default(),
        );
        connector.start();
        settle().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // Ticks every 2s, but each failure pushes the next attempt further
        // out: 2s, 3s, 4.5s, 6.75s ...
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        let calls = source.calls.load(Ordering::SeqCst);
        assert!(calls >= 3, "expected retries, got {calls}");
        assert!(calls < 15, "backoff should slow probing, got {calls}");
        assert!(!connector.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_now_skips_backoff() {
        let source = FakeSource::new(false);
        let transport = Arc::new(FakeTransport::default());
        seed_champ_select(&transport.api);
        let (connector, _rx) =
            LcuConnector::new(source.clone(), transport.clone(), ConnectorSettings::default());
        connector.start();
        tokio::time::sleep(Duration::from_secs(40)).await;
        settle().await;
        let before = source.calls.load(Ordering::SeqCst);

        *source.available.lock().unwrap() = true;
        connector.refresh_now().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        settle().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), before + 1);
        assert!(connector.is_connected());
        assert_eq!(transport.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn career_lookup_is_cached_then_cleared_on_stop() {
        let (connector, _rx, transport) = connected_fixture().await;
        seed_career(&transport.api, "p1");
        let summoner_path = endpoints::summoner_by_puuid("p1");

        let first = connector.get_player_career("p1").await.unwrap();
        assert_eq!(first.wins(), 1);
        let second = connector.get_player_career("p1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(transport.api.calls_to(&summoner_path), 1);

        // A career fetch also seeds the summoner cache.
        let summoner = connector.get_summoner_by_id("p1").await.unwrap();
        assert_eq!(summoner.game_name.as_deref(), Some("Friend"));
        assert_eq!(transport.api.calls_to(&summoner_path), 1);

        connector.stop();
        let err = connector.get_player_career("p1").await.unwrap_err();
        assert!(matches!(err, LcuError::NotConnected));
        let err = connector.get_summoner_by_id("p1").await.unwrap_err();
        assert!(matches!(err, LcuError::NotConnected));
        assert_eq!(connector.status().summoner.unwrap().puuid, "me");

        connector.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        settle().await;
        assert!(connector.is_connected());
        connector.get_player_career("p1").await.unwrap();
        assert_eq!(transport.api.calls_to(&summoner_path), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn career_cache_expires() {
        let (connector, _rx, transport) = connected_fixture().await;
        seed_career(&transport.api, "p1");
        let summoner_path = endpoints::summoner_by_puuid("p1");

        connector.get_player_career("p1").await.unwrap();
        tokio::time::advance(Duration::from_secs(46)).await;
        connector.get_player_career("p1").await.unwrap();
        assert_eq!(transport.api.calls_to(&summoner_path), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_failure_surfaces_error() {
        let (connector, _rx, _transport) = connected_fixture().await;
        let err = connector.get_summoner_by_id("ghost").await.unwrap_err();
        assert!(matches!(err, LcuError::NotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_now_refetches_when_connected() {
        let (connector, mut rx, transport) = connected_fixture().await;
        transport.api.set(endpoints::GAMEFLOW_PHASE, json!("InProgress"));
        transport.api.set(
            endpoints::GAMEFLOW_SESSION,
            json!({ "phase": "InProgress", "gameData": { "queue": { "id": 420 } } }),
        );

        connector.refresh_now().await;
        let status = last_status(&drain(&mut rx));
        assert_eq!(status.phase.as_deref(), Some("InProgress"));
        assert_eq!(status.in_progress, Some(true));
        assert_eq!(status.locked_champion_id(), Some(103));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let (connector, mut rx, _transport) = connected_fixture().await;
        connector.stop();
        connector.stop();
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(!last_status(&events).connected);
    }
}
