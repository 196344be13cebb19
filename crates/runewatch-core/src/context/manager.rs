// Reconciles the control API and the live endpoint into one `GameContext`
// and drives a debounced build fetch off it.
//
// Fetches are tagged with the sequence number current when they were
// scheduled. A result is applied only while that number is still current
// and the context still targets the same mode and champion, so the last
// scheduled fetch wins regardless of completion order.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::model::{ContextEvent, GameContext};
use crate::build::{BuildFetcher, BuildRequest, BuildResult};
use crate::champions::{ChampionListProvider, ChampionResolver};
use crate::credentials::CredentialSource;
use crate::error::{BuildError, LcuError};
use crate::lcu::{ConnectorEvent, ConnectorSettings, LcuConnector, LcuTransport};
use crate::live::{LiveClientWatcher, LiveSource, WatcherSettings};
use crate::protocol::{phase, ClientStatus, LiveStatus, PlayerCareerSnapshot, SummonerInfo};

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub connector: ConnectorSettings,
    pub watcher: WatcherSettings,
    /// Period of the forced refresh while the control API is connected.
    pub supervise_interval: Duration,
    pub debounce: Duration,
    pub locale: String,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            connector: ConnectorSettings::default(),
            watcher: WatcherSettings::default(),
            supervise_interval: Duration::from_millis(1500),
            debounce: Duration::from_millis(300),
            locale: "en_US".to_string(),
        }
    }
}

/// External collaborators the manager is wired to.
pub struct ContextSources {
    pub credentials: Arc<dyn CredentialSource>,
    pub transport: Arc<dyn LcuTransport>,
    pub live: Arc<dyn LiveSource>,
    pub champions: Arc<dyn ChampionListProvider>,
    pub fetcher: Arc<dyn BuildFetcher>,
}

struct ManagerState {
    client: ClientStatus,
    live: LiveStatus,
    context: GameContext,
    signature: String,
    active_build: Option<BuildResult>,
    locale: String,
    fetch_seq: u64,
    debounce: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
    running: bool,
}

struct Receivers {
    connector: mpsc::UnboundedReceiver<ConnectorEvent>,
    live: mpsc::UnboundedReceiver<LiveStatus>,
}

struct Inner {
    connector: LcuConnector,
    watcher: LiveClientWatcher,
    resolver: Arc<ChampionResolver>,
    champions: Arc<dyn ChampionListProvider>,
    fetcher: Arc<dyn BuildFetcher>,
    settings: ManagerSettings,
    state: Mutex<ManagerState>,
    receivers: Arc<tokio::sync::Mutex<Receivers>>,
    events: mpsc::UnboundedSender<ContextEvent>,
}

/// Cheap to clone; all clones drive the same manager.
#[derive(Clone)]
pub struct GameContextManager {
    inner: Arc<Inner>,
}

impl GameContextManager {
    pub fn new(
        sources: ContextSources,
        settings: ManagerSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ContextEvent>) {
        let resolver = Arc::new(ChampionResolver::new());
        let (connector, connector_rx) = LcuConnector::new(
            sources.credentials,
            sources.transport,
            settings.connector.clone(),
        );
        let (watcher, live_rx) = LiveClientWatcher::new(
            sources.live,
            Arc::clone(&resolver),
            settings.watcher.clone(),
        );

        let client = connector.status();
        let live = watcher.status();
        let context = GameContext::derive(&client, &live);
        let state = ManagerState {
            client,
            live,
            signature: context.signature(),
            context,
            active_build: None,
            locale: settings.locale.clone(),
            fetch_seq: 0,
            debounce: None,
            tasks: Vec::new(),
            running: false,
        };

        let (events, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            connector,
            watcher,
            resolver,
            champions: sources.champions,
            fetcher: sources.fetcher,
            settings,
            state: Mutex::new(state),
            receivers: Arc::new(tokio::sync::Mutex::new(Receivers {
                connector: connector_rx,
                live: live_rx,
            })),
            events,
        });
        (Self { inner }, rx)
    }

    /// Start the connector, the supervisory refresh, the event pump and the
    /// resolver bootstrap. The live watcher is started or stopped by gating.
    pub fn start(&self) {
        let inner = &self.inner;
        let mut state = inner.state();
        if state.running {
            return;
        }
        state.running = true;
        info!("starting game context manager");

        inner.connector.start();
        let weak = Arc::downgrade(inner);
        let mut tasks = vec![
            tokio::spawn(pump(weak.clone(), Arc::clone(&inner.receivers))),
            tokio::spawn(supervise(weak, inner.settings.supervise_interval)),
        ];
        if inner.resolver.is_empty() {
            tasks.push(tokio::spawn(bootstrap_resolver(
                Arc::clone(&inner.champions),
                Arc::clone(&inner.resolver),
                state.locale.clone(),
            )));
        }
        state.tasks = tasks;

        let client = state.client.clone();
        inner.gate_watcher(&mut state, &client);
        inner.recompute(&mut state);
    }

    /// Stop everything. Invalidates any in-flight build fetch.
    pub fn stop(&self) {
        let inner = &self.inner;
        let mut state = inner.state();
        if !state.running {
            return;
        }
        state.running = false;
        state.fetch_seq += 1;
        if let Some(timer) = state.debounce.take() {
            timer.abort();
        }
        for task in state.tasks.drain(..) {
            task.abort();
        }
        inner.connector.stop();
        inner.watcher.stop();

        state.client = inner.connector.status();
        state.live = inner.watcher.status();
        inner.recompute(&mut state);
        info!("stopped game context manager");
    }

    /// Feed a control-API status as if the connector had pushed it.
    pub fn ingest_client_status(&self, status: ClientStatus) {
        self.inner.ingest_client_status(status);
    }

    /// Feed a live-endpoint status as if the watcher had pushed it.
    pub fn ingest_live_status(&self, status: LiveStatus) {
        self.inner.ingest_live_status(status);
    }

    pub fn snapshot(&self) -> GameContext {
        self.inner.state().context.clone()
    }

    pub fn active_build(&self) -> Option<BuildResult> {
        self.inner.state().active_build.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state().running
    }

    pub fn live_watcher_running(&self) -> bool {
        self.inner.watcher.is_running()
    }

    pub fn locale(&self) -> String {
        self.inner.state().locale.clone()
    }

    pub async fn get_player_career(&self, puuid: &str) -> Result<PlayerCareerSnapshot, LcuError> {
        self.inner.connector.get_player_career(puuid).await
    }

    pub async fn get_summoner_by_id(&self, puuid: &str) -> Result<SummonerInfo, LcuError> {
        self.inner.connector.get_summoner_by_id(puuid).await
    }

    /// Probe now and, when connected, re-fetch every client field.
    pub async fn refresh_now(&self) {
        self.inner.connector.refresh_now().await;
    }

    /// Switch the build locale; re-fetches the build if one is targeted.
    pub fn set_language(&self, locale: &str) {
        let inner = &self.inner;
        let mut state = inner.state();
        if state.locale == locale {
            return;
        }
        info!(locale, "build locale changed");
        state.locale = locale.to_string();
        if state.context.has_build_target() {
            inner.schedule_fetch(&mut state);
        }
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().expect("context manager mutex poisoned")
    }

    fn emit(&self, event: ContextEvent) {
        let _ = self.events.send(event);
    }

    fn on_connector_event(self: &Arc<Self>, event: ConnectorEvent) {
        match event {
            ConnectorEvent::Status(status) => self.ingest_client_status(status),
            ConnectorEvent::ChampionChanged(id) => debug!(champion = id, "client champion changed"),
        }
    }

    fn ingest_client_status(self: &Arc<Self>, status: ClientStatus) {
        let mut state = self.state();
        state.client = status.clone();
        self.gate_watcher(&mut state, &status);
        self.recompute(&mut state);
    }

    fn ingest_live_status(self: &Arc<Self>, status: LiveStatus) {
        let mut state = self.state();
        state.live = status;
        self.recompute(&mut state);
    }

    /// The live endpoint is only watched while the control API is down or a
    /// match is running.
    fn gate_watcher(&self, state: &mut ManagerState, client: &ClientStatus) {
        if !state.running {
            return;
        }
        let wanted = !client.connected || client.phase_is(phase::IN_PROGRESS);
        let running = self.watcher.is_running();
        if wanted && !running {
            debug!("starting live watcher");
            self.watcher.start();
        } else if !wanted && running {
            debug!("stopping live watcher");
            self.watcher.stop();
            state.live = self.watcher.status();
        }
    }

    fn recompute(self: &Arc<Self>, state: &mut ManagerState) {
        let next = GameContext::derive(&state.client, &state.live);
        let signature = next.signature();
        if signature == state.signature {
            return;
        }
        let previous = std::mem::replace(&mut state.context, next.clone());
        state.signature = signature;
        self.emit(ContextEvent::Changed(next.clone()));

        let target_changed = previous.detected_champion_id != next.detected_champion_id
            || previous.mode != next.mode;
        if target_changed && next.has_build_target() {
            info!(
                champion = next.detected_champion_id,
                mode = ?next.mode,
                "detected champion changed"
            );
            self.emit(ContextEvent::DetectedChampionChanged(next.clone()));
            self.schedule_fetch(state);
        }

        if !next.is_supported_mode && state.active_build.is_some() {
            state.active_build = None;
            self.emit(ContextEvent::ActiveBuildChanged(None));
        }

        if previous.is_game_related && !next.is_game_related {
            info!("game ended");
            self.emit(ContextEvent::GameEnded(next));
        }
    }

    /// Bump the sequence and restart the debounce timer for the current
    /// target. Only the timer is cancelled by a reschedule; a fetch already
    /// in flight runs to completion and is discarded by the sequence check.
    fn schedule_fetch(self: &Arc<Self>, state: &mut ManagerState) {
        let (Some(mode), Some(champion_id)) =
            (state.context.mode, state.context.detected_champion_id)
        else {
            return;
        };
        state.fetch_seq += 1;
        let seq = state.fetch_seq;
        if let Some(timer) = state.debounce.take() {
            timer.abort();
        }

        let request = BuildRequest {
            champion_key: self.resolver.key_for(champion_id),
            locale: Some(state.locale.clone()),
            ..BuildRequest::new(mode, champion_id)
        };
        let delay = self.settings.debounce;
        let weak = Arc::downgrade(self);
        state.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                let result = inner.fetcher.fetch(request.clone()).await;
                inner.apply_fetch(seq, &request, result);
            });
        }));
    }

    fn apply_fetch(&self, seq: u64, request: &BuildRequest, result: Result<BuildResult, BuildError>) {
        let mut state = self.state();
        let context = &state.context;
        let current = seq == state.fetch_seq
            && context.is_supported_mode
            && context.mode == Some(request.mode)
            && context.detected_champion_id == Some(request.champion_id);
        if !current {
            debug!(
                seq,
                champion = request.champion_id,
                "discarding stale build result"
            );
            return;
        }
        match result {
            Ok(build) => {
                info!(mode = %request.mode, champion = request.champion_id, "build ready");
                state.active_build = Some(build.clone());
                self.emit(ContextEvent::ActiveBuildChanged(Some(build)));
            }
            Err(e) => warn!(
                mode = %request.mode,
                champion = request.champion_id,
                "build fetch failed: {e}"
            ),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(timer) = state.debounce.take() {
                timer.abort();
            }
            for task in state.tasks.drain(..) {
                task.abort();
            }
        }
    }
}

/// Forward connector and watcher notifications in arrival order.
async fn pump(inner: Weak<Inner>, receivers: Arc<tokio::sync::Mutex<Receivers>>) {
    let mut guard = receivers.lock().await;
    let rx = &mut *guard;
    loop {
        tokio::select! {
            Some(event) = rx.connector.recv() => {
                let Some(inner) = inner.upgrade() else { return };
                inner.on_connector_event(event);
            }
            Some(status) = rx.live.recv() => {
                let Some(inner) = inner.upgrade() else { return };
                inner.ingest_live_status(status);
            }
            else => return,
        }
    }
}

/// Force a full client refresh on a fixed period while connected, to recover
/// from missed push events.
async fn supervise(inner: Weak<Inner>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if inner.connector.is_connected() {
            inner.connector.refresh_now().await;
        }
    }
}

async fn bootstrap_resolver(
    provider: Arc<dyn ChampionListProvider>,
    resolver: Arc<ChampionResolver>,
    locale: String,
) {
    match provider.get_champions(&locale).await {
        Ok(champions) => {
            resolver.replace(&champions);
            info!(count = champions.len(), "champion resolver ready");
        }
        Err(e) => warn!("champion list unavailable, live names will not resolve: {e}"),
    }
}
