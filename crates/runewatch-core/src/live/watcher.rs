// Adaptive poller for the in-game live endpoint.
//
// Every `start` captures the current generation; `stop` bumps it, so a poll
// that completes after a stop is dropped even if its task has not been torn
// down yet.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::source::LiveSource;
use crate::champions::ChampionResolver;
use crate::protocol::parse::parse_live_game;
use crate::protocol::{LiveStatus, PlayerSnapshot};

#[derive(Debug, Clone)]
pub struct WatcherSettings {
    /// Delay after a poll that reached the endpoint.
    pub poll_connected: Duration,
    /// Delay after a failed poll.
    pub poll_idle: Duration,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_connected: Duration::from_millis(1500),
            poll_idle: Duration::from_millis(5000),
        }
    }
}

struct WatchState {
    task: Option<JoinHandle<()>>,
    last: LiveStatus,
    last_signature: String,
}

struct Inner {
    source: Arc<dyn LiveSource>,
    resolver: Arc<ChampionResolver>,
    settings: WatcherSettings,
    generation: AtomicU64,
    state: Mutex<WatchState>,
    events: mpsc::UnboundedSender<LiveStatus>,
}

pub struct LiveClientWatcher {
    inner: Arc<Inner>,
}

impl LiveClientWatcher {
    pub fn new(
        source: Arc<dyn LiveSource>,
        resolver: Arc<ChampionResolver>,
        settings: WatcherSettings,
    ) -> (Self, mpsc::UnboundedReceiver<LiveStatus>) {
        let (events, rx) = mpsc::unbounded_channel();
        let last = LiveStatus::disconnected();
        let state = WatchState {
            task: None,
            last_signature: signature(&last),
            last,
        };
        let inner = Arc::new(Inner {
            source,
            resolver,
            settings,
            generation: AtomicU64::new(0),
            state: Mutex::new(state),
            events,
        });
        (Self { inner }, rx)
    }

    /// Begin polling; the first poll runs immediately. No-op if running.
    pub fn start(&self) {
        let mut state = self.inner.state();
        if state.task.is_some() {
            return;
        }
        let generation = self.inner.generation.load(Ordering::SeqCst);
        state.task = Some(tokio::spawn(poll_loop(Arc::clone(&self.inner), generation)));
        debug!(generation, "live watcher started");
    }

    /// Stop polling. If the last published status was connected, publish a
    /// disconnected one so consumers never keep a stale live match.
    pub fn stop(&self) {
        let mut state = self.inner.state();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let Some(task) = state.task.take() else {
            return;
        };
        task.abort();
        debug!("live watcher stopped");

        if state.last.connected {
            let status = LiveStatus::disconnected();
            state.last_signature = signature(&status);
            state.last = status.clone();
            let _ = self.inner.events.send(status);
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state().task.is_some()
    }

    pub fn status(&self) -> LiveStatus {
        self.inner.state().last.clone()
    }
}

impl Drop for LiveClientWatcher {
    fn drop(&mut self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut state) = self.inner.state.lock() {
            if let Some(task) = state.task.take() {
                task.abort();
            }
        }
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, WatchState> {
        self.state.lock().expect("live watcher mutex poisoned")
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn poll_once(&self) -> LiveStatus {
        match self.source.fetch().await {
            Ok(doc) => match parse_live_game(&doc, |name| self.resolver.resolve(name)) {
                Some(status) => status,
                None => {
                    debug!("live endpoint answered without game data");
                    LiveStatus::disconnected()
                }
            },
            Err(e) => {
                debug!("live endpoint unavailable: {e}");
                LiveStatus::disconnected()
            }
        }
    }

    /// Publish `status` if its signature changed. Returns false when the
    /// generation moved on and the result was dropped.
    fn publish(&self, status: LiveStatus, generation: u64) -> bool {
        let mut state = self.state();
        if !self.is_current(generation) {
            return false;
        }
        let sig = signature(&status);
        if sig == state.last_signature {
            return true;
        }
        if status.connected != state.last.connected {
            info!(connected = status.connected, "live endpoint status changed");
        }
        state.last_signature = sig;
        state.last = status.clone();
        let _ = self.events.send(status);
        true
    }
}

async fn poll_loop(inner: Arc<Inner>, generation: u64) {
    while inner.is_current(generation) {
        let status = inner.poll_once().await;
        let delay = if status.connected {
            inner.settings.poll_connected
        } else {
            inner.settings.poll_idle
        };
        if !inner.publish(status, generation) {
            return;
        }
        tokio::time::sleep(delay).await;
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Signature<'a> {
    connected: bool,
    champion_name: Option<&'a str>,
    champion_id: Option<i64>,
    game_mode: Option<&'a str>,
    active_player_name: Option<&'a str>,
    roster: &'a [PlayerSnapshot],
}

/// Change-detection key over the fields consumers react to.
fn signature(status: &LiveStatus) -> String {
    let sig = Signature {
        connected: status.connected,
        champion_name: status.champion_name.as_deref(),
        champion_id: status.champion_id,
        game_mode: status.game_mode.as_deref(),
        active_player_name: status.active_player_name.as_deref(),
        roster: &status.all_players,
    };
    serde_json::to_string(&sig).unwrap_or_default()
}
