// End-to-end tests for the game context pipeline.
//
// The manager is wired to in-memory fakes of the client control API, the
// live endpoint, the champion list and the build provider, and driven only
// through the crate's public API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use runewatch_core::build::model::{ItemSet, RiftBuild, RunePage, SpellSet};
use runewatch_core::build::{
    BuildProvider, BuildRequest, BuildResult, CachedBuildFetcher, GameMode, MemoryBuildCache,
    SelfHealPolicy,
};
use runewatch_core::champions::{ChampionListProvider, ChampionSummary};
use runewatch_core::context::{
    ChampionSource, ContextEvent, ContextSources, GameContextManager, ManagerSettings,
};
use runewatch_core::credentials::{CredentialSource, Credentials};
use runewatch_core::error::{BuildError, CatalogError, LcuError, LiveError};
use runewatch_core::lcu::{endpoints, LcuApi, LcuSession, LcuTransport, SocketEvent};
use runewatch_core::live::LiveSource;
use runewatch_core::protocol::LiveStatus;

// ===========================================================================
// Fakes
// ===========================================================================

struct FixedCredentials;

impl CredentialSource for FixedCredentials {
    fn discover(&self) -> Option<Credentials> {
        Some(Credentials::new(50123, "token"))
    }
}

#[derive(Default)]
struct Client {
    responses: Mutex<HashMap<String, Value>>,
    socket: Mutex<Option<mpsc::Sender<SocketEvent>>>,
}

impl Client {
    fn set(&self, endpoint: &str, value: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), value);
    }

    fn remove(&self, endpoint: &str) {
        self.responses.lock().unwrap().remove(endpoint);
    }

    fn push(&self, uri: &str, payload: Value) {
        let tx = self.socket.lock().unwrap().clone().expect("not connected");
        tx.try_send(SocketEvent::new(uri, payload)).unwrap();
    }
}

#[async_trait]
impl LcuApi for Client {
    async fn request(&self, endpoint: &str) -> Result<Value, LcuError> {
        self.responses
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .ok_or(LcuError::NotFound)
    }
}

struct ClientTransport(Arc<Client>);

#[async_trait]
impl LcuTransport for ClientTransport {
    async fn connect(
        &self,
        _credentials: &Credentials,
        _resources: &[&str],
    ) -> Result<LcuSession, LcuError> {
        let (tx, rx) = mpsc::channel(64);
        *self.0.socket.lock().unwrap() = Some(tx);
        Ok(LcuSession {
            api: self.0.clone(),
            events: rx,
            reader: None,
        })
    }
}

#[derive(Default)]
struct Live {
    doc: Mutex<Option<Value>>,
}

#[async_trait]
impl LiveSource for Live {
    async fn fetch(&self) -> Result<Value, LiveError> {
        self.doc.lock().unwrap().clone().ok_or(LiveError::Status(404))
    }
}

struct Champions;

#[async_trait]
impl ChampionListProvider for Champions {
    async fn get_champions(&self, _locale: &str) -> Result<Vec<ChampionSummary>, CatalogError> {
        Ok(vec![
            ChampionSummary {
                id: 103,
                name: "Ahri".into(),
                slug: "Ahri".into(),
            },
            ChampionSummary {
                id: 86,
                name: "Garen".into(),
                slug: "Garen".into(),
            },
        ])
    }
}

#[derive(Default)]
struct Provider {
    requests: Mutex<Vec<BuildRequest>>,
    calls: AtomicUsize,
}

#[async_trait]
impl BuildProvider for Provider {
    async fn get_build(&self, request: &BuildRequest) -> Result<BuildResult, BuildError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let build = RiftBuild {
            champion_id: request.champion_id,
            runes: vec![RunePage {
                perks: vec![8112],
                ..RunePage::default()
            }],
            summoner_spells: vec![SpellSet {
                spells: vec![4, 14],
                ..SpellSet::default()
            }],
            core_items: vec![ItemSet {
                items: vec![3165],
                ..ItemSet::default()
            }],
            ..RiftBuild::default()
        };
        Ok(match request.mode {
            GameMode::Aram => BuildResult::Aram(build),
            _ => BuildResult::Ranked(build),
        })
    }
}

// ===========================================================================
// Helpers
// ===========================================================================

struct Harness {
    manager: GameContextManager,
    events: mpsc::UnboundedReceiver<ContextEvent>,
    client: Arc<Client>,
    live: Arc<Live>,
    provider: Arc<Provider>,
}

fn harness() -> Harness {
    let client = Arc::new(Client::default());
    client.set(
        endpoints::CURRENT_SUMMONER,
        json!({ "puuid": "me", "gameName": "Me", "tagLine": "EUW" }),
    );
    client.set(endpoints::GAMEFLOW_PHASE, json!("ChampSelect"));
    client.set(
        endpoints::GAMEFLOW_SESSION,
        json!({ "phase": "ChampSelect", "gameData": { "queue": { "id": 420 } } }),
    );
    client.set(endpoints::CURRENT_CHAMPION, json!(103));
    client.set(
        endpoints::CHAMP_SELECT_SESSION,
        json!({ "localPlayerCellId": 1, "myTeam": [{ "cellId": 1, "championId": 103, "puuid": "me" }] }),
    );

    let live = Arc::new(Live::default());
    let provider = Arc::new(Provider::default());
    let fetcher = CachedBuildFetcher::new(
        provider.clone(),
        Arc::new(MemoryBuildCache::new(Duration::from_secs(3600), 16)),
        SelfHealPolicy::default(),
        "default",
    );

    let (manager, events) = GameContextManager::new(
        ContextSources {
            credentials: Arc::new(FixedCredentials),
            transport: Arc::new(ClientTransport(client.clone())),
            live: live.clone(),
            champions: Arc::new(Champions),
            fetcher: Arc::new(fetcher),
        },
        ManagerSettings::default(),
    );
    Harness {
        manager,
        events,
        client,
        live,
        provider,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ContextEvent>) -> Vec<ContextEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

async fn run_for(duration: Duration) {
    tokio::time::sleep(duration).await;
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn champ_select_to_build_to_game_end() {
    let mut h = harness();
    h.manager.start();
    run_for(Duration::from_millis(10)).await;

    // Connected in champ select: the champion is detected from the client and
    // the live endpoint is not watched.
    let ctx = h.manager.snapshot();
    assert!(ctx.client.connected);
    assert_eq!(ctx.mode, Some(GameMode::Ranked));
    assert_eq!(ctx.detected_champion_id, Some(103));
    assert_eq!(ctx.detected_champion_source, Some(ChampionSource::Client));
    assert!(!h.manager.live_watcher_running());
    let events = drain(&mut h.events);
    assert!(events
        .iter()
        .any(|e| matches!(e, ContextEvent::DetectedChampionChanged(_))));

    // The debounced fetch resolves the build, keyed by the champion's slug.
    run_for(Duration::from_millis(400)).await;
    let build = h.manager.active_build().expect("build applied");
    assert_eq!(build.champion_id(), 103);
    let requests = h.provider.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].champion_key.as_deref(), Some("Ahri"));
    assert_eq!(requests[0].locale.as_deref(), Some("en_US"));

    // Supervisory refreshes re-read identical state and change nothing.
    drain(&mut h.events);
    run_for(Duration::from_secs(5)).await;
    assert!(drain(&mut h.events).is_empty());

    // The match starts: the watcher comes up and the champion stays detected
    // through the team session.
    *h.live.doc.lock().unwrap() = Some(json!({
        "activePlayer": { "riotId": "Me#EUW" },
        "allPlayers": [{ "riotId": "Me#EUW", "championName": "Ahri", "team": "ORDER" }],
        "gameData": { "gameMode": "CLASSIC" }
    }));
    h.client.remove(endpoints::CURRENT_CHAMPION);
    h.client.set(endpoints::GAMEFLOW_PHASE, json!("InProgress"));
    h.client.set(
        endpoints::GAMEFLOW_SESSION,
        json!({ "phase": "InProgress", "gameData": { "queue": { "id": 420 } } }),
    );
    h.client.push(endpoints::GAMEFLOW_PHASE, json!("InProgress"));
    run_for(Duration::from_millis(10)).await;

    assert!(h.manager.live_watcher_running());
    let ctx = h.manager.snapshot();
    assert!(ctx.live.connected);
    assert_eq!(ctx.live.champion_id, Some(103));
    assert_eq!(ctx.client.current_champion_id, None);
    assert_eq!(ctx.detected_champion_id, Some(103));
    assert_eq!(h.provider.calls.load(Ordering::SeqCst), 1, "same target, no refetch");

    // Back to the lobby: the session goes, the watcher stops and the game ends.
    h.client.remove(endpoints::CHAMP_SELECT_SESSION);
    h.client.set(endpoints::GAMEFLOW_PHASE, json!("Lobby"));
    h.client.set(
        endpoints::GAMEFLOW_SESSION,
        json!({ "phase": "Lobby", "gameData": { "queue": { "id": 420 } } }),
    );
    h.client.push(endpoints::GAMEFLOW_PHASE, json!("Lobby"));
    run_for(Duration::from_millis(10)).await;

    assert!(!h.manager.live_watcher_running());
    let ctx = h.manager.snapshot();
    assert_eq!(ctx.client.session, None);
    assert_eq!(ctx.detected_champion_id, None);
    assert!(!ctx.is_game_related);
    assert!(drain(&mut h.events)
        .iter()
        .any(|e| matches!(e, ContextEvent::GameEnded(_))));

    h.manager.stop();
}

#[tokio::test(start_paused = true)]
async fn career_lookups_do_not_survive_stop() {
    let mut h = harness();
    h.client.set(
        &endpoints::summoner_by_puuid("p1"),
        json!({ "puuid": "p1", "gameName": "Friend", "tagLine": "NA1" }),
    );
    h.client.set(
        &endpoints::match_history("p1", 20),
        json!({ "games": { "games": [
            { "gameId": 1, "queueId": 420, "participants": [
                { "championId": 103, "stats": { "win": true, "kills": 5, "deaths": 2, "assists": 7 } }
            ] },
            { "gameId": 2, "queueId": 420, "participants": [
                { "championId": 86, "stats": { "win": false, "kills": 1, "deaths": 4, "assists": 3 } }
            ] }
        ] } }),
    );
    h.manager.start();
    run_for(Duration::from_millis(10)).await;

    let career = h.manager.get_player_career("p1").await.unwrap();
    assert_eq!(career.summoner.riot_id().as_deref(), Some("Friend#NA1"));
    assert_eq!(career.recent_matches.len(), 2);
    assert_eq!((career.wins(), career.losses()), (1, 1));

    h.manager.stop();
    let err = h.manager.get_player_career("p1").await.unwrap_err();
    assert!(matches!(err, LcuError::NotConnected));
    let ctx = h.manager.snapshot();
    assert!(!ctx.client.connected);
    assert_eq!(
        ctx.client.summoner.map(|s| s.puuid).as_deref(),
        Some("me"),
        "last summoner is kept for display"
    );
    drain(&mut h.events);
}

#[tokio::test(start_paused = true)]
async fn live_endpoint_alone_drives_detection() {
    // The manager is not started, so the client never connects and only the
    // live status is fed in.
    let h = harness();
    h.manager.ingest_live_status(LiveStatus {
        connected: true,
        champion_id: Some(86),
        champion_name: Some("Garen".into()),
        game_mode: Some("ARAM".into()),
        ..Default::default()
    });

    let ctx = h.manager.snapshot();
    assert_eq!(ctx.mode, Some(GameMode::Aram));
    assert_eq!(ctx.detected_champion_id, Some(86));
    assert_eq!(ctx.detected_champion_source, Some(ChampionSource::LiveEndpoint));

    run_for(Duration::from_millis(400)).await;
    let requests = h.provider.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].mode, GameMode::Aram);
}
