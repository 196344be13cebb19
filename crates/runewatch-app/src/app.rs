// Headless presentation loop.
//
// Consumes the context manager's notifications, keeps the latest view of the
// game and the active build, and logs what a UI would render.

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, info};

use runewatch_core::build::BuildResult;
use runewatch_core::context::{ContextEvent, GameContext};

/// What the presentation layer currently shows.
#[derive(Debug, Default)]
pub struct AppState {
    pub context: Option<GameContext>,
    pub active_build: Option<BuildResult>,
    pub games_ended: usize,
    pub events_seen: usize,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one notification.
    pub fn handle_event(&mut self, event: ContextEvent) {
        self.events_seen += 1;
        match event {
            ContextEvent::Changed(ctx) => {
                debug!(
                    connected = ctx.client.connected,
                    phase = ctx.client.phase.as_deref().unwrap_or("-"),
                    live = ctx.live.connected,
                    "context changed"
                );
                self.context = Some(ctx);
            }
            ContextEvent::DetectedChampionChanged(ctx) => {
                info!(
                    "Now playing champion {} ({})",
                    ctx.detected_champion_id.unwrap_or_default(),
                    ctx.mode.map_or("unsupported", |m| m.as_str())
                );
                self.context = Some(ctx);
            }
            ContextEvent::ActiveBuildChanged(Some(build)) => {
                info!(
                    "Build ready: {} champion {}",
                    build.mode(),
                    build.champion_id()
                );
                self.active_build = Some(build);
            }
            ContextEvent::ActiveBuildChanged(None) => {
                info!("Build cleared");
                self.active_build = None;
            }
            ContextEvent::GameEnded(ctx) => {
                info!("Game ended; hiding build");
                self.games_ended += 1;
                self.context = Some(ctx);
            }
        }
    }
}

/// Run until the event channel closes or `shutdown` resolves.
pub async fn run<F>(
    mut events: mpsc::UnboundedReceiver<ContextEvent>,
    shutdown: F,
) -> anyhow::Result<AppState>
where
    F: Future<Output = ()>,
{
    info!("Application event loop started");
    let mut state = AppState::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => state.handle_event(event),
                None => {
                    info!("Context event channel closed, shutting down");
                    break;
                }
            },
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use runewatch_core::build::model::RiftBuild;
    use std::time::Duration;

    fn build(champion_id: i64) -> BuildResult {
        BuildResult::Aram(RiftBuild {
            champion_id,
            ..RiftBuild::default()
        })
    }

    #[test]
    fn tracks_build_and_game_end() {
        let mut state = AppState::new();
        state.handle_event(ContextEvent::ActiveBuildChanged(Some(build(103))));
        assert_eq!(state.active_build.as_ref().map(|b| b.champion_id()), Some(103));

        state.handle_event(ContextEvent::ActiveBuildChanged(None));
        assert!(state.active_build.is_none());

        state.handle_event(ContextEvent::GameEnded(GameContext::default()));
        assert_eq!(state.games_ended, 1);
        assert_eq!(state.events_seen, 3);
    }

    #[tokio::test]
    async fn run_exits_when_channel_closes() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ContextEvent::Changed(GameContext::default())).unwrap();
        tx.send(ContextEvent::ActiveBuildChanged(Some(build(1)))).unwrap();
        drop(tx);

        let state = run(rx, std::future::pending()).await.unwrap();
        assert_eq!(state.events_seen, 2);
        assert!(state.context.is_some());
        assert!(state.active_build.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn run_exits_on_shutdown() {
        let (tx, rx) = mpsc::unbounded_channel::<ContextEvent>();
        let state = run(rx, tokio::time::sleep(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(state.events_seen, 0);
        drop(tx);
    }
}
