// RuneWatch entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Build the control-API, live-endpoint and static-data clients
// 4. Build the build provider and the cached fetcher
// 5. Create and start the context manager
// 6. Run the event loop until Ctrl+C
// 7. Stop the manager

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use runewatch_app::app;
use runewatch_core::build::{CachedBuildFetcher, HttpBuildProvider, MemoryBuildCache, SelfHealPolicy};
use runewatch_core::champions::DataDragon;
use runewatch_core::config;
use runewatch_core::context::{ContextSources, GameContextManager};
use runewatch_core::credentials::CredentialDiscovery;
use runewatch_core::lcu::WampTransport;
use runewatch_core::live::HttpLiveSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("RuneWatch starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: locale={}, live endpoint {}",
        config.general.locale, config.live.url
    );

    // 3. Clients for the local client, the live endpoint and Data Dragon
    let discovery = CredentialDiscovery::new(config.discovery_settings());
    let transport = WampTransport::new(config.lcu_request_timeout());
    let live = HttpLiveSource::new(&config.live.url, config.live_request_timeout())
        .context("failed to build live endpoint client")?;
    let data_dragon = Arc::new(
        DataDragon::new(&config.data_dragon.base_url)
            .context("failed to build static data client")?,
    );

    // 4. Build pipeline
    let provider = HttpBuildProvider::from_settings(
        config.builds.provider_url.as_deref(),
        config.builds.region.clone(),
        config.builds.tier.clone(),
    )
    .context("failed to build build provider")?;
    if provider.is_active() {
        info!("Build provider configured");
    } else {
        warn!("Build provider disabled (no builds.provider_url); builds will not resolve");
    }
    let fetcher = CachedBuildFetcher::new(
        Arc::new(provider),
        Arc::new(MemoryBuildCache::new(
            config.build_cache_ttl(),
            config.cache.build_capacity,
        )),
        SelfHealPolicy::new(config.self_heal_settings()),
        config.builds.variant.clone(),
    )
    .with_item_catalog(data_dragon.clone());

    // 5. Context manager
    let (manager, events) = GameContextManager::new(
        ContextSources {
            credentials: Arc::new(discovery),
            transport: Arc::new(transport),
            live: Arc::new(live),
            champions: data_dragon,
            fetcher: Arc::new(fetcher),
        },
        config.manager_settings(),
    );
    manager.start();
    info!("Application ready; waiting for the game client");

    // 6. Event loop until Ctrl+C
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let state = app::run(events, shutdown).await?;

    // 7. Cleanup
    manager.stop();
    info!(
        "RuneWatch shut down cleanly after {} events",
        state.events_seen
    );
    Ok(())
}

/// Initialize tracing to log to a file.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("runewatch.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("runewatch=info,runewatch_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
