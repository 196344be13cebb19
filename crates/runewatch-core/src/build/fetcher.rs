// Build fetch pipeline: provider and cache seams, the cache-first fetcher
// with self-heal, an in-memory cache, and the HTTP provider.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::model::{BuildCacheKey, BuildRequest, BuildResult};
use super::self_heal::SelfHealPolicy;
use crate::champions::{ItemCatalog, ItemCatalogSource};
use crate::error::BuildError;
use crate::ttl_cache::TtlCache;

/// Upstream source of build documents.
#[async_trait]
pub trait BuildProvider: Send + Sync {
    async fn get_build(&self, request: &BuildRequest) -> Result<BuildResult, BuildError>;
}

/// Key-value store for build documents.
#[async_trait]
pub trait BuildCache: Send + Sync {
    async fn get(&self, key: &BuildCacheKey) -> Option<BuildResult>;
    async fn set(&self, key: BuildCacheKey, build: BuildResult);
}

/// What the context manager calls to resolve a build.
#[async_trait]
pub trait BuildFetcher: Send + Sync {
    async fn fetch(&self, request: BuildRequest) -> Result<BuildResult, BuildError>;
}

// ---------------------------------------------------------------------------
// CachedBuildFetcher
// ---------------------------------------------------------------------------

/// Cache-first fetcher. A cache hit is trusted unless the self-heal policy
/// asks for a refresh; if that refresh fails, the cached build is served.
pub struct CachedBuildFetcher {
    provider: Arc<dyn BuildProvider>,
    cache: Arc<dyn BuildCache>,
    items: Option<Arc<dyn ItemCatalogSource>>,
    catalog: OnceCell<ItemCatalog>,
    policy: SelfHealPolicy,
    variant: String,
}

impl CachedBuildFetcher {
    pub fn new(
        provider: Arc<dyn BuildProvider>,
        cache: Arc<dyn BuildCache>,
        policy: SelfHealPolicy,
        variant: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            cache,
            items: None,
            catalog: OnceCell::new(),
            policy,
            variant: variant.into(),
        }
    }

    /// Check cached item ids against a catalog loaded on first use.
    pub fn with_item_catalog(mut self, items: Arc<dyn ItemCatalogSource>) -> Self {
        self.items = Some(items);
        self
    }

    /// The item catalog, or `None` if it has never loaded. A failed load is
    /// retried on the next cache hit.
    async fn catalog(&self, locale: &str) -> Option<&ItemCatalog> {
        let items = self.items.as_ref()?;
        match self
            .catalog
            .get_or_try_init(|| items.item_catalog(locale))
            .await
        {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                debug!("item catalog unavailable, skipping item checks: {e}");
                None
            }
        }
    }

    async fn fetch_fresh(
        &self,
        request: &BuildRequest,
        key: BuildCacheKey,
    ) -> Result<BuildResult, BuildError> {
        let mut build = self.provider.get_build(request).await?;
        if build.dt() <= 0 {
            build.set_dt(Utc::now().timestamp_millis());
        }
        self.cache.set(key, build.clone()).await;
        Ok(build)
    }
}

#[async_trait]
impl BuildFetcher for CachedBuildFetcher {
    async fn fetch(&self, request: BuildRequest) -> Result<BuildResult, BuildError> {
        let key = BuildCacheKey::for_request(&request, &self.variant);

        let Some(cached) = self.cache.get(&key).await else {
            debug!(mode = %request.mode, champion = request.champion_id, "build cache miss");
            return self.fetch_fresh(&request, key).await;
        };

        let catalog = self.catalog(&key.locale).await;
        if !self.policy.should_refresh(&cached, catalog, Utc::now()) {
            debug!(mode = %request.mode, champion = request.champion_id, "build cache hit");
            return Ok(cached);
        }

        info!(
            mode = %request.mode,
            champion = request.champion_id,
            "cached build looks incomplete, refetching"
        );
        match self.fetch_fresh(&request, key).await {
            Ok(fresh) => Ok(fresh),
            Err(e) => {
                warn!("build refetch failed, serving cached build: {e}");
                Ok(cached)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryBuildCache
// ---------------------------------------------------------------------------

/// Process-local build cache with a TTL.
pub struct MemoryBuildCache {
    entries: Mutex<TtlCache<BuildCacheKey, BuildResult>>,
}

impl MemoryBuildCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(TtlCache::new(ttl, capacity)),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, TtlCache<BuildCacheKey, BuildResult>> {
        self.entries.lock().expect("build cache mutex poisoned")
    }
}

#[async_trait]
impl BuildCache for MemoryBuildCache {
    async fn get(&self, key: &BuildCacheKey) -> Option<BuildResult> {
        self.entries().get(key)
    }

    async fn set(&self, key: BuildCacheKey, build: BuildResult) {
        self.entries().insert(key, build);
    }
}

// ---------------------------------------------------------------------------
// HttpBuildProvider
// ---------------------------------------------------------------------------

/// JSON build service: `GET {base}/builds/{mode}/{champion}` with locale,
/// region and tier as query parameters.
pub struct HttpBuildClient {
    http: reqwest::Client,
    base_url: String,
    region: Option<String>,
    tier: Option<String>,
}

impl HttpBuildClient {
    pub fn new(
        base_url: impl Into<String>,
        region: Option<String>,
        tier: Option<String>,
    ) -> Result<Self, BuildError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            region,
            tier,
        })
    }

    async fn get_build(&self, request: &BuildRequest) -> Result<BuildResult, BuildError> {
        let champion = request
            .champion_key
            .clone()
            .unwrap_or_else(|| request.champion_id.to_string());
        let url = format!("{}/builds/{}/{}", self.base_url, request.mode, champion);

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(locale) = &request.locale {
            query.push(("locale", locale.clone()));
        }
        if let Some(region) = request.region.as_ref().or(self.region.as_ref()) {
            query.push(("region", region.clone()));
        }
        if let Some(tier) = request.tier.as_ref().or(self.tier.as_ref()) {
            query.push(("tier", tier.clone()));
        }

        let response = self.http.get(&url).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BuildError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let build: BuildResult = serde_json::from_str(&body)?;
        if build.mode() != request.mode {
            return Err(BuildError::Upstream(format!(
                "asked for a {} build, got {}",
                request.mode,
                build.mode()
            )));
        }
        Ok(build)
    }
}

/// The configured build source, or `Disabled` when no provider URL is set.
pub enum HttpBuildProvider {
    Active(HttpBuildClient),
    Disabled,
}

impl HttpBuildProvider {
    pub fn from_settings(
        provider_url: Option<&str>,
        region: Option<String>,
        tier: Option<String>,
    ) -> Result<Self, BuildError> {
        match provider_url {
            Some(url) if !url.trim().is_empty() => Ok(HttpBuildProvider::Active(
                HttpBuildClient::new(url.trim(), region, tier)?,
            )),
            _ => Ok(HttpBuildProvider::Disabled),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, HttpBuildProvider::Active(_))
    }
}

#[async_trait]
impl BuildProvider for HttpBuildProvider {
    async fn get_build(&self, request: &BuildRequest) -> Result<BuildResult, BuildError> {
        match self {
            HttpBuildProvider::Active(client) => client.get_build(request).await,
            HttpBuildProvider::Disabled => Err(BuildError::Disabled),
        }
    }
}
