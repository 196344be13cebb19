// Configuration loading and parsing (runewatch.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::build::SelfHealSettings;
use crate::context::ManagerSettings;
use crate::credentials::{Credentials, DiscoverySettings};
use crate::lcu::ConnectorSettings;
use crate::live::WatcherSettings;

pub const ENV_LCU_PORT: &str = "RUNEWATCH_LCU_PORT";
pub const ENV_LCU_TOKEN: &str = "RUNEWATCH_LCU_TOKEN";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub lcu: LcuConfig,
    pub live: LiveConfig,
    pub context: ContextConfig,
    pub cache: CacheConfig,
    pub self_heal: SelfHealConfig,
    pub builds: BuildsConfig,
    pub data_dragon: DataDragonConfig,
    /// From `credentials.toml` and the environment, not `runewatch.toml`.
    #[serde(skip)]
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// runewatch.toml sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub locale: String,
    pub log_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            locale: "en_US".into(),
            log_dir: "logs".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LcuConfig {
    pub probe_interval_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_factor: f64,
    pub backoff_max_ms: u64,
    pub missing_credentials_log_secs: u64,
    pub request_timeout_ms: u64,
    pub match_history_count: usize,
    pub extra_lockfile_paths: Vec<PathBuf>,
    /// Directories searched for client logs when the process table is not
    /// readable.
    pub client_log_dirs: Vec<PathBuf>,
}

impl Default for LcuConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: 2000,
            backoff_base_ms: 2000,
            backoff_factor: 1.5,
            backoff_max_ms: 15_000,
            missing_credentials_log_secs: 30,
            request_timeout_ms: 5000,
            match_history_count: 20,
            extra_lockfile_paths: Vec::new(),
            client_log_dirs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub url: String,
    pub poll_connected_ms: u64,
    pub poll_idle_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: crate::live::source::DEFAULT_LIVE_URL.into(),
            poll_connected_ms: 1500,
            poll_idle_ms: 5000,
            request_timeout_ms: 800,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub supervise_interval_ms: u64,
    pub debounce_ms: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            supervise_interval_ms: 1500,
            debounce_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub career_ttl_secs: u64,
    pub summoner_ttl_secs: u64,
    pub lookup_capacity: usize,
    pub build_ttl_hours: u64,
    pub build_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            career_ttl_secs: 45,
            summoner_ttl_secs: 20,
            lookup_capacity: 256,
            build_ttl_hours: 12,
            build_capacity: 512,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelfHealConfig {
    pub cooldown_hours: u64,
    pub extended_item_id_min: i64,
    pub extended_item_base_modulus: i64,
    pub min_summoner_spells: usize,
}

impl Default for SelfHealConfig {
    fn default() -> Self {
        Self {
            cooldown_hours: 6,
            extended_item_id_min: 100_000,
            extended_item_base_modulus: 10_000,
            min_summoner_spells: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildsConfig {
    /// Build service base URL. The provider is disabled when unset.
    pub provider_url: Option<String>,
    pub region: Option<String>,
    pub tier: Option<String>,
    /// Source-variant tag folded into the build cache key.
    pub variant: String,
}

impl Default for BuildsConfig {
    fn default() -> Self {
        Self {
            provider_url: None,
            region: None,
            tier: None,
            variant: "default".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataDragonConfig {
    pub base_url: String,
}

impl Default for DataDragonConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ddragon.leagueoflegends.com".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub lcu_port: Option<u16>,
    pub lcu_token: Option<String>,
}

impl CredentialsConfig {
    /// Both halves are needed for an override.
    pub fn override_credentials(&self) -> Option<Credentials> {
        match (self.lcu_port, self.lcu_token.as_deref()) {
            (Some(port), Some(token)) if port > 0 && !token.is_empty() => {
                Some(Credentials::new(port, token))
            }
            _ => None,
        }
    }

    /// Apply `RUNEWATCH_LCU_PORT` / `RUNEWATCH_LCU_TOKEN`, which take
    /// precedence over the file.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(port) = var(ENV_LCU_PORT) {
            let parsed = port
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::ValidationError {
                    field: ENV_LCU_PORT.into(),
                    message: format!("not a port number: {e}"),
                })?;
            self.lcu_port = Some(parsed);
        }
        if let Some(token) = var(ENV_LCU_TOKEN) {
            self.lcu_token = Some(token.trim().to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Conversions into component settings
// ---------------------------------------------------------------------------

impl Config {
    pub fn connector_settings(&self) -> ConnectorSettings {
        ConnectorSettings {
            probe_interval: Duration::from_millis(self.lcu.probe_interval_ms),
            backoff_base: Duration::from_millis(self.lcu.backoff_base_ms),
            backoff_factor: self.lcu.backoff_factor,
            backoff_max: Duration::from_millis(self.lcu.backoff_max_ms),
            missing_credentials_log_interval: Duration::from_secs(
                self.lcu.missing_credentials_log_secs,
            ),
            career_ttl: Duration::from_secs(self.cache.career_ttl_secs),
            summoner_ttl: Duration::from_secs(self.cache.summoner_ttl_secs),
            lookup_capacity: self.cache.lookup_capacity,
            match_history_count: self.lcu.match_history_count,
        }
    }

    pub fn watcher_settings(&self) -> WatcherSettings {
        WatcherSettings {
            poll_connected: Duration::from_millis(self.live.poll_connected_ms),
            poll_idle: Duration::from_millis(self.live.poll_idle_ms),
        }
    }

    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            connector: self.connector_settings(),
            watcher: self.watcher_settings(),
            supervise_interval: Duration::from_millis(self.context.supervise_interval_ms),
            debounce: Duration::from_millis(self.context.debounce_ms),
            locale: self.general.locale.clone(),
        }
    }

    pub fn self_heal_settings(&self) -> SelfHealSettings {
        SelfHealSettings {
            cooldown: Duration::from_secs(self.self_heal.cooldown_hours * 60 * 60),
            extended_item_id_min: self.self_heal.extended_item_id_min,
            extended_item_base_modulus: self.self_heal.extended_item_base_modulus,
            min_summoner_spells: self.self_heal.min_summoner_spells,
        }
    }

    pub fn discovery_settings(&self) -> DiscoverySettings {
        DiscoverySettings {
            override_credentials: self.credentials.override_credentials(),
            extra_lockfile_paths: self.lcu.extra_lockfile_paths.clone(),
            client_log_dirs: self.lcu.client_log_dirs.clone(),
        }
    }

    pub fn lcu_request_timeout(&self) -> Duration {
        Duration::from_millis(self.lcu.request_timeout_ms)
    }

    pub fn live_request_timeout(&self) -> Duration {
        Duration::from_millis(self.live.request_timeout_ms)
    }

    pub fn build_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.build_ttl_hours * 60 * 60)
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/runewatch.toml` and (optionally)
/// `config/credentials.toml` relative to `base_dir`. Environment overrides
/// are not applied here.
///
/// Does not copy defaults; prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let main_path = config_dir.join("runewatch.toml");
    let main_text = read_file(&main_path)?;
    let mut config: Config = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
        path: main_path.clone(),
        source: e,
    })?;

    let credentials_path = config_dir.join("credentials.toml");
    if credentials_path.exists() {
        let text = read_file(&credentials_path)?;
        config.credentials = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?;
    }

    validate(&config)?;
    Ok(config)
}

/// Copy every `defaults/*.toml` that is missing from `config/`.
///
/// Existing files are never touched, and templates such as
/// `credentials.toml.example` stay behind. Returns the copied paths in name
/// order.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(copy_error(format!(
            "neither defaults/ nor config/ directory found in {}; \
             run from the project root or ensure defaults/ is present",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("failed to create config directory: {e}")))?;

    let mut templates: Vec<PathBuf> = std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_error(format!("failed to read defaults directory: {e}")))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    templates.sort();

    let mut copied = Vec::new();
    for template in templates {
        let Some(file_name) = template.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);
        if copy_if_absent(&template, &target)? {
            info!("created {} from defaults", target.display());
            copied.push(target);
        }
    }
    Ok(copied)
}

/// `create_new` makes the existence check and the create one step.
fn copy_if_absent(from: &Path, to: &Path) -> Result<bool, ConfigError> {
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(format!("failed to create {}: {e}", to.display()))),
    };
    let content = std::fs::read(from)
        .map_err(|e| copy_error(format!("failed to read {}: {e}", from.display())))?;
    std::io::Write::write_all(&mut dest, &content)
        .map_err(|e| copy_error(format!("failed to write {}: {e}", to.display())))?;
    Ok(true)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Load config relative to the current working directory, copying defaults
/// first and applying environment overrides last.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    let mut config = load_config_from(&cwd)?;
    config
        .credentials
        .apply_env(|name| std::env::var(name).ok())?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.general.locale.trim().is_empty() {
        return Err(invalid("general.locale", "must not be empty"));
    }

    let intervals: &[(&str, u64)] = &[
        ("lcu.probe_interval_ms", config.lcu.probe_interval_ms),
        ("lcu.backoff_base_ms", config.lcu.backoff_base_ms),
        ("lcu.backoff_max_ms", config.lcu.backoff_max_ms),
        (
            "lcu.missing_credentials_log_secs",
            config.lcu.missing_credentials_log_secs,
        ),
        ("lcu.request_timeout_ms", config.lcu.request_timeout_ms),
        ("live.poll_connected_ms", config.live.poll_connected_ms),
        ("live.poll_idle_ms", config.live.poll_idle_ms),
        ("live.request_timeout_ms", config.live.request_timeout_ms),
        ("context.supervise_interval_ms", config.context.supervise_interval_ms),
        ("context.debounce_ms", config.context.debounce_ms),
        ("cache.career_ttl_secs", config.cache.career_ttl_secs),
        ("cache.summoner_ttl_secs", config.cache.summoner_ttl_secs),
        ("cache.build_ttl_hours", config.cache.build_ttl_hours),
        ("self_heal.cooldown_hours", config.self_heal.cooldown_hours),
    ];
    for (name, val) in intervals {
        if *val == 0 {
            return Err(invalid(name, "must be > 0"));
        }
    }

    let factor = config.lcu.backoff_factor;
    if !factor.is_finite() || factor < 1.0 {
        return Err(invalid(
            "lcu.backoff_factor",
            format!("must be >= 1.0, got {factor}"),
        ));
    }
    if config.lcu.backoff_max_ms < config.lcu.backoff_base_ms {
        return Err(invalid(
            "lcu.backoff_max_ms",
            format!(
                "must be >= lcu.backoff_base_ms ({}), got {}",
                config.lcu.backoff_base_ms, config.lcu.backoff_max_ms
            ),
        ));
    }

    let capacities: &[(&str, usize)] = &[
        ("cache.lookup_capacity", config.cache.lookup_capacity),
        ("cache.build_capacity", config.cache.build_capacity),
        ("lcu.match_history_count", config.lcu.match_history_count),
    ];
    for (name, val) in capacities {
        if *val == 0 {
            return Err(invalid(name, "must be > 0"));
        }
    }

    if config.self_heal.extended_item_base_modulus <= 0 {
        return Err(invalid(
            "self_heal.extended_item_base_modulus",
            format!(
                "must be > 0, got {}",
                config.self_heal.extended_item_base_modulus
            ),
        ));
    }

    if config.live.url.trim().is_empty() {
        return Err(invalid("live.url", "must not be empty"));
    }
    if config.builds.variant.trim().is_empty() {
        return Err(invalid("builds.variant", "must not be empty"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
