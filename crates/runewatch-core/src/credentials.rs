// Control-API credential discovery.
//
// Strategies run in a fixed order and each one is best-effort: a failed
// strategy yields `None` and the next one is tried. Results are never cached
// here; the connector decides when to probe again.

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sysinfo::System;
use tracing::debug;

/// Lockfiles larger than this are rejected without being parsed.
pub const MAX_LOCKFILE_BYTES: u64 = 1024;

/// Client logs larger than this are skipped by log forensics.
const MAX_CLIENT_LOG_BYTES: u64 = 16 * 1024 * 1024;

const CLIENT_PROCESS_NAMES: &[&str] = &["LeagueClientUx.exe", "LeagueClientUx"];
const CLIENT_LOG_MARKER: &str = "LeagueClientUx";
const PORT_FLAG: &str = "--app-port";
const TOKEN_FLAG: &str = "--remoting-auth-token";

/// Username paired with the discovered token for Basic auth.
pub const AUTH_USER: &str = "riot";

/// Port and auth token of a running client's control API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub port: u16,
    pub token: String,
}

impl Credentials {
    pub fn new(port: u16, token: impl Into<String>) -> Self {
        Self {
            port,
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("https://127.0.0.1:{}", self.port)
    }

    pub fn websocket_url(&self) -> String {
        format!("wss://127.0.0.1:{}/", self.port)
    }

    /// Value for the `Authorization` header.
    pub fn basic_auth_header(&self) -> String {
        let raw = format!("{AUTH_USER}:{}", self.token);
        format!("Basic {}", BASE64.encode(raw))
    }
}

// The token grants full control of the client; keep it out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("port", &self.port)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Anything that can produce control-API credentials.
pub trait CredentialSource: Send + Sync {
    fn discover(&self) -> Option<Credentials>;
}

/// Inputs for [`CredentialDiscovery`], built from the `[lcu]` config section
/// and the credentials override.
#[derive(Debug, Clone, Default)]
pub struct DiscoverySettings {
    pub override_credentials: Option<Credentials>,
    pub extra_lockfile_paths: Vec<PathBuf>,
    pub client_log_dirs: Vec<PathBuf>,
}

/// The production credential source.
pub struct CredentialDiscovery {
    settings: DiscoverySettings,
}

impl CredentialDiscovery {
    pub fn new(settings: DiscoverySettings) -> Self {
        Self { settings }
    }

    fn from_override(&self) -> Option<Credentials> {
        self.settings
            .override_credentials
            .clone()
            .filter(|c| c.port > 0 && !c.token.is_empty())
    }

    /// Reads the client helper's command line from the process table, or
    /// the lockfile next to its executable when the command line is hidden.
    fn from_process_table(&self) -> Option<Credentials> {
        let system = System::new_all();
        for name in CLIENT_PROCESS_NAMES {
            for process in system.processes_by_name(OsStr::new(name)) {
                let args: Vec<String> = process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .collect();
                if let Some(creds) = parse_command_line(&args) {
                    return Some(creds);
                }
                let beside_exe = process
                    .exe()
                    .and_then(Path::parent)
                    .map(|dir| dir.join("lockfile"));
                if let Some(creds) = beside_exe.as_deref().and_then(read_lockfile) {
                    return Some(creds);
                }
            }
        }
        None
    }

    /// Scans the newest client log for the launch flags.
    fn from_client_logs(&self) -> Option<Credentials> {
        let dirs: Vec<PathBuf> = self
            .settings
            .client_log_dirs
            .iter()
            .cloned()
            .chain(default_log_dirs())
            .collect();
        let newest = newest_client_log(&dirs)?;
        let contents = fs::read_to_string(&newest).ok()?;
        let found = scan_log_for_credentials(&contents);
        if found.is_some() {
            debug!("found control API flags in {}", newest.display());
        }
        found
    }

    fn from_lockfiles(&self) -> Option<Credentials> {
        self.lockfile_candidates()
            .iter()
            .find_map(|path| read_lockfile(path))
    }

    /// Built-in install locations for this OS followed by configured extras.
    pub fn lockfile_candidates(&self) -> Vec<PathBuf> {
        let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
        let mut candidates = default_lockfile_candidates(home.as_deref());
        candidates.extend(self.settings.extra_lockfile_paths.iter().cloned());
        candidates
    }
}

impl CredentialSource for CredentialDiscovery {
    fn discover(&self) -> Option<Credentials> {
        if let Some(creds) = self.from_override() {
            debug!("using configured control API credentials");
            return Some(creds);
        }
        if let Some(creds) = self.from_process_table() {
            debug!(port = creds.port, "control API credentials from process table");
            return Some(creds);
        }
        if let Some(creds) = self.from_client_logs() {
            debug!(port = creds.port, "control API credentials from client log");
            return Some(creds);
        }
        let creds = self.from_lockfiles()?;
        debug!(port = creds.port, "control API credentials from lockfile");
        Some(creds)
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Parse lockfile contents of the form `name:pid:port:password:protocol`.
pub fn parse_lockfile(contents: &str) -> Option<Credentials> {
    let parts: Vec<&str> = contents.trim().split(':').collect();
    if parts.len() != 5 {
        return None;
    }
    let port: u16 = parts[2].trim().parse().ok()?;
    let token = parts[3].trim();
    if port == 0 || token.is_empty() {
        return None;
    }
    Some(Credentials::new(port, token))
}

/// Read and validate a lockfile, rejecting anything over
/// [`MAX_LOCKFILE_BYTES`].
pub fn read_lockfile(path: &Path) -> Option<Credentials> {
    let meta = fs::metadata(path).ok()?;
    if !meta.is_file() || meta.len() > MAX_LOCKFILE_BYTES {
        return None;
    }
    let contents = fs::read_to_string(path).ok()?;
    parse_lockfile(&contents)
}

/// Extract `--app-port` and `--remoting-auth-token` from a command line.
///
/// Accepts `--flag=value` and `--flag value`, with optional surrounding
/// quotes as they appear in client logs.
pub fn parse_command_line<S: AsRef<str>>(args: &[S]) -> Option<Credentials> {
    let mut port: Option<u16> = None;
    let mut token: Option<String> = None;

    let mut iter = args.iter().map(|a| clean_arg(a.as_ref())).peekable();
    while let Some(arg) = iter.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag, Some(value)),
            None => (arg, None),
        };
        if flag != PORT_FLAG && flag != TOKEN_FLAG {
            continue;
        }
        let value = match inline {
            Some(value) => value,
            None => match iter.next_if(|next| !next.starts_with("--")) {
                Some(next) => next,
                None => continue,
            },
        };
        if flag == PORT_FLAG {
            port = value.parse().ok().filter(|p| *p > 0).or(port);
        } else if !value.is_empty() {
            token = Some(value.to_string());
        }
    }

    Some(Credentials::new(port?, token?))
}

fn clean_arg(arg: &str) -> &str {
    arg.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == ',')
}

/// The last line in a log that carries both flags wins.
fn scan_log_for_credentials(contents: &str) -> Option<Credentials> {
    contents
        .lines()
        .rev()
        .filter(|line| line.contains(PORT_FLAG) && line.contains(TOKEN_FLAG))
        .find_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            parse_command_line(&tokens)
        })
}

fn newest_client_log(dirs: &[PathBuf]) -> Option<PathBuf> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for dir in dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_client_log = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(CLIENT_LOG_MARKER) && n.ends_with(".log"));
            if !is_client_log {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if !meta.is_file() || meta.len() > MAX_CLIENT_LOG_BYTES {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if newest.as_ref().map_or(true, |(at, _)| modified > *at) {
                newest = Some((modified, path));
            }
        }
    }
    newest.map(|(_, path)| path)
}

/// Install-path lockfile candidates for the current OS.
pub fn default_lockfile_candidates(home: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if cfg!(target_os = "windows") {
        let drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
        let root = PathBuf::from(format!("{drive}\\"));
        for prefix in ["", "Program Files", "Program Files (x86)"] {
            let mut path = root.clone();
            if !prefix.is_empty() {
                path.push(prefix);
            }
            candidates.push(path.join("Riot Games").join("League of Legends").join("lockfile"));
        }
    } else if cfg!(target_os = "macos") {
        candidates.push(PathBuf::from(
            "/Applications/League of Legends.app/Contents/LoL/lockfile",
        ));
        if let Some(home) = home {
            candidates.push(
                home.join("Applications/League of Legends.app/Contents/LoL/lockfile"),
            );
        }
    } else if let Some(home) = home {
        // Wine and Lutris prefixes.
        for prefix in [
            ".wine",
            "Games/league-of-legends",
            "Games/league-of-legends/wine",
            ".local/share/lutris/runners/wine/league-of-legends",
        ] {
            candidates.push(
                home.join(prefix)
                    .join("drive_c/Riot Games/League of Legends/lockfile"),
            );
        }
    }

    candidates
}

fn default_log_dirs() -> Vec<PathBuf> {
    if cfg!(target_os = "windows") {
        let drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
        vec![PathBuf::from(format!(
            "{drive}\\Riot Games\\League of Legends\\Logs\\LeagueClient Logs"
        ))]
    } else if cfg!(target_os = "macos") {
        vec![PathBuf::from(
            "/Applications/League of Legends.app/Contents/LoL/Logs/LeagueClient Logs",
        )]
    } else {
        Vec::new()
    }
}
