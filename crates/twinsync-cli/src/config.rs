//! Configuration vault – reads/writes `~/.twinsync/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use twinsync_runtime::camera::DEFAULT_HA_URL;
use twinsync_runtime::checker::DEFAULT_CHECK_ALL_CONCURRENCY;
use twinsync_runtime::vision::DEFAULT_GEMINI_MODEL;
use twinsync_server::DEFAULT_PORT;

/// Persisted settings stored in `~/.twinsync/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP port of the JSON API.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Gemini model used for snapshot analysis.
    #[serde(default = "default_model")]
    pub gemini_model: String,

    /// Gemini API key (plain text; the file is written owner-only).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gemini_api_key: String,

    /// Home Assistant Core API root.
    #[serde(default = "default_ha_url")]
    pub ha_url: String,

    /// Supervisor token used for the Core API.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub supervisor_token: String,

    /// Spots checked at once by "check all".
    #[serde(default = "default_concurrency")]
    pub check_all_concurrency: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_port", &self.api_port)
            .field("database_path", &self.database_path)
            .field("gemini_model", &self.gemini_model)
            .field("gemini_api_key", redacted(&self.gemini_api_key))
            .field("ha_url", &self.ha_url)
            .field("supervisor_token", redacted(&self.supervisor_token))
            .field("check_all_concurrency", &self.check_all_concurrency)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static &'static str {
    if secret.is_empty() {
        &"<not set>"
    } else {
        &"<redacted>"
    }
}

impl Config {
    pub fn gemini_api_key(&self) -> Option<String> {
        non_empty(&self.gemini_api_key)
    }

    pub fn supervisor_token(&self) -> Option<String> {
        non_empty(&self.supervisor_token)
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn default_api_port() -> u16 {
    DEFAULT_PORT
}
fn default_database_path() -> String {
    home_dir()
        .join(".twinsync")
        .join("twinsync_spot.db")
        .to_string_lossy()
        .into_owned()
}
fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}
fn default_ha_url() -> String {
    DEFAULT_HA_URL.to_string()
}
fn default_concurrency() -> usize {
    DEFAULT_CHECK_ALL_CONCURRENCY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            database_path: default_database_path(),
            gemini_model: default_model(),
            gemini_api_key: String::new(),
            ha_url: default_ha_url(),
            supervisor_token: String::new(),
            check_all_concurrency: default_concurrency(),
        }
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Return the path to `~/.twinsync/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &Path) -> PathBuf {
    home.join(".twinsync").join("config.toml")
}

/// Load the config from disk with environment overrides applied.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config file exactly as written, without environment overrides.
///
/// Anything that saves the config back must start from this, otherwise
/// secrets and overrides from the environment end up on disk.
pub fn load_file() -> Result<Option<Config>, String> {
    read_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    Ok(read_from(path)?.map(|mut cfg| {
        apply_env_overrides(&mut cfg);
        cfg
    }))
}

pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `GEMINI_API_KEY` | `gemini_api_key` |
/// | `SUPERVISOR_TOKEN` | `supervisor_token` |
/// | `TWINSYNC_PORT` | `api_port` |
/// | `TWINSYNC_DB` | `database_path` |
/// | `TWINSYNC_MODEL` | `gemini_model` |
/// | `TWINSYNC_HA_URL` | `ha_url` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |name| std::env::var(name).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("GEMINI_API_KEY") {
        cfg.gemini_api_key = v;
    }
    if let Some(v) = var("SUPERVISOR_TOKEN") {
        cfg.supervisor_token = v;
    }
    if let Some(v) = var("TWINSYNC_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.api_port = port;
    }
    if let Some(v) = var("TWINSYNC_DB") {
        cfg.database_path = v;
    }
    if let Some(v) = var("TWINSYNC_MODEL") {
        cfg.gemini_model = v;
    }
    if let Some(v) = var("TWINSYNC_HA_URL") {
        cfg.ha_url = v;
    }
}

/// Save the config to disk, creating `~/.twinsync/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
