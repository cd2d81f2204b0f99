use crate::error::{config_error, env_error, BotResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Root of the department site the events listing lives on
pub const DEFAULT_BASE_URL: &str = "https://www.physics.upenn.edu";

/// Substring every scraped source link carries
pub const DEFAULT_LINK_MARKER: &str = "physics.upenn.edu/events/";

/// Zone label attached to every created event
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

pub const DEFAULT_REDIRECT_PORT: u16 = 8080;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;

/// Calendar settings file as stored on disk
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    calendar_id: String,
    time_zone: Option<String>,
    base_url: Option<String>,
    link_marker: Option<String>,
    redirect_port: Option<u16>,
    probe_timeout_secs: Option<u64>,
    stale_on_probe_error: Option<bool>,
}

/// Main configuration structure, loaded once per run
#[derive(Debug, Clone)]
pub struct Config {
    /// Google Calendar ID to sync into
    pub calendar_id: String,
    /// Zone attached to created events
    pub timezone: Tz,
    /// Department site root, without trailing slash
    pub base_url: String,
    /// Marks calendar entries owned by this tool
    pub link_marker: String,
    /// Persisted OAuth session
    pub token_path: PathBuf,
    /// Google client secrets file
    pub credentials_path: PathBuf,
    /// Local port for the OAuth redirect
    pub redirect_port: u16,
    /// Per-request timeout for liveness probes
    pub probe_timeout_secs: u64,
    /// Delete events whose link could not be reached at all
    pub stale_on_probe_error: bool,
}

impl Config {
    /// Load configuration from environment and the settings file
    pub fn load() -> BotResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let settings_path = env_path("PHYSCAL_SETTINGS", "cal.json");
        let token_path = env_path("PHYSCAL_TOKEN", "token.json");
        let credentials_path = env_path("PHYSCAL_CREDENTIALS", "credentials.json");

        let mut config = Self::from_settings_file(&settings_path, token_path, credentials_path)?;

        if let Ok(tz) = env::var("TIMEZONE") {
            config.timezone = timezone_override(&tz)?;
        }

        Ok(config)
    }

    /// Build a config from a settings file and explicit credential paths
    pub fn from_settings_file(
        settings_path: &Path,
        token_path: PathBuf,
        credentials_path: PathBuf,
    ) -> BotResult<Self> {
        let content = fs::read_to_string(settings_path).map_err(|e| {
            config_error(&format!(
                "Failed to read settings file {}: {}",
                settings_path.display(),
                e
            ))
        })?;
        let settings: SettingsFile = serde_json::from_str(&content).map_err(|e| {
            config_error(&format!(
                "Invalid settings file {}: {}",
                settings_path.display(),
                e
            ))
        })?;

        if settings.calendar_id.trim().is_empty() {
            return Err(config_error("calendarId must not be empty"));
        }

        let timezone = parse_timezone(settings.time_zone.as_deref().unwrap_or(DEFAULT_TIMEZONE))?;
        let base_url = settings
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url)?;

        Ok(Config {
            calendar_id: settings.calendar_id,
            timezone,
            base_url,
            link_marker: settings
                .link_marker
                .unwrap_or_else(|| DEFAULT_LINK_MARKER.to_string()),
            token_path,
            credentials_path,
            redirect_port: settings.redirect_port.unwrap_or(DEFAULT_REDIRECT_PORT),
            probe_timeout_secs: settings
                .probe_timeout_secs
                .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS),
            stale_on_probe_error: settings.stale_on_probe_error.unwrap_or(false),
        })
    }

    /// URL of the events listing
    pub fn events_url(&self) -> String {
        format!("{}/events/", self.base_url)
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

/// Zone from the `TIMEZONE` variable, which wins over the settings file
fn timezone_override(value: &str) -> BotResult<Tz> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|_| env_error("TIMEZONE", &format!("unknown timezone '{}'", value)))
}

fn parse_timezone(name: &str) -> BotResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| config_error(&format!("Unknown timezone: {}", name)))
}
