//! Application-level configuration loading: player palette, room capacity and
//! protocol tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::transitions::SessionRules;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "STORY_RELAY_CONFIG_PATH";

/// Built-in player palette, handed out in order.
pub const DEFAULT_PALETTE: [&str; 10] = [
    "#E53935", "#1E88E5", "#43A047", "#FDD835", "#8E24AA", "#FB8C00", "#00ACC1", "#D81B60",
    "#6D4C41", "#3949AB",
];

const DEFAULT_MAX_PLAYERS: usize = 10;
const DEFAULT_MAX_TRANSITION_ATTEMPTS: u32 = 5;
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 10;
const DEFAULT_MAX_STORY_CHARS: usize = 120;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    palette: Vec<String>,
    max_players: usize,
    max_transition_attempts: u32,
    heartbeat_interval: Duration,
    max_story_chars: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        colors = app_config.palette.len(),
                        max_players = app_config.max_players,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Rules handed to every transition.
    pub fn session_rules(&self) -> SessionRules {
        SessionRules {
            palette: self.palette.clone(),
            max_players: self.max_players,
            max_submission_chars: self.max_story_chars,
        }
    }

    /// How many times a conflicting transition is recomputed before giving up.
    pub fn max_transition_attempts(&self) -> u32 {
        self.max_transition_attempts
    }

    /// Interval at which presence clients are expected to send heartbeats.
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Override the retry budget.
    pub fn with_max_transition_attempts(mut self, attempts: u32) -> Self {
        self.max_transition_attempts = attempts.max(1);
        self
    }

    /// Override the room capacity.
    pub fn with_max_players(mut self, max_players: usize) -> Self {
        self.max_players = max_players;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.iter().map(|color| color.to_string()).collect(),
            max_players: DEFAULT_MAX_PLAYERS,
            max_transition_attempts: DEFAULT_MAX_TRANSITION_ATTEMPTS,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            max_story_chars: DEFAULT_MAX_STORY_CHARS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    palette: Option<Vec<String>>,
    max_players: Option<usize>,
    max_transition_attempts: Option<u32>,
    heartbeat_interval_secs: Option<u64>,
    max_story_chars: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let palette = value
            .palette
            .map(|colors| {
                colors
                    .into_iter()
                    .map(|color| color.trim().to_string())
                    .filter(|color| !color.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|colors| !colors.is_empty())
            .unwrap_or(defaults.palette);

        Self {
            palette,
            max_players: value
                .max_players
                .filter(|max| *max >= 2)
                .unwrap_or(defaults.max_players),
            max_transition_attempts: value
                .max_transition_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.max_transition_attempts),
            heartbeat_interval: value
                .heartbeat_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_interval),
            max_story_chars: value
                .max_story_chars
                .filter(|chars| *chars > 0)
                .unwrap_or(defaults.max_story_chars),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let raw: RawConfig = serde_json::from_str(r#"{"max_players": 4}"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.max_players, 4);
        assert_eq!(config.palette.len(), DEFAULT_PALETTE.len());
        assert_eq!(config.max_transition_attempts(), 5);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(10));
    }

    #[test]
    fn nonsensical_values_fall_back() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"palette": ["  ", ""], "max_players": 1, "max_transition_attempts": 0}"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.palette.len(), DEFAULT_PALETTE.len());
        assert_eq!(config.max_players, DEFAULT_MAX_PLAYERS);
        assert_eq!(config.max_transition_attempts(), DEFAULT_MAX_TRANSITION_ATTEMPTS);
    }

    #[test]
    fn session_rules_mirror_the_config() {
        let raw: RawConfig =
            serde_json::from_str(r##"{"palette": ["#000000"], "max_story_chars": 40}"##).unwrap();
        let rules = AppConfig::from(raw).session_rules();
        assert_eq!(rules.palette, vec!["#000000".to_string()]);
        assert_eq!(rules.max_submission_chars, 40);
    }
}
