//! Runtime configuration, read from the environment.

use std::{env, time::Duration};

use crate::{
    sessions::{DEFAULT_IDLE_TTL, DEFAULT_MAX_SESSIONS},
    spotify::{DEFAULT_ACCOUNTS_BASE, DEFAULT_API_BASE, SpotifyConfig},
};

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_TICK_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub spotify: SpotifyConfig,
    /// Wall-clock interval between session ticks.
    pub session_tick: Duration,
    /// Sessions untouched for this long are stopped.
    pub session_idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            spotify: SpotifyConfig::default(),
            session_tick: Duration::from_millis(DEFAULT_TICK_MS),
            session_idle_ttl: DEFAULT_IDLE_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unparseable numbers fall back to
    /// their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT);
        let tick_ms = parse_or(&lookup, "SESSION_TICK_MS", DEFAULT_TICK_MS).max(1);
        let idle_ttl_secs =
            parse_or(&lookup, "SESSION_IDLE_TTL_SECS", DEFAULT_IDLE_TTL.as_secs()).max(1);
        let max_sessions = parse_or(&lookup, "MAX_SESSIONS", DEFAULT_MAX_SESSIONS).max(1);

        let spotify = SpotifyConfig {
            client_id: lookup("SPOTIFY_CLIENT_ID").filter(|v| !v.is_empty()),
            client_secret: lookup("SPOTIFY_CLIENT_SECRET").filter(|v| !v.is_empty()),
            api_base: lookup("SPOTIFY_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            accounts_base: lookup("SPOTIFY_ACCOUNTS_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_ACCOUNTS_BASE.to_string()),
        };

        tracing::debug!(
            has_client_id = spotify.client_id.is_some(),
            has_client_secret = spotify.client_secret.is_some(),
            "Loaded configuration"
        );

        Self {
            port,
            spotify,
            session_tick: Duration::from_millis(tick_ms),
            session_idle_ttl: Duration::from_secs(idle_ttl_secs),
            max_sessions,
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy + std::fmt::Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {key}={raw}, using {default}");
            default
        }),
        None => default,
    }
}
