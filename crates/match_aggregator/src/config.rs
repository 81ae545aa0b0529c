//! Runtime configuration, read from the environment (`.env` is loaded by the binaries).

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::token::PLACEHOLDER_FALLBACK_TOKEN;

pub const DEFAULT_BATCH_SIZE: usize = 5;
/// 5 events × (8 fixed calls + live stats)
pub const DEFAULT_MAX_IN_FLIGHT: usize = 45;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub odds_api_base: String,
    pub stats_api_base: String,
    pub live_stats_api_base: String,
    /// Env var holding the externally issued live-stats token, re-read every cycle.
    pub live_stats_token_var: String,
    /// Used only when no external token is configured. Placeholder by default, rotate it.
    pub fallback_token: Option<String>,
    pub upstream_origin: String,
    pub flag_icon_base: String,
    pub sport_id: u32,
    pub upstream_timeout: Duration,
    pub batch_size: usize,
    pub max_in_flight: usize,
    pub log_dir: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            odds_api_base: "https://sportsbook.example.invalid/api".to_string(),
            stats_api_base: "https://stats.example.invalid/api".to_string(),
            live_stats_api_base: "https://livestats.example.invalid".to_string(),
            live_stats_token_var: "LIVESTATS_TOKEN".to_string(),
            fallback_token: Some(PLACEHOLDER_FALLBACK_TOKEN.to_string()),
            upstream_origin: "https://www.example.invalid".to_string(),
            flag_icon_base: "https://flagcdn.com/w40".to_string(),
            sport_id: 1,
            upstream_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            log_dir: None,
        }
    }
}

impl HubConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let fallback_token = match env::var("LIVESTATS_FALLBACK_TOKEN") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v.trim().to_string()),
            Err(_) => defaults.fallback_token,
        };

        let log_dir = match env::var("HUB_LOG_DIR") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(PathBuf::from(v.trim())),
            Err(_) => Some(PathBuf::from("logs")),
        };

        Self {
            odds_api_base: env_string("ODDS_API_BASE").unwrap_or(defaults.odds_api_base),
            stats_api_base: env_string("STATS_API_BASE").unwrap_or(defaults.stats_api_base),
            live_stats_api_base: env_string("LIVESTATS_API_BASE").unwrap_or(defaults.live_stats_api_base),
            live_stats_token_var: defaults.live_stats_token_var,
            fallback_token,
            upstream_origin: env_string("UPSTREAM_ORIGIN").unwrap_or(defaults.upstream_origin),
            flag_icon_base: env_string("FLAG_ICON_BASE").unwrap_or(defaults.flag_icon_base),
            sport_id: env_parse("SPORT_ID").unwrap_or(defaults.sport_id),
            upstream_timeout: env_parse("UPSTREAM_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.upstream_timeout),
            batch_size: env_parse("ENRICH_BATCH_SIZE")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.batch_size),
            max_in_flight: env_parse("ENRICH_MAX_IN_FLIGHT")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_in_flight),
            log_dir,
        }
    }
}

/// Static credential gate in front of the HTTP surface. Disabled unless both halves are set.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub basic_auth: Option<(String, String)>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let bind = env::var("HUB_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8090".to_string());
        let bind: SocketAddr = bind.parse().context("Invalid HUB_HTTP_BIND")?;
        let basic_auth = match (env_string("HUB_BASIC_AUTH_USER"), env_string("HUB_BASIC_AUTH_PASS")) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        };
        Ok(Self { bind, basic_auth })
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
