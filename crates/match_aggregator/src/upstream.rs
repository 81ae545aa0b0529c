//! Outbound HTTP: endpoint table, request headers, cached JSON fetch.
//!
//! Every failure here (transport, status, bad JSON, `isSuccess: false`) ends
//! as `None` plus a warning; callers just see "no data".

use anyhow::{Context, Result};
use chrono::Utc;
use logger::{now_iso, EventLogger, UpstreamStatusEvent};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::error::FetchError;
use crate::types::ApiEnvelope;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Fixed limit for head-to-head, last-matches and referee lookups.
pub const HISTORY_LIMIT: u32 = 10;

// ====================================================================
// Call kinds
// ====================================================================

/// Reference calls issued once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceCall {
    EventList,
    MarketConfig,
    Competitions,
    PlayPercentages,
    MatchPopularity,
}

impl ReferenceCall {
    pub fn label(self) -> &'static str {
        match self {
            ReferenceCall::EventList => "event_list",
            ReferenceCall::MarketConfig => "market_config",
            ReferenceCall::Competitions => "competitions",
            ReferenceCall::PlayPercentages => "play_percentages",
            ReferenceCall::MatchPopularity => "match_popularity",
        }
    }

    pub fn ttl(self) -> Duration {
        match self {
            // must reflect live state
            ReferenceCall::EventList => Duration::ZERO,
            ReferenceCall::MarketConfig => Duration::from_secs(10 * 60),
            ReferenceCall::Competitions => Duration::from_secs(60 * 60),
            ReferenceCall::PlayPercentages | ReferenceCall::MatchPopularity => Duration::from_secs(30),
        }
    }
}

/// The fixed per-event call set, keyed by event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCall {
    Detail,
    Summary,
    HeadToHead,
    LastMatches,
    Analysis,
    MissingPlayers,
    Referee,
    Standings,
}

impl EventCall {
    pub const ALL: [EventCall; 8] = [
        EventCall::Detail,
        EventCall::Summary,
        EventCall::HeadToHead,
        EventCall::LastMatches,
        EventCall::Analysis,
        EventCall::MissingPlayers,
        EventCall::Referee,
        EventCall::Standings,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EventCall::Detail => "detail",
            EventCall::Summary => "summary",
            EventCall::HeadToHead => "head_to_head",
            EventCall::LastMatches => "last_matches",
            EventCall::Analysis => "analysis",
            EventCall::MissingPlayers => "missing_players",
            EventCall::Referee => "referee",
            EventCall::Standings => "standings",
        }
    }

    pub fn ttl(self) -> Duration {
        match self {
            EventCall::Detail => Duration::ZERO,
            EventCall::Summary => Duration::from_secs(60),
            _ => Duration::from_secs(5 * 60),
        }
    }
}

pub const LIVE_STATS_LABEL: &str = "live_stats";
/// Live stats are never cached.
pub const LIVE_STATS_TTL: Duration = Duration::ZERO;

// ====================================================================
// Endpoints
// ====================================================================

#[derive(Debug, Clone)]
pub struct Endpoints {
    odds: String,
    stats: String,
    live: String,
    sport_id: u32,
}

impl Endpoints {
    pub fn new(odds: &str, stats: &str, live: &str, sport_id: u32) -> Self {
        Self {
            odds: odds.trim_end_matches('/').to_string(),
            stats: stats.trim_end_matches('/').to_string(),
            live: live.trim_end_matches('/').to_string(),
            sport_id,
        }
    }

    pub fn reference(&self, call: ReferenceCall) -> String {
        let (odds, sport) = (&self.odds, self.sport_id);
        match call {
            ReferenceCall::EventList => format!("{odds}/sportsbook/events?sportId={sport}"),
            ReferenceCall::MarketConfig => format!("{odds}/sportsbook/config/markets"),
            ReferenceCall::Competitions => format!("{odds}/sportsbook/competitions?sportId={sport}"),
            ReferenceCall::PlayPercentages => format!("{odds}/sportsbook/percentages/outcomes?sportId={sport}"),
            ReferenceCall::MatchPopularity => format!("{odds}/sportsbook/percentages/events?sportId={sport}"),
        }
    }

    pub fn event(&self, call: EventCall, event_id: &str) -> String {
        let (odds, stats, limit) = (&self.odds, &self.stats, HISTORY_LIMIT);
        let id: String = url::form_urlencoded::byte_serialize(event_id.as_bytes()).collect();
        match call {
            EventCall::Detail => format!("{odds}/sportsbook/events/{id}?markets=all"),
            EventCall::Summary => format!("{stats}/match/{id}/summary"),
            EventCall::HeadToHead => format!("{stats}/match/{id}/head-to-head?limit={limit}"),
            EventCall::LastMatches => format!("{stats}/match/{id}/last-matches?limit={limit}"),
            EventCall::Analysis => format!("{stats}/match/{id}/analysis"),
            EventCall::MissingPlayers => format!("{stats}/match/{id}/missing-players"),
            EventCall::Referee => format!("{stats}/match/{id}/referee?limit={limit}"),
            EventCall::Standings => format!("{stats}/match/{id}/standings"),
        }
    }

    pub fn live_stats(&self, live_stats_id: &str, token: &str) -> String {
        let id: String = url::form_urlencoded::byte_serialize(live_stats_id.as_bytes()).collect();
        let token: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
        format!("{}/match/{id}/info?token={token}", self.live)
    }
}

/// Strips the token from live-stats URLs before they hit any log.
pub fn redact(url: &str) -> String {
    match url.find("token=") {
        Some(pos) => format!("{}token=***", &url[..pos]),
        None => url.to_string(),
    }
}

// ====================================================================
// HTTP client
// ====================================================================

pub struct UpstreamClient {
    http: reqwest::Client,
    origin: String,
}

impl UpstreamClient {
    pub fn new(timeout: Duration, origin: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to create reqwest client")?;
        Ok(Self {
            http,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }

    /// GET with the per-request headers a browser client would send.
    pub async fn get_json(&self, url: &str) -> std::result::Result<Value, FetchError> {
        let resp = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .header("Origin", &self.origin)
            .header("Referer", format!("{}/", self.origin))
            .header("x-transaction-id", Uuid::new_v4().to_string())
            .header("x-request-time", Utc::now().timestamp_millis().to_string())
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        resp.json::<Value>().await.map_err(FetchError::Decode)
    }
}

/// `{isSuccess: true, data: ..}` passes, anything else is a failure.
fn check_envelope(body: Value) -> std::result::Result<Value, FetchError> {
    match ApiEnvelope::deserialize(&body).ok() {
        Some(env) if env.is_success && env.data.as_ref().is_some_and(|d| !d.is_null()) => Ok(body),
        Some(env) => Err(FetchError::Unsuccessful(
            env.message.unwrap_or_else(|| "isSuccess=false or no data".to_string()),
        )),
        None => Err(FetchError::Unsuccessful("not an {isSuccess, data} envelope".to_string())),
    }
}

// ====================================================================
// Cached fetch
// ====================================================================

/// HTTP client + TTL cache + optional JSONL journal of failed calls.
pub struct Upstream {
    client: UpstreamClient,
    cache: TtlCache,
    journal: Option<Arc<EventLogger>>,
}

impl Upstream {
    pub fn new(client: UpstreamClient, journal: Option<Arc<EventLogger>>) -> Self {
        Self {
            client,
            cache: TtlCache::new(),
            journal,
        }
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// Enveloped endpoint. Returns the whole body (envelope included).
    pub async fn fetch_enveloped(&self, label: &str, url: &str, ttl: Duration) -> Option<Arc<Value>> {
        self.cache
            .get_or_fetch(url, ttl, || async {
                let result = self.client.get_json(url).await.and_then(check_envelope);
                self.settle(label, url, result)
            })
            .await
    }

    /// Endpoint without the `{isSuccess, data}` envelope (live stats).
    pub async fn fetch_raw(&self, label: &str, url: &str, ttl: Duration) -> Option<Arc<Value>> {
        self.cache
            .get_or_fetch(url, ttl, || async {
                let result = self.client.get_json(url).await;
                self.settle(label, url, result)
            })
            .await
    }

    fn settle(&self, label: &str, url: &str, result: std::result::Result<Value, FetchError>) -> Option<Value> {
        match result {
            Ok(v) => {
                debug!("{} OK {}", label, redact(url));
                Some(v)
            }
            Err(e) => {
                let url = redact(url);
                warn!("{} failed {}: {}", label, url, e);
                if let Some(journal) = &self.journal {
                    journal.log_or_warn(&UpstreamStatusEvent {
                        ts: now_iso(),
                        event: "UPSTREAM_STATUS",
                        call: label.to_string(),
                        url,
                        ok: false,
                        status_code: e.status_code(),
                        message: e.to_string(),
                    });
                }
                None
            }
        }
    }
}

/// `data` of an enveloped body.
pub fn envelope_data(body: &Value) -> Option<&Value> {
    body.get("data").filter(|d| !d.is_null())
}
