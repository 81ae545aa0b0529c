//! One aggregation cycle: fetch → enrich → filter/sort → assemble.
//!
//! All process-wide state (cache, held token, semaphore) lives in one
//! `Aggregator` value. Clone it freely; separate instances share nothing.

use anyhow::Result;
use chrono::{DateTime, Utc};
use logger::{now_iso, AggregationCycleEvent, EventLogger};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::cache::CacheStats;
use crate::config::HubConfig;
use crate::enrich::Enricher;
use crate::error::AggregateError;
use crate::fetcher::{fetch_event_list, fetch_reference_data, retain_by_phase};
use crate::filter::{apply_query, EventQuery};
use crate::merge::{build_competition_maps, MarketConfigMap};
use crate::response::{assemble, AggregatedResponse};
use crate::token::{EnvTokenSource, TokenManager, TokenSource};
use crate::upstream::{Endpoints, Upstream, UpstreamClient};

struct Shared {
    upstream: Arc<Upstream>,
    endpoints: Arc<Endpoints>,
    tokens: TokenManager,
    enricher: Enricher,
    flag_icon_base: String,
    journal: Option<Arc<EventLogger>>,
}

#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<Shared>,
}

/// Diagnostics behind `GET /state`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorState {
    pub cache_live: usize,
    pub cache_expired: usize,
    pub token_held: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub token_valid: bool,
}

impl Aggregator {
    /// Token comes from `config.live_stats_token_var`, re-read every cycle.
    pub fn new(config: HubConfig) -> Result<Self> {
        let source = Box::new(EnvTokenSource::new(config.live_stats_token_var.clone()));
        Self::with_token_source(config, source)
    }

    pub fn with_token_source(config: HubConfig, source: Box<dyn TokenSource>) -> Result<Self> {
        let journal = config.log_dir.as_ref().map(|dir| Arc::new(EventLogger::new(dir)));
        if let Some(journal) = &journal {
            info!("journaling upstream status and cycles to {:?}", journal.log_dir());
        }
        let client = UpstreamClient::new(config.upstream_timeout, &config.upstream_origin)?;
        let upstream = Arc::new(Upstream::new(client, journal.clone()));
        let endpoints = Arc::new(Endpoints::new(
            &config.odds_api_base,
            &config.stats_api_base,
            &config.live_stats_api_base,
            config.sport_id,
        ));
        let enricher = Enricher::new(
            Arc::clone(&upstream),
            Arc::clone(&endpoints),
            config.batch_size,
            config.max_in_flight,
        );

        Ok(Self {
            inner: Arc::new(Shared {
                upstream,
                endpoints,
                tokens: TokenManager::new(source, config.fallback_token),
                enricher,
                flag_icon_base: config.flag_icon_base,
                journal,
            }),
        })
    }

    pub async fn aggregate(&self, query: &EventQuery) -> Result<AggregatedResponse, AggregateError> {
        let started = Instant::now();
        let s = &self.inner;

        let (list, reference, token) = tokio::join!(
            fetch_event_list(&s.upstream, &s.endpoints),
            fetch_reference_data(&s.upstream, &s.endpoints),
            s.tokens.get_token(),
        );

        let events = retain_by_phase(list.events, query.include_upcoming);
        let events_in = events.len();

        let (events, stats) = s.enricher.enrich(events, token.as_ref()).await?;
        let events = apply_query(events, query);

        let competitions = build_competition_maps(&reference.competitions, &s.flag_icon_base);
        let market_config = MarketConfigMap::build(reference.market_configs);

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "cycle: {} in → {} out | {} batches | calls issued={} skipped={} failed={} | live stats {} | {}ms",
            events_in,
            events.len(),
            stats.batches,
            stats.calls_issued,
            stats.calls_skipped,
            stats.calls_failed,
            if token.is_some() { "on" } else { "off" },
            duration_ms,
        );
        if let Some(journal) = &s.journal {
            journal.log_or_warn(&AggregationCycleEvent {
                ts: now_iso(),
                event: "AGGREGATION_CYCLE",
                events_in,
                events_out: events.len(),
                batches: stats.batches,
                calls_issued: stats.calls_issued,
                calls_skipped: stats.calls_skipped,
                calls_failed: stats.calls_failed,
                live_stats_enabled: token.is_some(),
                duration_ms,
            });
        }

        Ok(assemble(
            events,
            competitions,
            reference.play_percentages,
            reference.match_popularity,
            market_config,
            list.passthrough,
        ))
    }

    /// `aggregate` straight to a JSON string.
    pub async fn aggregate_json(&self, query: &EventQuery) -> Result<String, AggregateError> {
        let resp = self.aggregate(query).await?;
        Ok(serde_json::to_string(&resp)?)
    }

    pub async fn state(&self) -> AggregatorState {
        let CacheStats { live, expired } = self.inner.upstream.cache().stats().await;
        let held = self.inner.tokens.snapshot().await;
        let now = Utc::now().timestamp();
        AggregatorState {
            cache_live: live,
            cache_expired: expired,
            token_held: held.is_some(),
            token_expires_at: held.as_ref().and_then(|t| DateTime::from_timestamp(t.expires_at, 0)),
            token_valid: held.as_ref().is_some_and(|t| t.is_valid_at(now)),
        }
    }
}
