//! Per-event fan-out.
//!
//! Events go through in fixed-size batches, one after the other. Inside a batch
//! every event gets its own task issuing the 8 fixed calls plus (when possible)
//! live stats. All calls share one semaphore, so the in-flight bound is tunable
//! apart from the batch size. A batch is fully merged before the next starts.

use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::AggregateError;
use crate::merge::{merge_event, unwrap_live_stats, Enrichment};
use crate::token::BearerToken;
use crate::types::{usable_key, Event, EventDetail};
use crate::upstream::{envelope_data, Endpoints, EventCall, Upstream, LIVE_STATS_LABEL, LIVE_STATS_TTL};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub batches: usize,
    /// 8 per event, whether or not the id was usable
    pub calls_scheduled: usize,
    /// Reached the cache/network (live stats included)
    pub calls_issued: usize,
    /// Short-circuited for want of an id
    pub calls_skipped: usize,
    pub calls_failed: usize,
}

impl EnrichStats {
    fn absorb(&mut self, tally: &CallTally) {
        self.calls_issued += tally.issued;
        self.calls_skipped += tally.skipped;
        self.calls_failed += tally.failed;
    }
}

#[derive(Debug, Default)]
struct CallTally {
    issued: usize,
    skipped: usize,
    failed: usize,
}

enum CallOutcome {
    Skipped,
    Failed,
    Data(Arc<Value>),
}

impl CallOutcome {
    fn record(self, tally: &mut CallTally) -> Option<Arc<Value>> {
        match self {
            CallOutcome::Skipped => {
                tally.skipped += 1;
                None
            }
            CallOutcome::Failed => {
                tally.issued += 1;
                tally.failed += 1;
                None
            }
            CallOutcome::Data(v) => {
                tally.issued += 1;
                Some(v)
            }
        }
    }
}

#[derive(Clone)]
pub struct Enricher {
    upstream: Arc<Upstream>,
    endpoints: Arc<Endpoints>,
    limiter: Arc<Semaphore>,
    batch_size: usize,
}

impl Enricher {
    pub fn new(upstream: Arc<Upstream>, endpoints: Arc<Endpoints>, batch_size: usize, max_in_flight: usize) -> Self {
        Self {
            upstream,
            endpoints,
            limiter: Arc::new(Semaphore::new(max_in_flight.max(1))),
            batch_size: batch_size.max(1),
        }
    }

    /// Enriches every event in place, preserving order. Only a task that died
    /// (panic/abort) fails the whole run.
    pub async fn enrich(
        &self,
        mut events: Vec<Event>,
        token: Option<&BearerToken>,
    ) -> Result<(Vec<Event>, EnrichStats), AggregateError> {
        let mut stats = EnrichStats::default();
        let token = token.map(|t| t.value.clone());

        for (batch_no, batch) in events.chunks_mut(self.batch_size).enumerate() {
            stats.batches += 1;
            stats.calls_scheduled += batch.len() * EventCall::ALL.len();
            debug!("enrich batch {} ({} events)", batch_no + 1, batch.len());

            let handles: Vec<_> = batch
                .iter()
                .map(|ev| {
                    let this = self.clone();
                    let event_id = usable_key(&ev.id);
                    let live_stats_id = usable_key(&ev.live_stats_id);
                    let token = token.clone();
                    tokio::spawn(async move { this.enrich_one(event_id, live_stats_id, token).await })
                })
                .collect();

            // join_all keeps spawn order, so results line up with the batch slice
            let results = join_all(handles).await;
            for (ev, joined) in batch.iter_mut().zip(results) {
                let (enrichment, tally) = joined?;
                stats.absorb(&tally);
                merge_event(ev, enrichment);
            }
        }

        Ok((events, stats))
    }

    async fn enrich_one(
        &self,
        event_id: Option<String>,
        live_stats_id: Option<String>,
        token: Option<String>,
    ) -> (Enrichment, CallTally) {
        let fixed = join_all(
            EventCall::ALL
                .iter()
                .map(|&call| self.event_call(call, event_id.as_deref())),
        );
        let live = self.live_stats_call(live_stats_id.as_deref(), token.as_deref());
        let (fixed, live) = tokio::join!(fixed, live);

        let mut tally = CallTally::default();
        let mut enrichment = Enrichment::default();

        for (call, outcome) in EventCall::ALL.iter().zip(fixed) {
            let Some(body) = outcome.record(&mut tally) else {
                continue;
            };
            let data = envelope_data(&body).cloned();
            match call {
                EventCall::Detail => {
                    enrichment.detail = data.and_then(|d| match EventDetail::deserialize(&d) {
                        Ok(detail) => Some(detail),
                        Err(e) => {
                            warn!("detail for {:?} has unexpected shape: {}", event_id, e);
                            None
                        }
                    });
                }
                EventCall::Summary => enrichment.summary = data,
                EventCall::HeadToHead => enrichment.head_to_head = data,
                EventCall::LastMatches => enrichment.last_matches = data,
                EventCall::Analysis => enrichment.analysis = data,
                EventCall::MissingPlayers => enrichment.missing_players = data,
                EventCall::Referee => enrichment.referee = data,
                EventCall::Standings => enrichment.standings = data,
            }
        }

        // live stats only count when they were actually attempted
        if let Some(live) = live {
            enrichment.live_stats = live.record(&mut tally).and_then(|body| unwrap_live_stats(&body));
        }

        (enrichment, tally)
    }

    async fn event_call(&self, call: EventCall, event_id: Option<&str>) -> CallOutcome {
        let Some(id) = event_id else {
            return CallOutcome::Skipped;
        };
        let url = self.endpoints.event(call, id);
        let _permit = self.limiter.acquire().await.ok();
        match self.upstream.fetch_enveloped(call.label(), &url, call.ttl()).await {
            Some(body) => CallOutcome::Data(body),
            None => CallOutcome::Failed,
        }
    }

    /// `None` when there is no secondary id or no valid token: not a call at all.
    async fn live_stats_call(&self, live_stats_id: Option<&str>, token: Option<&str>) -> Option<CallOutcome> {
        let (id, token) = (live_stats_id?, token?);
        let url = self.endpoints.live_stats(id, token);
        let _permit = self.limiter.acquire().await.ok();
        Some(
            match self.upstream.fetch_raw(LIVE_STATS_LABEL, &url, LIVE_STATS_TTL).await {
                Some(body) => CallOutcome::Data(body),
                None => CallOutcome::Failed,
            },
        )
    }
}
