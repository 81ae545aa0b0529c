//! Merge rules for one event + id-keyed reference maps.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::{Competition, Event, EventDetail, Id, MarketConfigEntry};

/// Market type whose configs win every key collision.
pub const MAIN_MARKET_TYPE: i64 = 1;

/// Where the summary payload keeps its league table.
pub const SUMMARY_STANDINGS_POINTER: &str = "/league/standings";

/// Successful per-event responses, already unwrapped. `None` = call failed or was skipped.
#[derive(Debug, Default, Clone)]
pub struct Enrichment {
    pub detail: Option<EventDetail>,
    pub summary: Option<Value>,
    pub head_to_head: Option<Value>,
    pub last_matches: Option<Value>,
    pub analysis: Option<Value>,
    pub missing_players: Option<Value>,
    pub referee: Option<Value>,
    pub standings: Option<Value>,
    pub live_stats: Option<Value>,
}

pub fn merge_event(event: &mut Event, enrichment: Enrichment) {
    if let Some(detail) = enrichment.detail {
        apply_detail(event, detail);
    }

    if let Some(summary) = enrichment.summary {
        if event.standings.is_none() {
            event.standings = summary
                .pointer(SUMMARY_STANDINGS_POINTER)
                .filter(|s| !s.is_null())
                .cloned();
        }
        event.statistics = Some(summary);
    }

    attach(&mut event.head_to_head, enrichment.head_to_head);
    attach(&mut event.last_matches, enrichment.last_matches);
    attach(&mut event.analysis, enrichment.analysis);
    attach(&mut event.missing_players, enrichment.missing_players);
    attach(&mut event.referee_stats, enrichment.referee);
    // direct standings beat the ones lifted out of the summary
    attach(&mut event.standings, enrichment.standings);
    attach(&mut event.live_stats, enrichment.live_stats);
}

fn attach(slot: &mut Option<Value>, value: Option<Value>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Field-by-field; unknown detail fields are not imported.
fn apply_detail(event: &mut Event, detail: EventDetail) {
    if detail.live_stats_id.is_some() {
        event.live_stats_id = detail.live_stats_id;
    }
    if detail.status.is_some() {
        event.status = detail.status;
    }
    if detail.kickoff_time.is_some() {
        event.kickoff_time = detail.kickoff_time;
    }
    if detail.competition_id.is_some() {
        event.competition_id = detail.competition_id;
    }
    if detail.home_team.is_some() {
        event.home_team = detail.home_team;
    }
    if detail.away_team.is_some() {
        event.away_team = detail.away_team;
    }
    if detail.score.as_ref().is_some_and(|s| !s.is_null()) {
        event.score = detail.score;
    }
    // present (even empty) replaces, absent keeps what the event list had
    if let Some(markets) = detail.markets {
        event.markets = markets;
    }
}

/// Live stats arrive as `{doc: [{data: ..}]}` or `{data: ..}`.
pub fn unwrap_live_stats(body: &Value) -> Option<Value> {
    let inner = body
        .pointer("/doc/0/data")
        .or_else(|| body.get("data"))?;
    (!inner.is_null()).then(|| inner.clone())
}

// ====================================================================
// Competition maps
// ====================================================================

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CompetitionMaps {
    /// id → parent id
    pub parents: BTreeMap<String, Id>,
    pub names: BTreeMap<String, String>,
    pub icons: BTreeMap<String, String>,
}

pub fn build_competition_maps(competitions: &[Competition], icon_base: &str) -> CompetitionMaps {
    let icon_base = icon_base.trim_end_matches('/');
    let mut maps = CompetitionMaps::default();

    for comp in competitions {
        let key = comp.id.as_key();
        if let Some(parent) = &comp.parent_id {
            maps.parents.insert(key.clone(), parent.clone());
        }
        if let Some(name) = comp.name.as_deref().filter(|n| !n.trim().is_empty()) {
            maps.names.insert(key.clone(), name.to_string());
        }
        if let Some(cc) = comp.country_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            maps.icons.insert(key, format!("{icon_base}/{}.png", cc.to_lowercase()));
        }
    }

    maps
}

// ====================================================================
// Market config lookup
// ====================================================================

/// Subtype id → config, plus `type_subtype` composite keys. First write per key
/// wins, and main-type configs are written before everything else.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MarketConfigMap(BTreeMap<String, MarketConfigEntry>);

impl MarketConfigMap {
    pub fn build<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = MarketConfigEntry>,
    {
        let (main, rest): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| e.market_type == Some(MAIN_MARKET_TYPE));

        let mut map = BTreeMap::new();
        for entry in main.into_iter().chain(rest) {
            let Some(sub) = entry.sub_type else {
                continue;
            };
            if let Some(t) = entry.market_type {
                map.entry(format!("{t}_{sub}")).or_insert_with(|| entry.clone());
            }
            map.entry(sub.to_string()).or_insert(entry);
        }
        Self(map)
    }

    /// Exact `type_subtype` match first, bare subtype second.
    pub fn resolve(&self, market_type: Option<i64>, sub_type: i64) -> Option<&MarketConfigEntry> {
        market_type
            .and_then(|t| self.0.get(&format!("{t}_{sub_type}")))
            .or_else(|| self.0.get(&sub_type.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<&MarketConfigEntry> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
