//! Base event list + static reference data.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::{Competition, Event, MarketConfigEntry};
use crate::upstream::{envelope_data, Endpoints, ReferenceCall, Upstream};

/// Event list with the envelope fields that travel to the response untouched.
#[derive(Debug, Default)]
pub struct EventList {
    pub events: Vec<Event>,
    /// Top-level body fields other than `data` (`isSuccess`, `message`, ...)
    pub passthrough: Map<String, Value>,
}

#[derive(Debug, Default)]
pub struct ReferenceData {
    pub market_configs: Vec<MarketConfigEntry>,
    pub competitions: Vec<Competition>,
    pub play_percentages: Value,
    pub match_popularity: Value,
}

pub async fn fetch_event_list(upstream: &Upstream, endpoints: &Endpoints) -> EventList {
    let call = ReferenceCall::EventList;
    let Some(body) = upstream
        .fetch_enveloped(call.label(), &endpoints.reference(call), call.ttl())
        .await
    else {
        return EventList::default();
    };

    let passthrough = body
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(k, _)| k.as_str() != "data")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();

    let data = envelope_data(&body);
    let mut events = parse_events(data.and_then(|d| d.get("events")));
    if let Some(sc) = data.and_then(|d| d.get("sc")).and_then(Value::as_object) {
        attach_side_scores(&mut events, sc);
    }

    EventList { events, passthrough }
}

/// One bad event does not sink the list.
fn parse_events(raw: Option<&Value>) -> Vec<Event> {
    match raw.and_then(Value::as_array) {
        Some(items) => parse_each("event", items),
        None => Vec::new(),
    }
}

/// Item-by-item decode; unreadable items are logged and dropped.
fn parse_each<T: DeserializeOwned>(what: &str, items: &[Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(v) => Some(v),
            Err(e) => {
                let id = item.get("id").cloned().unwrap_or_default();
                warn!("skipping malformed {} {}: {}", what, id, e);
                None
            }
        })
        .collect()
}

/// Entries of the `m` map. An entry without its own `subType` takes it from its key.
pub fn parse_market_configs(data: &Value) -> Vec<MarketConfigEntry> {
    let Some(m) = data.get("m").and_then(Value::as_object) else {
        return Vec::new();
    };
    m.iter()
        .filter_map(|(key, item)| match MarketConfigEntry::deserialize(item) {
            Ok(mut entry) => {
                if entry.sub_type.is_none() {
                    entry.sub_type = key.trim().parse().ok();
                }
                Some(entry)
            }
            Err(e) => {
                warn!("skipping malformed market config {}: {}", key, e);
                None
            }
        })
        .collect()
}

/// Live scores come in a side map keyed by event id; attach where the event has none.
pub fn attach_side_scores(events: &mut [Event], sc: &Map<String, Value>) {
    for ev in events.iter_mut() {
        if ev.score.as_ref().is_some_and(|s| !s.is_null()) {
            continue;
        }
        let Some(key) = ev.id.as_ref().map(|id| id.as_key()) else {
            continue;
        };
        if let Some(score) = sc.get(&key) {
            ev.score = Some(score.clone());
        }
    }
}

/// Live/finished events always pass; not-started (status 0) ones only with `include_upcoming`.
pub fn retain_by_phase(events: Vec<Event>, include_upcoming: bool) -> Vec<Event> {
    events
        .into_iter()
        .filter(|ev| ev.status_code() > 0 || (include_upcoming && ev.status_code() == 0))
        .collect()
}

/// The four reference fetches, concurrently. Each degrades on its own.
pub async fn fetch_reference_data(upstream: &Upstream, endpoints: &Endpoints) -> ReferenceData {
    let (market_config, competitions, play_percentages, match_popularity) = tokio::join!(
        fetch_data(upstream, endpoints, ReferenceCall::MarketConfig),
        fetch_data(upstream, endpoints, ReferenceCall::Competitions),
        fetch_object(upstream, endpoints, ReferenceCall::PlayPercentages),
        fetch_object(upstream, endpoints, ReferenceCall::MatchPopularity),
    );

    let market_configs = market_config
        .as_ref()
        .map(parse_market_configs)
        .unwrap_or_default();
    let competitions: Vec<Competition> = match competitions.as_ref().and_then(Value::as_array) {
        Some(items) => parse_each("competition", items),
        None => Vec::new(),
    };

    debug!(
        "reference data: market_configs={} competitions={}",
        market_configs.len(),
        competitions.len()
    );

    ReferenceData {
        market_configs,
        competitions,
        play_percentages,
        match_popularity,
    }
}

async fn fetch_data(upstream: &Upstream, endpoints: &Endpoints, call: ReferenceCall) -> Option<Value> {
    let body = upstream
        .fetch_enveloped(call.label(), &endpoints.reference(call), call.ttl())
        .await?;
    envelope_data(&body).cloned()
}

/// Percentage maps are passed through as-is; anything but an object becomes `{}`.
async fn fetch_object(upstream: &Upstream, endpoints: &Endpoints, call: ReferenceCall) -> Value {
    match fetch_data(upstream, endpoints, call).await {
        Some(data) if data.is_object() => data,
        _ => Value::Object(Map::new()),
    }
}
