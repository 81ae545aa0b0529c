use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::merge::{CompetitionMaps, MarketConfigMap};
use crate::types::{Event, Id};

/// Keys owned by the aggregator; an event-list field with the same name is dropped.
pub const RESERVED_KEYS: [&str; 7] = [
    "data",
    "competitions",
    "competitionNames",
    "competitionIcons",
    "playPercentages",
    "matchPopularity",
    "marketConfig",
];

/// What `/api/matches` returns. Additive over the raw event-list body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResponse {
    pub data: Vec<Event>,
    pub competitions: BTreeMap<String, Id>,
    pub competition_names: BTreeMap<String, String>,
    pub competition_icons: BTreeMap<String, String>,
    pub play_percentages: Value,
    pub match_popularity: Value,
    pub market_config: MarketConfigMap,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

pub fn assemble(
    events: Vec<Event>,
    competitions: CompetitionMaps,
    play_percentages: Value,
    match_popularity: Value,
    market_config: MarketConfigMap,
    mut passthrough: Map<String, Value>,
) -> AggregatedResponse {
    passthrough.retain(|k, _| !RESERVED_KEYS.contains(&k.as_str()));

    AggregatedResponse {
        data: events,
        competitions: competitions.parents,
        competition_names: competitions.names,
        competition_icons: competitions.icons,
        play_percentages,
        match_popularity,
        market_config,
        passthrough,
    }
}
