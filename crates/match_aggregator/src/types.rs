//! Provider payload types: event list, markets, outcomes, reference data.
//!
//! Known fields are typed; anything else the sportsbook sends on an event or
//! market is kept in `extra` and re-emitted untouched. Outcomes are kept whole.
//! Numeric fields take numbers or numeric strings; anything else reads as
//! absent instead of failing the enclosing record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

// ====================================================================
// Ids
// ====================================================================

/// Provider id. Arrives as a JSON number or a string and goes back out the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Num(i64),
    Text(String),
}

impl Id {
    /// String form used for map keys, URLs and comparisons.
    pub fn as_key(&self) -> String {
        match self {
            Id::Num(n) => n.to_string(),
            Id::Text(s) => s.trim().to_string(),
        }
    }

    /// `0` and blank strings count as "no id"; such calls are never issued.
    pub fn is_usable(&self) -> bool {
        match self {
            Id::Num(n) => *n != 0,
            Id::Text(s) => !s.trim().is_empty(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Id::Num(n) => Some(*n),
            Id::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

/// Usable key of an optional id.
pub fn usable_key(id: &Option<Id>) -> Option<String> {
    id.as_ref().filter(|i| i.is_usable()).map(Id::as_key)
}

// ====================================================================
// Envelope
// ====================================================================

/// `{isSuccess, data, message}` wrapper used by every sportsbook/stats endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope {
    #[serde(default)]
    pub is_success: bool,
    pub data: Option<Value>,
    pub message: Option<String>,
}

// ====================================================================
// Event / Market / Outcome
// ====================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    /// Only used to talk to the live-stats provider.
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub live_stats_id: Option<Id>,
    /// 0 = not started, >0 = live / finished phases
    #[serde(default, deserialize_with = "de_opt_i64", skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    /// Unix seconds
    #[serde(default, deserialize_with = "de_opt_i64", skip_serializing_if = "Option::is_none")]
    pub kickoff_time: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub competition_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Value>,
    /// `null` reads as no markets; unreadable markets are dropped one by one.
    #[serde(default, deserialize_with = "de_markets")]
    pub markets: Vec<Market>,

    // ── enrichment ────────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_to_head: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_matches: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_players: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referee_stats: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_stats: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    pub fn status_code(&self) -> i64 {
        self.status.unwrap_or(0)
    }
}

/// Known fields of the event-detail response. Everything else it carries is dropped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub live_stats_id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub kickoff_time: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub competition_id: Option<Id>,
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
    #[serde(default)]
    pub score: Option<Value>,
    /// `None` = absent or not an array, `Some(vec![])` = provider says "no markets".
    #[serde(default, deserialize_with = "de_opt_markets")]
    pub markets: Option<Vec<Market>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(rename = "type", default, deserialize_with = "de_opt_i64", skip_serializing_if = "Option::is_none")]
    pub market_type: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64", skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<i64>,
    /// 0 = open, anything else = suspended
    #[serde(default, deserialize_with = "de_opt_i64", skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    /// Handicap / total line, number or string depending on market
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<Value>,
    #[serde(default, deserialize_with = "de_outcomes")]
    pub outcomes: Vec<Outcome>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Market {
    /// UI merge identity: market id plus line (or subtype when there is no line).
    pub fn merge_key(&self) -> String {
        let id = self.id.as_ref().map(Id::as_key).unwrap_or_default();
        let line = self.line.as_ref().and_then(|l| match l {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.trim().to_string()),
            other => Some(other.to_string()),
        });
        match (line, self.sub_type) {
            (Some(line), _) => format!("{id}:{line}"),
            (None, Some(sub)) => format!("{id}:{sub}"),
            (None, None) => id,
        }
    }
}

/// Source fields that all mean "outcome number", highest precedence first.
pub const OUTCOME_NO_FIELDS: [&str; 4] = ["no", "outcomeNo", "outcomeNumber", "on"];

/// One selectable option, kept exactly as the provider sent it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcome(pub Value);

impl Outcome {
    /// First field of [`OUTCOME_NO_FIELDS`] holding a readable number.
    pub fn no(&self) -> Option<i64> {
        OUTCOME_NO_FIELDS
            .iter()
            .find_map(|key| self.0.get(*key).and_then(lenient_i64))
    }

    pub fn odd(&self) -> Option<f64> {
        self.0.get("odd").and_then(lenient_f64)
    }

    pub fn previous_odd(&self) -> Option<f64> {
        self.0.get("previousOdd").and_then(lenient_f64)
    }

    pub fn label(&self) -> Option<&str> {
        self.0.get("label").and_then(Value::as_str)
    }
}

// ====================================================================
// Reference data
// ====================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competition {
    pub id: Id,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketConfigEntry {
    #[serde(rename = "type", default, deserialize_with = "de_opt_i64", skip_serializing_if = "Option::is_none")]
    pub market_type: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64", skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, deserialize_with = "de_flag", skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
    #[serde(default, deserialize_with = "de_flag", skip_serializing_if = "Option::is_none")]
    pub is_pre_match: Option<bool>,
    #[serde(default, deserialize_with = "de_flag", skip_serializing_if = "Option::is_none")]
    pub is_legal: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ====================================================================
// Lenient readers
// ====================================================================

/// Integer from a JSON number or a numeric string.
pub fn lenient_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Odds come as numbers, sometimes as decimal strings ("1.85").
pub fn lenient_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn de_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(lenient_i64))
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<Id>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_i64().map(Id::Num),
        Some(Value::String(s)) => Some(Id::Text(s)),
        _ => None,
    })
}

fn parse_markets(items: &[Value]) -> Vec<Market> {
    items
        .iter()
        .filter_map(|item| match Market::deserialize(item) {
            Ok(m) => Some(m),
            Err(e) => {
                let id = item.get("id").cloned().unwrap_or_default();
                warn!("skipping malformed market {}: {}", id, e);
                None
            }
        })
        .collect()
}

fn de_markets<'de, D>(deserializer: D) -> Result<Vec<Market>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_markets(deserializer)?.unwrap_or_default())
}

fn de_opt_markets<'de, D>(deserializer: D) -> Result<Option<Vec<Market>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Array(items)) => Some(parse_markets(&items)),
        _ => None,
    })
}

fn de_outcomes<'de, D>(deserializer: D) -> Result<Vec<Outcome>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Array(items)) => items.into_iter().map(Outcome).collect(),
        _ => Vec::new(),
    })
}

/// Legality flags show up as `true`/`false` or `1`/`0`.
fn de_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => n.as_i64().map(|v| v != 0),
        Some(Value::String(s)) => match s.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_keep_their_wire_shape() {
        let num: Id = serde_json::from_value(json!(123)).unwrap();
        let text: Id = serde_json::from_value(json!("123")).unwrap();
        assert_eq!(num.as_key(), text.as_key());
        assert_eq!(serde_json::to_value(&num).unwrap(), json!(123));
        assert_eq!(serde_json::to_value(&text).unwrap(), json!("123"));
        assert!(!Id::Num(0).is_usable());
        assert!(!Id::Text("  ".into()).is_usable());
    }

    #[test]
    fn outcome_number_follows_alias_precedence() {
        let o: Outcome = serde_json::from_value(json!({"outcomeNumber": 3, "on": 9, "odd": 1.85})).unwrap();
        assert_eq!(o.no(), Some(3));

        let o: Outcome = serde_json::from_value(json!({"on": 9, "outcomeNo": 2, "no": 1})).unwrap();
        assert_eq!(o.no(), Some(1));

        let o: Outcome = serde_json::from_value(json!({"on": 9, "odd": "1.85"})).unwrap();
        assert_eq!(o.no(), Some(9));
        assert_eq!(o.odd(), Some(1.85));

        // an unreadable alias falls through to the next one
        let o: Outcome = serde_json::from_value(json!({"no": "x", "outcomeNo": "4"})).unwrap();
        assert_eq!(o.no(), Some(4));
    }

    #[test]
    fn outcomes_are_reemitted_verbatim() {
        let raw = json!({"outcomeNo": 2, "odd": "1.85", "previousOdd": "-", "label": "X"});
        let o: Outcome = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(serde_json::to_value(&o).unwrap(), raw);
        assert_eq!(o.no(), Some(2));
        assert_eq!(o.odd(), Some(1.85));
        assert_eq!(o.previous_odd(), None);
        assert_eq!(o.label(), Some("X"));
    }

    #[test]
    fn event_keeps_unknown_fields() {
        let ev: Event = serde_json::from_value(json!({
            "id": 42, "status": 1, "homeTeam": "A", "awayTeam": "B",
            "markets": [{"id": 7, "type": 1, "subType": 1, "outcomes": [{"no": 1, "odd": 2.1}], "mbs": 1}],
            "tv": "beIN"
        })).unwrap();
        assert_eq!(ev.extra.get("tv"), Some(&json!("beIN")));
        assert_eq!(ev.markets[0].extra.get("mbs"), Some(&json!(1)));

        let back = serde_json::to_value(&ev).unwrap();
        assert_eq!(back["tv"], "beIN");
        assert_eq!(back["id"], 42);
        assert_eq!(back["markets"][0]["outcomes"], json!([{"no": 1, "odd": 2.1}]));
        assert!(back.get("statistics").is_none());
    }

    #[test]
    fn null_markets_read_as_empty() {
        let ev: Event = serde_json::from_value(json!({"id": 1, "status": 1, "markets": null})).unwrap();
        assert!(ev.markets.is_empty());

        let d: EventDetail = serde_json::from_value(json!({"markets": null})).unwrap();
        assert!(d.markets.is_none());
        let d: EventDetail = serde_json::from_value(json!({"markets": []})).unwrap();
        assert_eq!(d.markets, Some(vec![]));
    }

    #[test]
    fn numeric_strings_do_not_sink_the_event() {
        let ev: Event = serde_json::from_value(json!({
            "id": 2, "status": "1", "kickoffTime": "1760000000",
            "markets": [
                {"id": 5, "type": "1", "subType": "12", "status": "0", "outcomes": [{"no": "1"}]},
                "garbage",
                {"id": 6, "subType": {"odd": "shape"}, "outcomes": null}
            ]
        })).unwrap();

        assert_eq!(ev.status, Some(1));
        assert_eq!(ev.kickoff_time, Some(1_760_000_000));
        assert_eq!(ev.markets.len(), 2);
        assert_eq!(ev.markets[0].market_type, Some(1));
        assert_eq!(ev.markets[0].sub_type, Some(12));
        assert_eq!(ev.markets[0].outcomes[0].no(), Some(1));
        assert_eq!(ev.markets[1].sub_type, None);
        assert!(ev.markets[1].outcomes.is_empty());
    }

    #[test]
    fn detail_with_string_numbers_still_parses() {
        let d: EventDetail = serde_json::from_value(json!({
            "status": "3", "competitionId": null,
            "markets": [{"id": 1, "subType": "12"}]
        })).unwrap();
        assert_eq!(d.status, Some(3));
        assert!(d.competition_id.is_none());
        assert_eq!(d.markets.map(|m| m[0].sub_type), Some(Some(12)));
    }

    #[test]
    fn market_merge_key_prefers_line() {
        let m = Market { id: Some(Id::Num(5)), sub_type: Some(12), line: Some(json!(2.5)), ..Default::default() };
        assert_eq!(m.merge_key(), "5:2.5");
        let m = Market { id: Some(Id::Num(5)), sub_type: Some(12), ..Default::default() };
        assert_eq!(m.merge_key(), "5:12");
        let m = Market { id: Some(Id::Text("5".into())), ..Default::default() };
        assert_eq!(m.merge_key(), "5");
    }

    #[test]
    fn market_config_flags_accept_numbers() {
        let e: MarketConfigEntry = serde_json::from_value(json!({
            "type": 1, "subType": "1", "name": "Match Result", "isLegal": 1, "isLive": false
        })).unwrap();
        assert_eq!(e.sub_type, Some(1));
        assert_eq!(e.is_legal, Some(true));
        assert_eq!(e.is_live, Some(false));
        assert_eq!(e.is_pre_match, None);
    }
}
