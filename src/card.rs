//! Business-card records and parsing of model output into them.
//!
//! The extraction model answers in free-form text that is expected to contain
//! JSON. Two shapes show up in practice:
//!
//! - a single card object, usually wrapped in a code fence (image path);
//! - a collection of cards, either keyed by id like the stored collection or
//!   as a plain array (search path).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de};
use serde_json::{Map, Value};

/// Database collection holding every user's saved cards.
pub const CARD_COLLECTION: &str = "namecard";

/// A business card reduced to six scalar fields.
///
/// Fields absent from the source JSON deserialize to empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameCard {
    pub name: String,
    pub title: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub company: String,
}

/// Database path of a user's card collection.
#[must_use]
pub fn collection_path(user_id: &str) -> String {
    format!("{CARD_COLLECTION}/{user_id}")
}

/// Drop the first and the last line of `raw`.
///
/// The model wraps its JSON in a fence such as ```` ```json ```` / ```` ``` ````.
/// Both lines are removed whatever they contain. Input with fewer than three
/// lines has nothing left between the delimiters and yields an empty string.
#[must_use]
pub fn strip_wrapping_lines(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    if lines.len() < 3 {
        return String::new();
    }
    lines[1..lines.len() - 1].join("\n")
}

/// Keys a card object may carry, matched case-insensitively.
const FIELDS: [&str; 6] = ["name", "title", "address", "email", "phone", "company"];

/// Parse a single card from JSON text.
///
/// Keys match regardless of case (`Name`, `NAME` and `name` are the same
/// field). An object with none of the card keys is an error, so an answer in
/// an unexpected shape is never mistaken for a blank card.
pub fn parse_card(json: &str) -> Result<NameCard, serde_json::Error> {
    card_from_value(serde_json::from_str(json)?)
}

/// Parse zero or more cards from a model answer.
///
/// Accepts an id-keyed object, an array, or a single card, optionally fenced.
/// Ordering follows the keys for the object form and the array order
/// otherwise.
pub fn parse_cards(raw: &str) -> Result<Vec<NameCard>, serde_json::Error> {
    let trimmed = raw.trim();
    let body = if trimmed.starts_with("```") {
        strip_wrapping_lines(trimmed)
    } else {
        trimmed.to_string()
    };

    let value: Value = serde_json::from_str(&body)?;
    match value {
        Value::Array(items) => items.into_iter().map(card_from_value).collect(),
        Value::Object(map) if looks_like_card(&map) => {
            card_from_value(Value::Object(map)).map(|card| vec![card])
        }
        Value::Object(map) => map
            .into_iter()
            .collect::<BTreeMap<_, _>>()
            .into_values()
            .map(card_from_value)
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(de::Error::invalid_type(unexpected(&other), &"card JSON")),
    }
}

/// Cards stored under a user's collection, in push-key order.
pub fn cards_from_collection(value: Value) -> Result<Vec<NameCard>, serde_json::Error> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let keyed: BTreeMap<String, NameCard> = serde_json::from_value(value)?;
    Ok(keyed.into_values().collect())
}

fn card_from_value(value: Value) -> Result<NameCard, serde_json::Error> {
    let map = match value {
        Value::Object(map) => map,
        other => return Err(de::Error::invalid_type(unexpected(&other), &"a card object")),
    };
    let normalized: Map<String, Value> = map
        .into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect();
    if !normalized.keys().any(|k| FIELDS.contains(&k.as_str())) {
        return Err(de::Error::custom(format!(
            "object has none of the card fields {FIELDS:?}"
        )));
    }
    serde_json::from_value(Value::Object(normalized))
}

fn looks_like_card(map: &Map<String, Value>) -> bool {
    map.values().all(|v| !v.is_object())
        && map
            .keys()
            .any(|k| FIELDS.contains(&k.to_ascii_lowercase().as_str()))
}

fn unexpected(value: &Value) -> de::Unexpected<'_> {
    match value {
        Value::Null => de::Unexpected::Unit,
        Value::Bool(b) => de::Unexpected::Bool(*b),
        Value::Number(_) => de::Unexpected::Other("number"),
        Value::String(s) => de::Unexpected::Str(s),
        Value::Array(_) => de::Unexpected::Seq,
        Value::Object(_) => de::Unexpected::Map,
    }
}
