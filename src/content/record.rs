//! Wire model of one search-index hit.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// One hit from the search index (`hits.hits[]._source`).
/// Every field is optional; the index is inconsistent about which ones it fills
/// and about their types. Scalars are read as text, `null` as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentRecord {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub markdown: Option<String>,
    #[serde(default, rename = "trait", deserialize_with = "one_or_many")]
    pub traits: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub range: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub area: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub targets: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub duration: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub saving_throw: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub defense: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub actions: Option<String>,
    #[serde(default)]
    pub actions_number: Option<Value>,
    #[serde(default)]
    pub heightened: Option<Value>,
}

impl ContentRecord {
    /// Raw body text: `text` wins over `markdown`, empty strings count as absent.
    pub fn raw_body(&self) -> &str {
        self.text
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.markdown.as_deref())
            .unwrap_or("")
    }

    /// `saving_throw` falls back to `defense`.
    pub fn defense(&self) -> Option<&str> {
        self.saving_throw
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.defense.as_deref())
    }
}

/// Search response envelope: `{ "hits": { "hits": [ { "_source": {...} } ] } }`.
/// Hits stay raw here so one bad `_source` cannot sink the whole window.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: SearchHits,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchHits {
    #[serde(default)]
    pub hits: Vec<Value>,
}

impl SearchResponse {
    /// Records in index order. Hits without a `_source`, or whose `_source`
    /// is not a record, are dropped.
    pub fn into_records(self) -> Vec<ContentRecord> {
        self.hits
            .hits
            .into_iter()
            .enumerate()
            .filter_map(|(position, mut hit)| {
                let source = hit.get_mut("_source").map(Value::take)?;
                match serde_json::from_value::<ContentRecord>(source) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(position, error = %e, "skipping malformed index hit");
                        None
                    }
                }
            })
            .collect()
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    })
}
