//! Structured spell payload built from an index record.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::normalize::strip_markup;
use super::record::ContentRecord;

/// Traits beyond this count are dropped.
pub const MAX_TRAITS: usize = 6;
/// Characters kept per heightened effect.
const HEIGHTENED_EFFECT_MAX: usize = 100;

static DAMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+d\d+)\s*(vitality|void|fire|cold|electricity|acid|sonic|mental|poison|force|bleed|slashing|piercing|bludgeoning)?",
    )
    .unwrap()
});
static HEIGHTENED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:Heightened)\s*\(([^)]+)\)\s*([^H.]+)").unwrap());

/// Response payload for `/api/spell`. Absent fields serialize as `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellInfo {
    pub name: String,
    pub actions: Option<String>,
    pub traits: Option<Vec<String>>,
    pub range: Option<String>,
    pub area: Option<String>,
    pub targets: Option<String>,
    pub duration: Option<String>,
    pub defense: Option<String>,
    pub description: Option<String>,
    pub damage: Option<String>,
    pub damage_type: Option<String>,
    pub heightened: Option<BTreeMap<String, String>>,
}

impl SpellInfo {
    /// Build everything except the (possibly translated) description.
    ///
    /// `english_description` is the normalized source text; damage and
    /// heightened entries are read from it before any translation happens.
    pub fn from_record(name: &str, record: &ContentRecord, english_description: &str) -> Self {
        let (damage, damage_type) = extract_damage(english_description);
        let heightened = record
            .heightened
            .as_ref()
            .and_then(heightened_from_value)
            .or_else(|| parse_heightened(english_description));

        Self {
            name: name.to_string(),
            actions: action_code(record),
            traits: (!record.traits.is_empty())
                .then(|| record.traits.iter().take(MAX_TRAITS).cloned().collect()),
            range: clean_field(record.range.as_deref()),
            area: clean_field(record.area.as_deref()),
            targets: clean_field(record.targets.as_deref()),
            duration: clean_field(record.duration.as_deref()),
            defense: clean_field(record.defense()),
            description: None,
            damage,
            damage_type,
            heightened,
        }
    }
}

/// Provider action vocabulary to a short code; falls back to `actions_number`.
pub fn action_code(record: &ContentRecord) -> Option<String> {
    let mapped = record.actions.as_deref().and_then(|a| {
        let code = match a.trim().to_ascii_lowercase().as_str() {
            "single action" | "one action" => "1",
            "two actions" => "2",
            "three actions" => "3",
            "reaction" => "reaction",
            "free action" => "free",
            "one to two actions" | "single action to two actions" => "1 to 2",
            "one to three actions" | "single action to three actions" => "1 to 3",
            "two to three actions" | "two actions to three actions" => "2 to 3",
            _ => return None,
        };
        Some(code.to_string())
    });
    mapped.or_else(|| match record.actions_number.as_ref()? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

/// First dice expression and the damage type right after it, if any.
pub fn extract_damage(text: &str) -> (Option<String>, Option<String>) {
    match DAMAGE.captures(text) {
        Some(caps) => (
            Some(caps[1].to_string()),
            caps.get(2).map(|m| m.as_str().to_lowercase()),
        ),
        None => (None, None),
    }
}

/// `Heightened (+1) effect...` phrases keyed by their level label.
pub fn parse_heightened(text: &str) -> Option<BTreeMap<String, String>> {
    let map: BTreeMap<String, String> = HEIGHTENED
        .captures_iter(text)
        .map(|caps| {
            let level = caps[1].trim().to_string();
            let effect: String = caps[2].trim().chars().take(HEIGHTENED_EFFECT_MAX).collect();
            (level, effect)
        })
        .collect();
    (!map.is_empty()).then_some(map)
}

/// The index sends heightened data as an object, a list of phrases, or one string.
fn heightened_from_value(value: &serde_json::Value) -> Option<BTreeMap<String, String>> {
    use serde_json::Value;
    match value {
        Value::Object(obj) => {
            let map: BTreeMap<String, String> = obj
                .iter()
                .filter_map(|(k, v)| {
                    let effect = match v {
                        Value::String(s) => strip_markup(s),
                        Value::Null => return None,
                        other => other.to_string(),
                    };
                    Some((k.trim().to_string(), effect))
                })
                .collect();
            (!map.is_empty()).then_some(map)
        }
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| {
                    let s = strip_markup(s);
                    if s.to_lowercase().starts_with("heightened") {
                        s
                    } else {
                        format!("Heightened {s}")
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            parse_heightened(&joined)
        }
        Value::String(s) => parse_heightened(&strip_markup(s)),
        _ => None,
    }
}

fn clean_field(raw: Option<&str>) -> Option<String> {
    raw.map(strip_markup).filter(|s| !s.is_empty())
}
