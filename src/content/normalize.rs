//! Markup stripping and description extraction for index records.
//! Pure functions: no I/O, never fail, empty input yields an empty string.

use std::sync::LazyLock;

use regex::Regex;

/// Appended when a description is cut to its length limit.
pub const ELLIPSIS: &str = "...";

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]{1,6}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Metadata boilerplate removed from descriptions, applied in order.
static BOILERPLATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bpg\.\s*\d+\s*",
        r"(?i)^(?:source|fonte):?\s*[^.]+\.",
        r"\b(?:Source|Fonte)\s+[A-Z][^.]+\.\s*",
        // case-sensitive: the index capitalizes rarity tags, rules prose does not
        r"\b(?:PFS|Standard|Limited|Restricted)\b",
        r"\b(?:Prerequisites?|Pré-requisitos?):?\s*[^.]+\.",
        r"\bFrequen(?:cy|cia)\b:?\s*[^.]+\.",
        r"\b(?:Trigger|Gatilho)\b:?\s*[^.]+\.",
        r"(?:Leads to|Leva a)\.{3}[^.]*\.?",
        r"-{3,}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Strip tags, decode entities, collapse whitespace. No boilerplate removal.
pub fn strip_markup(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let no_tags = TAG.replace_all(raw, " ");
    let decoded = ENTITY.replace_all(&no_tags, |caps: &regex::Captures<'_>| decode_entity(&caps[1]));
    collapse(&decoded)
}

/// Full description extraction: markup, boilerplate, whitespace, then truncation.
///
/// Truncation counts characters, not bytes, and the result including the
/// ellipsis never exceeds `max_len`.
pub fn normalize(raw: &str, max_len: Option<usize>) -> String {
    let mut text = strip_markup(raw);
    if text.is_empty() {
        return text;
    }

    // "Name --- body" headers repeat the record name; keep the body only.
    if let Some(pos) = text.find(" --- ") {
        if pos > 0 && pos < 100 {
            text = text[pos + 5..].to_string();
        }
    }

    for re in BOILERPLATE.iter() {
        if re.is_match(&text) {
            text = re.replace_all(&text, " ").into_owned();
        }
    }
    let text = collapse(&text);

    match max_len {
        Some(max) => truncate(&text, max),
        None => text,
    }
}

/// Cut to `max` characters, the last three replaced by [`ELLIPSIS`].
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.truncate(out.trim_end().len());
    out.push_str(ELLIPSIS);
    out
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn decode_entity(body: &str) -> String {
    let numeric = body
        .strip_prefix("#x")
        .or_else(|| body.strip_prefix("#X"))
        .map(|hex| u32::from_str_radix(hex, 16).ok())
        .or_else(|| body.strip_prefix('#').map(|dec| dec.parse::<u32>().ok()));
    if let Some(code) = numeric {
        return code
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| " ".to_string());
    }
    match body.to_ascii_lowercase().as_str() {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" => "–",
        "mdash" => "—",
        "hellip" => "…",
        "rsquo" | "lsquo" => "'",
        "ldquo" | "rdquo" => "\"",
        "times" => "×",
        // unknown named entities become plain separators
        _ => " ",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_input_is_unchanged() {
        assert_eq!(normalize("Plain text.", None), "Plain text.");
        assert_eq!(normalize("Plain text.", Some(400)), "Plain text.");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(normalize("", Some(10)), "");
        assert_eq!(normalize("   ", None), "");
        assert_eq!(strip_markup(""), "");
    }

    #[test]
    fn strips_tags_and_decodes_entities() {
        let raw = "<p>You <b>strike</b>&nbsp;twice &amp; deal&#39;s damage&hellip;</p>";
        assert_eq!(strip_markup(raw), "You strike twice & deal's damage…");
    }

    #[test]
    fn unknown_entity_becomes_space() {
        assert_eq!(strip_markup("a&zwj;b"), "a b");
    }

    #[test]
    fn removes_metadata_boilerplate() {
        let raw = "Source Player Core pg. 42. Prerequisites trained in Acrobatics. \
                   Trigger An enemy misses you. You step aside.";
        assert_eq!(normalize(raw, None), "You step aside.");
    }

    #[test]
    fn removes_rating_tags_and_name_header() {
        let raw = "Dodge --- PFS Standard You gain a +1 bonus to AC.";
        assert_eq!(normalize(raw, None), "You gain a +1 bonus to AC.");
    }

    #[test]
    fn lowercase_rating_words_survive_in_prose() {
        let raw = "PFS Limited You can take a standard action, limited to once per round.";
        assert_eq!(
            normalize(raw, None),
            "You can take a standard action, limited to once per round."
        );
    }

    #[test]
    fn truncates_with_ellipsis_after_stripping() {
        let raw = format!("<b>{}</b>", "word ".repeat(50));
        let out = normalize(&raw, Some(20));
        assert!(out.ends_with(ELLIPSIS));
        assert!(out.chars().count() <= 20);
        assert!(!out.contains('<'));
    }

    #[test]
    fn truncation_counts_characters() {
        let text = "ação ".repeat(10);
        let out = truncate(text.trim(), 12);
        assert!(out.chars().count() <= 12);
        assert!(out.ends_with(ELLIPSIS));
    }
}
