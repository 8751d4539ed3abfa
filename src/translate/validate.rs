//! Output checks for provider translations.
//! Cheap heuristics only: alphabet drift, letter-spacing artifacts, runaway
//! repetition, fragments, echoes, and a stop-word language hint.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Minimum characters in an accepted translation.
pub const MIN_TRANSLATION_CHARS: usize = 10;
/// Minimum translated length as a fraction of the source length.
pub const MIN_LENGTH_RATIO: f64 = 0.3;
/// Share of characters allowed outside the expected alphabet.
const MAX_FOREIGN_SHARE: f64 = 0.15;

/// Portuguese function words (target language).
const TARGET_STOPWORDS: &[&str] = &[
    "de", "da", "do", "das", "dos", "que", "e", "o", "os", "um", "uma", "em", "no", "na", "nos",
    "nas", "para", "com", "por", "se", "sua", "seu", "suas", "seus", "ao", "aos", "à", "é", "não",
    "mais", "como", "você", "pelo", "pela", "até", "cada", "ou",
];
/// English function words (source language).
const SOURCE_STOPWORDS: &[&str] = &[
    "the", "of", "and", "to", "is", "you", "that", "with", "your", "are", "this", "for", "on",
    "can", "if", "each", "which", "by", "an", "or", "be", "it", "its", "from", "until", "when",
];

static PREAMBLES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^(?:here is|here's)\s+(?:the\s+|your\s+)?(?:translation|tradução)[^:\n]*:\s*",
        r"(?i)^(?:aqui está|segue)\s+(?:a\s+)?tradução[^:\n]*:\s*",
        r"(?i)^(?:tradução em português|tradução|translation|portuguese|português|resposta)\s*:\s*",
        r"(?i)^(?:tipo de item|item type)\s*:[^\n]*\n?",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static CONTROL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap());
static LETTER_SPACING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\p{L}\b(?:[ \t]+\b\p{L}\b){4,}").unwrap());
static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static NEWLINE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Why a candidate translation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("shorter than the minimum translation length")]
    TooShort,
    #[error("fragment: {got} chars for a {source_len}-char source")]
    Fragment { got: usize, source_len: usize },
    #[error("corrupted output: {0}")]
    Corrupted(Corruption),
    #[error("output echoes the source text")]
    Echo,
    #[error("output still reads as the source language")]
    WrongLanguage,
}

/// Which corruption pattern fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Corruption {
    #[error("vietnamese diacritic run")]
    VietnameseRun,
    #[error("accented letter run")]
    AccentRun,
    #[error("letter-by-letter spacing")]
    LetterSpacing,
    #[error("foreign alphabet run")]
    ForeignRun,
    #[error("repeated character")]
    RepeatedChar,
    #[error("too many characters outside the expected alphabet")]
    ForeignShare,
}

/// Strategy deciding whether a provider output is usable.
pub trait Validator: Send + Sync {
    fn check(&self, source: &str, candidate: &str) -> Result<(), Rejection>;

    fn is_valid(&self, source: &str, candidate: &str) -> bool {
        self.check(source, candidate).is_ok()
    }
}

/// Length, corruption, echo and stop-word density checks.
#[derive(Debug, Clone)]
pub struct HeuristicValidator {
    pub min_chars: usize,
    pub min_ratio: f64,
    /// Accept when at least this share of words are target-language function words...
    pub min_target_density: f64,
    /// ...or when at most this share are source-language function words.
    pub max_source_density: f64,
}

impl Default for HeuristicValidator {
    fn default() -> Self {
        Self {
            min_chars: MIN_TRANSLATION_CHARS,
            min_ratio: MIN_LENGTH_RATIO,
            min_target_density: 0.08,
            max_source_density: 0.3,
        }
    }
}

impl Validator for HeuristicValidator {
    fn check(&self, source: &str, candidate: &str) -> Result<(), Rejection> {
        let got = candidate.chars().count();
        if got < self.min_chars {
            return Err(Rejection::TooShort);
        }
        let source_len = source.chars().count();
        if (got as f64) < source_len as f64 * self.min_ratio {
            return Err(Rejection::Fragment { got, source_len });
        }
        if let Some(c) = detect_corruption(candidate) {
            return Err(Rejection::Corrupted(c));
        }
        if candidate.trim() == source.trim() {
            return Err(Rejection::Echo);
        }
        let target = stopword_density(candidate, TARGET_STOPWORDS);
        let source_like = stopword_density(candidate, SOURCE_STOPWORDS);
        if target < self.min_target_density && source_like > self.max_source_density {
            return Err(Rejection::WrongLanguage);
        }
        Ok(())
    }
}

/// Heuristics plus statistical language identification: output reliably
/// identified as English is rejected.
#[derive(Debug, Clone, Default)]
pub struct LanguageDetectValidator {
    pub heuristics: HeuristicValidator,
}

impl Validator for LanguageDetectValidator {
    fn check(&self, source: &str, candidate: &str) -> Result<(), Rejection> {
        self.heuristics.check(source, candidate)?;
        match whatlang::detect(candidate) {
            Some(info) if info.is_reliable() && info.lang() == whatlang::Lang::Eng => {
                Err(Rejection::WrongLanguage)
            }
            _ => Ok(()),
        }
    }
}

/// True when `text` matches any corruption pattern.
pub fn is_corrupted(text: &str) -> bool {
    detect_corruption(text).is_some()
}

/// Default heuristic validity check.
pub fn is_valid_translation(source: &str, candidate: &str) -> bool {
    HeuristicValidator::default().is_valid(source, candidate)
}

/// First corruption pattern found in `text`.
pub fn detect_corruption(text: &str) -> Option<Corruption> {
    let mut vietnamese = 0usize;
    let mut accented = 0usize;
    let mut foreign = 0usize;
    let mut repeat = 0usize;
    let mut prev: Option<char> = None;
    let mut total = 0usize;
    let mut foreign_total = 0usize;

    for c in text.chars() {
        if c.is_whitespace() {
            vietnamese = 0;
            accented = 0;
            foreign = 0;
            repeat = 0;
            prev = None;
            continue;
        }
        total += 1;

        vietnamese = if is_vietnamese(c) { vietnamese + 1 } else { 0 };
        if vietnamese >= 3 {
            return Some(Corruption::VietnameseRun);
        }

        accented = if is_accented_latin(c) { accented + 1 } else { 0 };
        if accented >= 5 {
            return Some(Corruption::AccentRun);
        }

        if is_expected(c) {
            foreign = 0;
        } else {
            foreign += 1;
            foreign_total += 1;
        }
        if foreign >= 3 {
            return Some(Corruption::ForeignRun);
        }

        repeat = if prev == Some(c) { repeat + 1 } else { 1 };
        if repeat >= 5 {
            return Some(Corruption::RepeatedChar);
        }
        prev = Some(c);
    }

    if has_letter_spacing(text) {
        return Some(Corruption::LetterSpacing);
    }
    if total > 0 && foreign_total as f64 / total as f64 > MAX_FOREIGN_SHARE {
        return Some(Corruption::ForeignShare);
    }
    None
}

/// Strip provider preambles, quote wrappers and control characters, then
/// repair letter-by-letter spacing and collapse whitespace. Runs before validation.
pub fn clean_translation(text: &str) -> String {
    let mut cleaned = CONTROL.replace_all(text, "").trim().to_string();

    // preambles can stack ("Tradução:\nHere is the translation: ...")
    for _ in 0..3 {
        let before = cleaned.len();
        for re in PREAMBLES.iter() {
            cleaned = re.replace(&cleaned, "").trim_start().to_string();
        }
        if cleaned.len() == before {
            break;
        }
    }

    cleaned = strip_quote_wrapper(cleaned.trim()).to_string();
    cleaned = LETTER_SPACING
        .replace_all(&cleaned, |caps: &regex::Captures<'_>| {
            caps[0].split_whitespace().collect::<String>()
        })
        .into_owned();
    let cleaned = SPACE_RUN.replace_all(&cleaned, " ");
    NEWLINE_RUN.replace_all(&cleaned, "\n\n").trim().to_string()
}

fn strip_quote_wrapper(text: &str) -> &str {
    const PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('“', '”'), ('«', '»')];
    for &(open, close) in PAIRS {
        if let Some(inner) = text.strip_prefix(open).and_then(|t| t.strip_suffix(close)) {
            return inner.trim();
        }
    }
    text
}

fn has_letter_spacing(text: &str) -> bool {
    let mut run = 0usize;
    for word in text.split_whitespace() {
        let mut chars = word.chars();
        let single = matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic());
        run = if single { run + 1 } else { 0 };
        if run >= 6 {
            return true;
        }
    }
    false
}

fn stopword_density(text: &str, stopwords: &[&str]) -> f64 {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let hits = words.iter().filter(|w| stopwords.contains(&w.as_str())).count();
    hits as f64 / words.len() as f64
}

fn is_vietnamese(c: char) -> bool {
    matches!(c, '\u{1EA0}'..='\u{1EF9}' | 'Ơ' | 'ơ' | 'Ư' | 'ư')
}

fn is_accented_latin(c: char) -> bool {
    matches!(c, 'À'..='ÿ' | '\u{0100}'..='\u{017F}') && c != '×' && c != '÷'
}

/// Basic Latin, Latin-1, Latin Extended-A and general punctuation.
fn is_expected(c: char) -> bool {
    c.is_ascii()
        || matches!(
            c,
            '\u{00A0}'..='\u{00FF}' | '\u{0100}'..='\u{017F}' | '\u{2010}'..='\u{205E}' | '\u{2122}'
        )
}
