//! PF2e terminology glossary.
//! Loads term pairs from JSON (or uses the built-in table), matches source
//! terms against input text, and returns only the matched entries for the prompt.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub source: String,
    pub target: String,
}

impl GlossaryEntry {
    fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

/// On-disk glossary file format.
#[derive(Debug, Deserialize)]
struct GlossaryFile {
    version: u32,
    entries: Vec<GlossaryEntry>,
}

/// Official Brazilian Portuguese renderings of common rules terms.
const BUILTIN: &[(&str, &str)] = &[
    ("free action", "ação livre"),
    ("saving throw", "teste de resistência"),
    ("critical success", "sucesso crítico"),
    ("critical hit", "acerto crítico"),
    ("critical failure", "falha crítica"),
    ("requirement", "requisito"),
    ("reaction", "reação"),
    ("action", "ação"),
    ("feat", "talento"),
    ("spell", "magia"),
    ("damage", "dano"),
    ("healing", "cura"),
    ("creature", "criatura"),
    ("allies", "aliados"),
    ("ally", "aliado"),
    ("enemies", "inimigos"),
    ("enemy", "inimigo"),
    ("target", "alvo"),
    ("range", "alcance"),
    ("duration", "duração"),
    ("trigger", "gatilho"),
];

pub struct Glossary {
    version: u32,
    entries: Vec<GlossaryEntry>,
}

impl Glossary {
    /// Load glossary from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let file: GlossaryFile = serde_json::from_str(&content)?;
        Ok(Self {
            version: file.version,
            entries: file.entries,
        })
    }

    pub fn builtin() -> Self {
        Self {
            version: 1,
            entries: BUILTIN
                .iter()
                .map(|(source, target)| GlossaryEntry::new(source, target))
                .collect(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose `source` term appears in `text` (case-insensitive).
    pub fn match_entries(&self, text: &str) -> Vec<GlossaryEntry> {
        let text_lower = text.to_lowercase();
        self.entries
            .iter()
            .filter(|e| text_lower.contains(&e.source.to_lowercase()))
            .cloned()
            .collect()
    }
}

impl Default for Glossary {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_only_terms_present() {
        let g = Glossary::builtin();
        let hits = g.match_entries("Attempt a Reflex saving throw against the spell's damage.");
        let sources: Vec<&str> = hits.iter().map(|e| e.source.as_str()).collect();
        assert!(sources.contains(&"saving throw"));
        assert!(sources.contains(&"spell"));
        assert!(sources.contains(&"damage"));
        assert!(!sources.contains(&"healing"));
    }

    #[test]
    fn matching_ignores_case() {
        let g = Glossary::builtin();
        let hits = g.match_entries("FREE ACTION");
        assert!(hits.iter().any(|e| e.target == "ação livre"));
    }

    #[test]
    fn loads_from_json_file() {
        let path = std::env::temp_dir().join(format!("glossary-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{"version": 3, "entries": [{"source": "Strike", "target": "Golpe"}]}"#,
        )
        .unwrap();

        let g = Glossary::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(g.version(), 3);
        assert_eq!(g.len(), 1);
        assert_eq!(g.match_entries("Make a Strike.")[0].target, "Golpe");
    }

    #[test]
    fn load_failures_are_typed() {
        let missing = Glossary::load_from_file(Path::new("/nonexistent/glossary.json"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let path = std::env::temp_dir().join(format!("glossary-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "not json").unwrap();
        let bad = Glossary::load_from_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(bad, Err(ConfigError::Parse(_))));
    }
}
