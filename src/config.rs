//! Runtime configuration: command-line flags with environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::content::resolver::{IndexConfig, QueryStyle, DEFAULT_SEARCH_URL};
use crate::translate::{gemini, groq, TranslatorConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValidatorKind {
    /// Length, corruption and stop-word checks.
    Heuristic,
    /// Heuristics plus statistical language identification.
    LanguageDetect,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "lorekeeper", about = "PF2e rules lookup and translation API")]
pub struct Config {
    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// HTTP port
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Search index endpoint
    #[arg(long, env = "SEARCH_URL", default_value = DEFAULT_SEARCH_URL)]
    pub search_url: String,
    /// Candidates requested per search
    #[arg(long, default_value_t = 20)]
    pub search_size: usize,
    #[arg(long, value_enum, default_value_t = QueryStyle::Structured)]
    pub query_style: QueryStyle,
    #[arg(long, default_value_t = 10)]
    pub search_timeout_secs: u64,

    /// Gemini credential; preferred when both providers are configured
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub groq_api_key: Option<String>,
    #[arg(long, default_value = gemini::DEFAULT_MODEL)]
    pub gemini_model: String,
    #[arg(long, default_value = groq::DEFAULT_MODEL)]
    pub groq_model: String,

    /// Minimum spacing between translation calls
    #[arg(long, default_value_t = 4000)]
    pub translate_base_delay_ms: u64,
    #[arg(long, default_value_t = 3)]
    pub translate_max_attempts: u32,
    #[arg(long, default_value_t = 15)]
    pub translate_timeout_secs: u64,
    /// Pause after the provider signals throttling
    #[arg(long, default_value_t = 30)]
    pub rate_limit_cooldown_secs: u64,

    /// JSON glossary replacing the built-in PF2e terms
    #[arg(long, env = "GLOSSARY_PATH")]
    pub glossary: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = ValidatorKind::Heuristic)]
    pub validator: ValidatorKind,
    /// Answer `description: null` instead of English text when translation fails
    #[arg(long)]
    pub strict_translation: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "lorekeeper=info,tower_http=info")]
    pub log_level: String,
    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

/// Which translation backend to build, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderChoice {
    Gemini { api_key: String, model: String },
    Groq { api_key: String, model: String },
    Disabled,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn index(&self) -> IndexConfig {
        IndexConfig {
            url: self.search_url.clone(),
            size: self.search_size,
            style: self.query_style,
            timeout: Duration::from_secs(self.search_timeout_secs),
        }
    }

    pub fn translator(&self) -> TranslatorConfig {
        TranslatorConfig {
            base_delay: Duration::from_millis(self.translate_base_delay_ms),
            max_attempts: self.translate_max_attempts,
            timeout: Duration::from_secs(self.translate_timeout_secs),
            rate_limit_cooldown: Duration::from_secs(self.rate_limit_cooldown_secs),
            ..TranslatorConfig::default()
        }
    }

    /// Gemini wins when both keys are set; blank keys count as absent.
    pub fn provider(&self) -> ProviderChoice {
        let present = |key: &Option<String>| {
            key.as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
        };
        if let Some(api_key) = present(&self.gemini_api_key) {
            ProviderChoice::Gemini {
                api_key,
                model: self.gemini_model.clone(),
            }
        } else if let Some(api_key) = present(&self.groq_api_key) {
            ProviderChoice::Groq {
                api_key,
                model: self.groq_model.clone(),
            }
        } else {
            ProviderChoice::Disabled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["lorekeeper"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn builds_component_configs() {
        let config = parse(&[
            "--port",
            "8080",
            "--search-size",
            "5",
            "--query-style",
            "query-string",
            "--translate-base-delay-ms",
            "250",
        ]);
        assert_eq!(config.bind_addr(), format!("{}:8080", config.host));
        let index = config.index();
        assert_eq!(index.size, 5);
        assert_eq!(index.style, QueryStyle::QueryString);
        assert_eq!(config.translator().base_delay, Duration::from_millis(250));
        assert_eq!(config.translator().max_attempts, 3);
    }

    #[test]
    fn gemini_is_preferred_over_groq() {
        let config = parse(&["--gemini-api-key", "g", "--groq-api-key", "q"]);
        assert!(matches!(config.provider(), ProviderChoice::Gemini { api_key, .. } if api_key == "g"));

        let config = parse(&["--gemini-api-key", "  ", "--groq-api-key", "q"]);
        assert!(matches!(config.provider(), ProviderChoice::Groq { api_key, .. } if api_key == "q"));
    }

    #[test]
    fn validator_flag_parses() {
        let config = parse(&["--validator", "language-detect", "--strict-translation"]);
        assert_eq!(config.validator, ValidatorKind::LanguageDetect);
        assert!(config.strict_translation);
    }
}
