//! Lorekeeper: PF2e rules lookup with rate-limited translation.
//! Main library: component wiring, logging setup, HTTP server lifecycle.

pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod metrics;
pub mod service;
pub mod translate;
pub mod web;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cache::ContentCache;
use config::{Config, ProviderChoice, ValidatorKind};
use content::{ContentResolver, ElasticIndex, SearchIndex};
use error::StartupError;
use metrics::MetricsRegistry;
use service::LookupService;
use translate::{
    FailurePolicy, GeminiProvider, Glossary, GroqProvider, HeuristicValidator,
    LanguageDetectValidator, TranslationClient, TranslationProvider, Validator,
};

/// Install the global tracing subscriber. `RUST_LOG` wins over `--log-level`.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_provider(config: &Config) -> Option<Arc<dyn TranslationProvider>> {
    let timeout = config.translator().timeout;
    let built: Result<Arc<dyn TranslationProvider>, _> = match config.provider() {
        ProviderChoice::Gemini { api_key, model } => {
            info!(provider = "gemini", model = %model, "translation enabled");
            GeminiProvider::new(api_key, model, timeout)
                .map(|p| Arc::new(p) as Arc<dyn TranslationProvider>)
        }
        ProviderChoice::Groq { api_key, model } => {
            info!(provider = "groq", model = %model, "translation enabled");
            GroqProvider::new(api_key, model, timeout)
                .map(|p| Arc::new(p) as Arc<dyn TranslationProvider>)
        }
        ProviderChoice::Disabled => {
            warn!("no translation API key, descriptions stay in English");
            return None;
        }
    };
    match built {
        Ok(provider) => Some(provider),
        Err(e) => {
            warn!(error = %e, "translation client init failed, translation disabled");
            None
        }
    }
}

fn load_glossary(config: &Config) -> Glossary {
    match &config.glossary {
        Some(path) => match Glossary::load_from_file(path) {
            Ok(g) => {
                info!(path = %path.display(), version = g.version(), terms = g.len(), "glossary loaded");
                g
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "glossary load failed, using built-in terms");
                Glossary::builtin()
            }
        },
        None => Glossary::builtin(),
    }
}

/// Wire every component from configuration.
pub fn build_service(config: &Config) -> Result<Arc<LookupService>, StartupError> {
    let metrics = Arc::new(MetricsRegistry::new());
    let cache = Arc::new(ContentCache::new());

    let index: Arc<dyn SearchIndex> = Arc::new(ElasticIndex::new(config.index())?);
    let resolver = ContentResolver::new(index, Arc::clone(&metrics));

    let validator: Arc<dyn Validator> = match config.validator {
        ValidatorKind::Heuristic => Arc::new(HeuristicValidator::default()),
        ValidatorKind::LanguageDetect => Arc::new(LanguageDetectValidator::default()),
    };
    let translator = TranslationClient::new(
        build_provider(config),
        Arc::clone(&cache),
        validator,
        load_glossary(config),
        config.translator(),
        Arc::clone(&metrics),
    );

    let policy = if config.strict_translation {
        FailurePolicy::Explicit
    } else {
        FailurePolicy::FallbackToSource
    };
    Ok(Arc::new(LookupService::new(
        resolver, translator, cache, metrics, policy,
    )))
}

/// Serve on an already-bound listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    service: Arc<LookupService>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, web::app(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Bind, serve, and stop cleanly on Ctrl-C.
pub async fn run(config: Config) -> Result<(), StartupError> {
    info!("lorekeeper starting");
    let service = build_service(&config)?;

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                trigger.cancel();
            }
            Err(e) => warn!(error = %e, "ctrl-c handler unavailable"),
        }
    });

    serve(listener, service, shutdown).await?;
    info!("lorekeeper stopped");
    Ok(())
}
