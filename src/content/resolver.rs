//! Name resolution against the external search index.
//! The index returns a window of candidates; ambiguity is settled here,
//! client-side: exact name, then containment, then the index's own ranking.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use super::record::{ContentRecord, SearchResponse};
use crate::error::ResolveError;
use crate::metrics::{metric_names, MetricsRegistry};

pub const DEFAULT_SEARCH_URL: &str = "https://elasticsearch.aonprd.com/aon/_search";

/// Full-text search backend (adapter for different index deployments).
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Candidates for `name` in index relevance order.
    async fn search(
        &self,
        name: &str,
        category: Option<&str>,
    ) -> Result<Vec<ContentRecord>, ResolveError>;
}

/// How the query is expressed to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum QueryStyle {
    /// POST `bool`/`multi_match` body, category as a `term` filter.
    Structured,
    /// GET `?q=<name>&size=<n>`, category filtered client-side only.
    QueryString,
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub url: String,
    /// Result window. Tens of hits, never one.
    pub size: usize,
    pub style: QueryStyle,
    pub timeout: Duration,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SEARCH_URL.into(),
            size: 20,
            style: QueryStyle::Structured,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Elasticsearch-compatible index over HTTP.
pub struct ElasticIndex {
    http: reqwest::Client,
    config: IndexConfig,
}

impl ElasticIndex {
    pub fn new(config: IndexConfig) -> Result<Self, ResolveError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.timeout)
            .user_agent(concat!("lorekeeper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ResolveError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn structured_body(&self, name: &str, category: Option<&str>) -> serde_json::Value {
        let mut body = json!({
            "size": self.config.size,
            "query": {
                "bool": {
                    "must": [{
                        "multi_match": {
                            "query": name,
                            "fields": ["name^10", "name.keyword^15", "text", "markdown"],
                            "type": "best_fields",
                            "fuzziness": "AUTO"
                        }
                    }]
                }
            }
        });
        if let Some(category) = category {
            body["query"]["bool"]["filter"] = json!([{ "term": { "category": category } }]);
        }
        body
    }
}

#[async_trait]
impl SearchIndex for ElasticIndex {
    async fn search(
        &self,
        name: &str,
        category: Option<&str>,
    ) -> Result<Vec<ContentRecord>, ResolveError> {
        let request = match self.config.style {
            QueryStyle::Structured => self
                .http
                .post(&self.config.url)
                .json(&self.structured_body(name, category)),
            QueryStyle::QueryString => self.http.get(&self.config.url).query(&[
                ("q", name.to_string()),
                ("size", self.config.size.to_string()),
            ]),
        };

        let response = request
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| ResolveError::Parse(e.to_string()))?;
        Ok(parsed.into_records())
    }
}

/// Picks the best record for a name out of the index's candidate window.
pub struct ContentResolver {
    index: Arc<dyn SearchIndex>,
    metrics: Arc<MetricsRegistry>,
}

impl ContentResolver {
    pub fn new(index: Arc<dyn SearchIndex>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { index, metrics }
    }

    /// Resolve `name`, optionally restricted to one `category`.
    ///
    /// `Ok(None)` when no candidate survives the category filter. Transport
    /// and parse failures are returned as-is; nothing is cached here.
    pub async fn resolve(
        &self,
        name: &str,
        category: Option<&str>,
    ) -> Result<Option<ContentRecord>, ResolveError> {
        let span = self.metrics.span(metric_names::RESOLVE);
        let result = self.index.search(name, category).await;
        span.finish();

        let candidates = match result {
            Ok(c) => c,
            Err(e) => {
                warn!(name = %name, category = ?category, error = %e, "index search failed");
                return Err(e);
            }
        };

        let total = candidates.len();
        let candidates: Vec<ContentRecord> = match category {
            Some(cat) => candidates
                .into_iter()
                .filter(|c| {
                    c.category
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(cat))
                })
                .collect(),
            None => candidates,
        };
        debug!(name = %name, total, kept = candidates.len(), "index candidates");

        let best = select_best(name, candidates);
        match &best {
            Some((record, tier)) => {
                info!(name = %name, matched = %record.name, tier = ?tier, "resolved")
            }
            None => info!(name = %name, category = ?category, "no candidate"),
        }
        Ok(best.map(|(record, _)| record))
    }
}

/// Which precedence tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Containment,
    Fallback,
}

/// Exact (trimmed, case-insensitive), then containment either way, then the
/// first candidate. Ties inside a tier keep index order.
pub fn select_best(
    query: &str,
    candidates: Vec<ContentRecord>,
) -> Option<(ContentRecord, MatchTier)> {
    let query = query.trim().to_lowercase();
    let names: Vec<String> = candidates
        .iter()
        .map(|c| c.name.trim().to_lowercase())
        .collect();

    let pick = names
        .iter()
        .position(|n| *n == query)
        .map(|i| (i, MatchTier::Exact))
        .or_else(|| {
            names
                .iter()
                .position(|n| !n.is_empty() && (n.contains(&query) || query.contains(n.as_str())))
                .map(|i| (i, MatchTier::Containment))
        })
        .or_else(|| (!candidates.is_empty()).then_some((0, MatchTier::Fallback)))?;

    let (idx, tier) = pick;
    candidates.into_iter().nth(idx).map(|c| (c, tier))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, category: &str) -> ContentRecord {
        ContentRecord {
            name: name.into(),
            category: Some(category.into()),
            ..Default::default()
        }
    }

    struct FixedIndex(Vec<ContentRecord>);

    #[async_trait]
    impl SearchIndex for FixedIndex {
        async fn search(
            &self,
            _name: &str,
            _category: Option<&str>,
        ) -> Result<Vec<ContentRecord>, ResolveError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenIndex;

    #[async_trait]
    impl SearchIndex for BrokenIndex {
        async fn search(
            &self,
            _name: &str,
            _category: Option<&str>,
        ) -> Result<Vec<ContentRecord>, ResolveError> {
            Err(ResolveError::Status(503))
        }
    }

    fn resolver(records: Vec<ContentRecord>) -> ContentResolver {
        ContentResolver::new(Arc::new(FixedIndex(records)), Arc::new(MetricsRegistry::new()))
    }

    #[test]
    fn exact_match_beats_containment() {
        let candidates = vec![rec("Dodge Trick", "feat"), rec("Dodge", "feat"), rec("dodge", "feat")];
        let (best, tier) = select_best("Dodge", candidates).unwrap();
        assert_eq!(best.name, "Dodge");
        assert_eq!(tier, MatchTier::Exact);
    }

    #[test]
    fn exact_match_is_case_insensitive_and_trimmed() {
        let candidates = vec![rec("Dodge Trick", "feat"), rec(" dodge ", "feat")];
        let (best, _) = select_best("DODGE", candidates).unwrap();
        assert_eq!(best.name, " dodge ");
    }

    #[test]
    fn containment_in_either_direction() {
        let (best, tier) = select_best("Power Attack", vec![rec("Shield Block", "feat"), rec("Power Attack (Fighter)", "feat")]).unwrap();
        assert_eq!(best.name, "Power Attack (Fighter)");
        assert_eq!(tier, MatchTier::Containment);

        let (best, _) = select_best("Reactive Shield Stance", vec![rec("Quick Draw", "feat"), rec("Reactive Shield", "feat")]).unwrap();
        assert_eq!(best.name, "Reactive Shield");
    }

    #[test]
    fn falls_back_to_index_order() {
        let (best, tier) = select_best("Zzz", vec![rec("First", "feat"), rec("Second", "feat")]).unwrap();
        assert_eq!(best.name, "First");
        assert_eq!(tier, MatchTier::Fallback);
    }

    #[test]
    fn empty_candidates_resolve_to_none() {
        assert!(select_best("Dodge", Vec::new()).is_none());
    }

    #[tokio::test]
    async fn category_filter_drops_other_kinds() {
        let r = resolver(vec![rec("Fireball", "item"), rec("Fireball", "spell")]);
        let hit = r.resolve("Fireball", Some("spell")).await.unwrap().unwrap();
        assert_eq!(hit.category.as_deref(), Some("spell"));

        let miss = r.resolve("Fireball", Some("feat")).await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn no_category_means_no_filter() {
        let r = resolver(vec![rec("Rage", "action"), ContentRecord { name: "Rage".into(), ..Default::default() }]);
        let hit = r.resolve("Rage", None).await.unwrap().unwrap();
        assert_eq!(hit.category.as_deref(), Some("action"));
    }

    #[tokio::test]
    async fn transport_failure_is_surfaced() {
        let r = ContentResolver::new(Arc::new(BrokenIndex), Arc::new(MetricsRegistry::new()));
        let err = r.resolve("Dodge", None).await.unwrap_err();
        assert!(matches!(err, ResolveError::Status(503)));
    }

    #[tokio::test]
    async fn query_string_style_filters_client_side() {
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/aon/_search"))
            .and(query_param("q", "Shield"))
            .and(query_param("size", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": { "hits": [
                    { "_source": { "name": "Shield", "category": "spell", "text": "A shield of force." } },
                    { "_source": { "name": "Shield", "category": "equipment", "text": "A wooden shield." } }
                ] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let index = ElasticIndex::new(IndexConfig {
            url: format!("{}/aon/_search", server.uri()),
            style: QueryStyle::QueryString,
            ..IndexConfig::default()
        })
        .unwrap();
        let r = ContentResolver::new(Arc::new(index), Arc::new(MetricsRegistry::new()));
        let hit = r.resolve("Shield", Some("equipment")).await.unwrap().unwrap();
        assert_eq!(hit.text.as_deref(), Some("A wooden shield."));
    }

    #[tokio::test]
    async fn malformed_index_body_is_parse_error() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let index = ElasticIndex::new(IndexConfig {
            url: server.uri(),
            ..IndexConfig::default()
        })
        .unwrap();
        let err = index.search("Shield", None).await.unwrap_err();
        assert!(matches!(err, ResolveError::Parse(_)));
    }

    #[test]
    fn structured_body_carries_category_filter() {
        let index = ElasticIndex::new(IndexConfig::default()).unwrap();
        let body = index.structured_body("Fireball", Some("spell"));
        assert_eq!(body["size"], 20);
        assert_eq!(body["query"]["bool"]["filter"][0]["term"]["category"], "spell");
        assert_eq!(body["query"]["bool"]["must"][0]["multi_match"]["query"], "Fireball");

        let body = index.structured_body("Fireball", None);
        assert!(body["query"]["bool"].get("filter").is_none());
    }
}
