//! HTTP surface. JSON everywhere, permissive CORS.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info_span, Instrument, Span};
use uuid::Uuid;

use crate::content::SpellInfo;
use crate::error::LookupError;
use crate::metrics::MetricSummary;
use crate::service::{Cleared, Health, LookupService};

// --- Request / response types ---

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    name: Option<String>,
}

impl NameQuery {
    fn required(self) -> Result<String, ApiError> {
        self.name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(ApiError::MissingName)
    }
}

#[derive(Debug, Serialize)]
pub struct DescriptionResponse {
    name: String,
    description: Option<String>,
}

pub enum ApiError {
    MissingName,
    Lookup(LookupError),
}

impl From<LookupError> for ApiError {
    fn from(e: LookupError) -> Self {
        ApiError::Lookup(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingName => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "missing name" })),
            )
                .into_response(),
            ApiError::Lookup(e) => {
                error!(error = %e, "lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "lookup failed" })),
                )
                    .into_response()
            }
        }
    }
}

// --- Routes ---

pub fn routes() -> Router<Arc<LookupService>> {
    Router::new()
        .route("/api/feat", get(feat))
        .route("/api/search", get(search))
        .route("/api/spell", get(spell))
        .route("/api/health", get(health))
        .route("/api/clear-cache", post(clear_cache))
        .route("/api/metrics", get(metrics))
}

/// Complete application: routes, CORS, shared service.
pub fn app(service: Arc<LookupService>) -> Router {
    Router::new()
        .merge(routes())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

fn request_span(route: &'static str, name: &str) -> Span {
    info_span!("request", request_id = %Uuid::new_v4(), route, name = %name)
}

async fn feat(
    State(svc): State<Arc<LookupService>>,
    Query(query): Query<NameQuery>,
) -> Result<Json<DescriptionResponse>, ApiError> {
    let name = query.required()?;
    let description = svc
        .lookup_feat(&name)
        .instrument(request_span("feat", &name))
        .await?;
    Ok(Json(DescriptionResponse { name, description }))
}

async fn search(
    State(svc): State<Arc<LookupService>>,
    Query(query): Query<NameQuery>,
) -> Result<Json<DescriptionResponse>, ApiError> {
    let name = query.required()?;
    let description = svc
        .lookup_generic(&name)
        .instrument(request_span("search", &name))
        .await?;
    Ok(Json(DescriptionResponse { name, description }))
}

async fn spell(
    State(svc): State<Arc<LookupService>>,
    Query(query): Query<NameQuery>,
) -> Result<Json<SpellInfo>, ApiError> {
    let name = query.required()?;
    let info = svc
        .lookup_spell(&name)
        .instrument(request_span("spell", &name))
        .await?;
    // a miss keeps the same shape, every field null
    Ok(Json(info.unwrap_or_else(|| SpellInfo {
        name,
        ..SpellInfo::default()
    })))
}

async fn health(State(svc): State<Arc<LookupService>>) -> Json<Health> {
    Json(svc.health())
}

async fn clear_cache(State(svc): State<Arc<LookupService>>) -> Json<Cleared> {
    Json(svc.clear_cache())
}

async fn metrics(State(svc): State<Arc<LookupService>>) -> Json<HashMap<String, MetricSummary>> {
    Json(svc.metrics().summary())
}
