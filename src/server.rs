//! HTTP surface
//!
//! - `GET /api/updates/{id}` returns the record as JSON
//! - `GET /updates/{id}` returns a plain-text page; with `?redirect=true`
//!   browsers are sent to the Azure details page while link-preview bots
//!   still get the page
//! - `GET /api/health` returns `OK`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{error, info};

use crate::data::{FetchError, UpdateRecord};
use crate::service::{LookupError, UpdateService};
use crate::view::render_text;

/// User-agent fragments of crawlers that fetch pages for link previews
const BOT_MARKERS: [&str; 9] = [
    "twitterbot",
    "facebookexternalhit",
    "slackbot",
    "linkedinbot",
    "discordbot",
    "telegrambot",
    "bot",
    "crawler",
    "spider",
];

/// Whether a user agent belongs to a crawler rather than a person
pub fn is_link_preview_bot(user_agent: &str) -> bool {
    let agent = user_agent.to_ascii_lowercase();
    BOT_MARKERS.iter().any(|marker| agent.contains(marker))
}

/// Errors mapped onto HTTP responses
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Lookup(LookupError),
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        ApiError::Lookup(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(id) => (StatusCode::NOT_FOUND, format!("Update {} not found", id)),
            ApiError::Lookup(LookupError::InvalidId(e)) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Lookup(LookupError::Upstream(e)) => {
                error!(error = %e, "upstream lookup failed");
                (StatusCode::BAD_GATEWAY, upstream_message(&e))
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn upstream_message(err: &FetchError) -> String {
    match err {
        FetchError::Status(status) => format!("Upstream returned HTTP {}", status.as_u16()),
        _ => "Upstream request failed".to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ViewParams {
    #[serde(default)]
    redirect: bool,
}

async fn lookup(service: &UpdateService, id: &str) -> Result<UpdateRecord, ApiError> {
    service
        .get_or_fetch(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(id.to_string()))
}

async fn update_json_handler(
    State(service): State<Arc<UpdateService>>,
    Path(id): Path<String>,
) -> Result<Json<UpdateRecord>, ApiError> {
    Ok(Json(lookup(&service, &id).await?))
}

async fn update_view_handler(
    State(service): State<Arc<UpdateService>>,
    Path(id): Path<String>,
    Query(params): Query<ViewParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let record = lookup(&service, &id).await?;

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if params.redirect && !is_link_preview_bot(user_agent) {
        return Ok(Redirect::temporary(record.details_url()).into_response());
    }

    Ok((
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_text(&record),
    )
        .into_response())
}

async fn health_check_handler() -> &'static str {
    "OK"
}

/// Builds the application router around a shared service
pub fn router(service: Arc<UpdateService>) -> Router {
    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/updates/{id}", get(update_json_handler))
        .route("/updates/{id}", get(update_view_handler))
        .with_state(service)
}

/// Serves the router on `addr` until the process is stopped
pub async fn run_http_server(service: Arc<UpdateService>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, router(service)).await
}
