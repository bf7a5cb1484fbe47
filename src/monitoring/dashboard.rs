//! JSON HTTP API over the tracker, for whatever renders the dashboard.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::error::{StoreError, TrackerError};
use crate::market::scanner::ScanRequest;
use crate::tracker::{PriceRange, Tracker};

/// Shared state accessible by all route handlers.
#[derive(Clone)]
pub struct DashboardState {
    tracker: Arc<Tracker>,
    default_scan: ScanRequest,
    started_at: DateTime<Utc>,
}

impl DashboardState {
    pub fn new(tracker: Arc<Tracker>, default_scan: ScanRequest) -> Self {
        Self {
            tracker,
            default_scan,
            started_at: Utc::now(),
        }
    }
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/search", get(search_handler))
        .route("/api/watched", get(watched_handler).post(watch_handler))
        .route("/api/watched/refresh", post(refresh_all_handler))
        .route("/api/watched/{name}", delete(unwatch_handler))
        .route("/api/watched/{name}/refresh", post(refresh_handler))
        .route("/api/scan", post(scan_handler))
        .route("/api/scan/latest", get(latest_scan_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the API listener. Fails if the address is unavailable.
pub async fn bind_dashboard(bind: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind dashboard API on {addr}"))?;
    info!(addr = %addr, "Dashboard API listening");
    Ok(listener)
}

/// Serve the API on an already bound listener. Returns a handle that can be aborted.
pub fn spawn_dashboard(state: DashboardState, listener: TcpListener) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(state)).await {
            warn!(error = %e, "Dashboard API error");
        }
    })
}

fn error_response(e: TrackerError) -> Response {
    let status = match &e {
        TrackerError::Store(StoreError::InvalidPrice(_)) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(error = %e, status = %status, "Request failed");
    (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
}

// -- Route Handlers --

async fn health_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "started_at": state.started_at,
        "uptime_seconds": (Utc::now() - state.started_at).num_seconds(),
        "watched": state.tracker.list_watched().await.len(),
    }))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
}

async fn search_handler(
    State(state): State<DashboardState>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    Json(state.tracker.search(&params.q).await)
}

#[derive(Debug, Default, Deserialize)]
struct WatchedParams {
    min_price: Option<f64>,
    max_price: Option<f64>,
    #[serde(default)]
    live: bool,
}

async fn watched_handler(
    State(state): State<DashboardState>,
    Query(params): Query<WatchedParams>,
) -> impl IntoResponse {
    let range = PriceRange {
        min_price: params.min_price,
        max_price: params.max_price,
    };
    if params.live {
        Json(state.tracker.watched_overview_live(range).await)
    } else {
        Json(state.tracker.watched_overview(range).await)
    }
}

#[derive(Debug, Deserialize)]
struct WatchBody {
    name: String,
    price: f64,
}

async fn watch_handler(
    State(state): State<DashboardState>,
    Json(body): Json<WatchBody>,
) -> Response {
    match state.tracker.watch(&body.name, body.price).await {
        Ok(true) => (StatusCode::CREATED, Json(serde_json::json!({"added": true}))).into_response(),
        Ok(false) => Json(serde_json::json!({"added": false})).into_response(),
        Err(e) => error_response(e),
    }
}

async fn unwatch_handler(
    State(state): State<DashboardState>,
    Path(name): Path<String>,
) -> Response {
    match state.tracker.unwatch(&name).await {
        Ok(removed) => Json(serde_json::json!({"removed": removed})).into_response(),
        Err(e) => error_response(e),
    }
}

async fn refresh_handler(
    State(state): State<DashboardState>,
    Path(name): Path<String>,
) -> Response {
    match state.tracker.refresh_price(&name).await {
        Ok(price) => Json(serde_json::json!({"price": price})).into_response(),
        Err(e) => error_response(e),
    }
}

async fn refresh_all_handler(State(state): State<DashboardState>) -> Response {
    match state.tracker.refresh_all().await {
        Ok(refreshed) => Json(serde_json::json!({"refreshed": refreshed})).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ScanBody {
    min_profit_percent: Option<f64>,
    max_items: Option<usize>,
}

async fn scan_handler(
    State(state): State<DashboardState>,
    body: Option<Json<ScanBody>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let min_profit_percent = body
        .min_profit_percent
        .unwrap_or(state.default_scan.min_profit_percent);
    let max_items = body.max_items.unwrap_or(state.default_scan.max_items);

    Json(
        state
            .tracker
            .scan_profitable(min_profit_percent, max_items)
            .await,
    )
    .into_response()
}

async fn latest_scan_handler(State(state): State<DashboardState>) -> Response {
    match state.tracker.latest_scan().await {
        Ok(Some(scan)) => Json(scan).into_response(),
        Ok(None) => Json(serde_json::json!(null)).into_response(),
        Err(e) => error_response(e),
    }
}
