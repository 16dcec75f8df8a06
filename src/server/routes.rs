use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Filter;

use crate::core::{HealthChecker, MonitorMetrics};
use crate::monitoring::{ChangeJournal, NotifierGate, ScanEngine};

const DEFAULT_RECENT_LIMIT: usize = 50;
const DEFAULT_SIGNIFICANT_THRESHOLD: f64 = 10.0;

/// Everything the control surface needs, shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ScanEngine>,
    pub notifier: Arc<NotifierGate>,
    pub journal: Arc<ChangeJournal>,
    pub health: Arc<HealthChecker>,
    pub metrics: MonitorMetrics,
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ThresholdQuery {
    threshold: Option<f64>,
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn toggled(state: &AppState, enabled: bool) -> warp::reply::Json {
    state.notifier.set_enabled(enabled);
    let status = if enabled { "enabled" } else { "disabled" };
    warp::reply::json(&json!({
        "status": status,
        "message": format!("Price change monitoring {}", status),
        "timestamp": Utc::now(),
    }))
}

pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let enable = warp::post()
        .and(warp::path!("api" / "price-monitoring" / "enable"))
        .and(with_state(state.clone()))
        .map(|state: Arc<AppState>| toggled(&state, true));

    let disable = warp::post()
        .and(warp::path!("api" / "price-monitoring" / "disable"))
        .and(with_state(state.clone()))
        .map(|state: Arc<AppState>| toggled(&state, false));

    let status = warp::get()
        .and(warp::path!("api" / "price-monitoring" / "status"))
        .and(with_state(state.clone()))
        .and_then(|state: Arc<AppState>| async move {
            let status = state.engine.get_status().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&status))
        });

    let force_scan = warp::post()
        .and(warp::path!("api" / "price-monitoring" / "force-scan"))
        .and(with_state(state.clone()))
        .map(|state: Arc<AppState>| {
            let engine = state.engine.clone();
            tokio::spawn(async move {
                // Failures are already logged by the engine.
                let _ = engine.force_full_scan().await;
            });
            warp::reply::json(&json!({
                "message": "Full scan initiated",
                "timestamp": Utc::now(),
                "scanType": "manual",
            }))
        });

    let recent = warp::get()
        .and(warp::path!("api" / "price-monitoring" / "price-changes"))
        .and(warp::query::<RecentQuery>())
        .and(with_state(state.clone()))
        .map(|query: RecentQuery, state: Arc<AppState>| {
            let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
            warp::reply::json(&state.journal.recent(limit))
        });

    let item_change = warp::get()
        .and(warp::path!("api" / "price-monitoring" / "price-changes" / i64))
        .and(with_state(state.clone()))
        .map(|item_id: i64, state: Arc<AppState>| match state.journal.for_item(item_id) {
            Some(event) => {
                warp::reply::with_status(warp::reply::json(&event), StatusCode::OK)
            }
            None => warp::reply::with_status(
                warp::reply::json(&json!({ "message": "no recorded change" })),
                StatusCode::NOT_FOUND,
            ),
        });

    let offers = warp::get()
        .and(warp::path!("api" / "price-monitoring" / "offers"))
        .and(with_state(state.clone()))
        .map(|state: Arc<AppState>| warp::reply::json(&state.journal.offers()));

    let offers_by_category = warp::get()
        .and(warp::path!("api" / "price-monitoring" / "offers" / "category" / String))
        .and(with_state(state.clone()))
        .map(|category: String, state: Arc<AppState>| {
            warp::reply::json(&state.journal.offers_in(&category))
        });

    let increases = warp::get()
        .and(warp::path!("api" / "price-monitoring" / "alerts" / "price-increases"))
        .and(with_state(state.clone()))
        .map(|state: Arc<AppState>| warp::reply::json(&state.journal.increases()));

    let significant = warp::get()
        .and(warp::path!("api" / "price-monitoring" / "alerts" / "significant-changes"))
        .and(warp::query::<ThresholdQuery>())
        .and(with_state(state.clone()))
        .map(|query: ThresholdQuery, state: Arc<AppState>| {
            let threshold = query.threshold.unwrap_or(DEFAULT_SIGNIFICANT_THRESHOLD);
            warp::reply::json(&state.journal.significant(threshold))
        });

    let statistics = warp::get()
        .and(warp::path!("api" / "price-monitoring" / "statistics"))
        .and(with_state(state.clone()))
        .map(|state: Arc<AppState>| warp::reply::json(&state.journal.statistics()));

    let health = warp::get()
        .and(warp::path!("health"))
        .and(with_state(state.clone()))
        .and_then(|state: Arc<AppState>| async move {
            let status = state.health.get_status().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&status))
        });

    let metrics = warp::get()
        .and(warp::path!("metrics"))
        .and(with_state(state))
        .map(|state: Arc<AppState>| match state.metrics.render() {
            Ok(text) => warp::reply::with_status(
                warp::reply::with_header(text, "content-type", "text/plain; version=0.0.4"),
                StatusCode::OK,
            ),
            Err(e) => {
                tracing::error!("failed to render metrics: {}", e);
                warp::reply::with_status(
                    warp::reply::with_header(String::new(), "content-type", "text/plain"),
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
            }
        });

    enable
        .or(disable)
        .or(status)
        .or(force_scan)
        .or(recent)
        .or(item_change)
        .or(offers)
        .or(offers_by_category)
        .or(increases)
        .or(significant)
        .or(statistics)
        .or(health)
        .or(metrics)
}

pub async fn serve(state: Arc<AppState>, port: u16) {
    tracing::info!(port, "control surface listening");
    warp::serve(routes(state)).run(([0, 0, 0, 0], port)).await;
}
