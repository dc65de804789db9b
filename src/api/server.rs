//! HTTP surface: a thin wrapper over the aggregator and the snapshot store.
//!
//! CORS is fully open (all origins/methods/headers), the documented default
//! for the bundled web frontend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::exchange::domain::exchange::ExchangeName;
use crate::exchange::domain::portfolio::PortfolioLine;
use crate::history::comparative::comparative_series;
use crate::portfolio::PortfolioAggregator;
use crate::storage::SnapshotStore;

pub struct AppState {
    pub aggregator: PortfolioAggregator,
    pub store: SnapshotStore,
    pub exchanges: Vec<ExchangeName>,
    pub comparative_dir: PathBuf,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/get_portfolio_data", get(get_portfolio_data))
        .route("/test_comparative", get(test_comparative))
        .layer(cors)
        .with_state(state)
}

async fn get_portfolio_data(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let portfolio = state.aggregator.aggregate(&state.exchanges).await;
    persist_snapshots(&state, &portfolio).await;

    Json(json!({
        "portfolio": portfolio,
        "status": 200
    }))
}

/// Best effort: a storage failure is logged, never surfaced to the caller.
async fn persist_snapshots(state: &Arc<AppState>, portfolio: &[PortfolioLine]) {
    let mut by_exchange: HashMap<ExchangeName, Vec<PortfolioLine>> = HashMap::new();
    for line in portfolio {
        by_exchange
            .entry(line.exchange)
            .or_default()
            .push(line.clone());
    }

    let store = state.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        for (exchange, lines) in by_exchange {
            if let Err(e) = store.save(exchange, &lines) {
                log::error!("{exchange}: error saving portfolio snapshot: {e}");
            }
        }
    })
    .await;
    if let Err(e) = result {
        log::error!("snapshot persistence task failed: {e}");
    }
}

async fn test_comparative(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dir = state.comparative_dir.clone();
    let result = tokio::task::spawn_blocking(move || comparative_series(&dir)).await;

    match result {
        Ok(Ok(data)) => (
            StatusCode::OK,
            Json(json!({ "data": data, "status": 200 })),
        ),
        Ok(Err(e)) => {
            log::error!("comparative feed failed: {e:#}");
            internal_error(&e.to_string())
        }
        Err(e) => {
            log::error!("comparative task failed: {e}");
            internal_error("internal task failure")
        }
    }
}

fn internal_error(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message, "status": 500 })),
    )
}
