//! Map service HTTP server.
//!
//! Receives `AddMap` requests from `mapctl upload` running in remote mode
//! and commits them into the map database.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/{service}/health` | Discovery probe used by clients |
//! | `POST` | `/{service}/add_map` | Validate and commit one map |
//!
//! `add_map` has no request body limit; grids and pose graphs arrive
//! base64-encoded in one JSON body. A well-formed request is answered `200` with an [`AddMapResponse`]; a map
//! that fails validation or commit carries `success: false` and the reason in
//! `message`. A body that is not a JSON `AddMapRequest` is refused by the
//! extractor with a `4xx` status before any handler code runs.

use axum::extract::{DefaultBodyLimit, State};
use axum::{routing::get, routing::post, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::clock::{Clock, SystemClock};
use crate::commit::commit;
use crate::config::Config;
use crate::dispatch::bundle_from_request;
use crate::msg::{AddMapRequest, AddMapResponse};
use crate::store::sqlite::SqliteMapStore;
use crate::store::MapStore;

/// Shared state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MapStore>,
    pub clock: Arc<dyn Clock>,
}

/// Starts the map service on `[server].bind` using the configured database.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = SqliteMapStore::open(config).await?;
    let state = AppState {
        store: Arc::new(store),
        clock: Arc::new(SystemClock),
    };

    let app = router(&config.server.service_name, state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;

    info!(
        "Map service '{}' listening on http://{}",
        config.server.service_name, config.server.bind
    );
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the service router for `service_name`.
pub fn router(service_name: &str, state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(&format!("/{}/health", service_name), get(handle_health))
        .route(
            &format!("/{}/add_map", service_name),
            post(handle_add_map).layer(DefaultBodyLimit::disable()),
        )
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_add_map(
    State(state): State<AppState>,
    Json(request): Json<AddMapRequest>,
) -> Json<AddMapResponse> {
    let name = request.map_info.name.clone();
    info!("AddMap request for map {}", name);

    let result = match bundle_from_request(request) {
        Ok(bundle) => commit(state.store.as_ref(), bundle, state.clock.as_ref()).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(record) => {
            info!("Map {} stored ({})", record.name, record.id);
            Json(AddMapResponse::ok())
        }
        Err(e) => {
            error!("AddMap for map {} failed: {}", name, e);
            Json(AddMapResponse::failed(e.to_string()))
        }
    }
}
