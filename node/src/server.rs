// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use busline_kernel::LocationReport;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::{HealthResponse, IngestResponse, LimitParams, VehicleView};
use crate::catalog::{CatalogSource, Stop};
use crate::config::NodeConfig;
use crate::errors::NodeError;
use crate::gateway::{GatewayMessage, StreamGateway};
use crate::ingest::{IngestHandler, IngestOutcome};
use crate::notifier::ChangeNotifier;
use crate::query::QueryService;
use crate::store::RecordStore;

/// Everything the handlers share. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub notifier: ChangeNotifier,
    pub ingest: IngestHandler,
    pub query: QueryService,
    pub gateway: StreamGateway,
    pub catalog: Arc<dyn CatalogSource>,
}

impl AppState {
    pub fn new(store: Arc<RecordStore>, catalog: Arc<dyn CatalogSource>, cfg: &NodeConfig) -> Self {
        let notifier = ChangeNotifier::new(cfg.queue_capacity);
        let query = QueryService::new(Arc::clone(&store));
        Self {
            ingest: IngestHandler::new(Arc::clone(&store), notifier.clone()),
            gateway: StreamGateway::new(query.clone(), notifier.clone(), cfg.keepalive),
            query,
            notifier,
            store,
            catalog,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/location", post(post_location))
        .route("/api/vehicles", get(list_vehicles))
        .route("/api/vehicles/:device_id", get(get_vehicle))
        .route("/api/routes", get(get_routes))
        .route("/api/stops", get(get_stops))
        .route("/api/stream", get(stream_vehicles))
        .route("/api/locations/all", get(all_locations))
        .route("/api/locations/latest", get(latest_location))
        .route("/locations/recent", get(recent_locations))
        // Observability
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn post_location(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), NodeError> {
    // The append fsyncs; keep it off the async workers.
    let ingest = state.ingest.clone();
    let outcome = tokio::task::spawn_blocking(move || ingest.ingest_bytes(&body))
        .await
        .map_err(|_| NodeError::Internal)??;
    match outcome {
        IngestOutcome::Stored(_) => Ok((StatusCode::CREATED, Json(IngestResponse::stored()))),
        IngestOutcome::Ignored => Ok((StatusCode::OK, Json(IngestResponse::ignored()))),
    }
}

async fn list_vehicles(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<VehicleView>>, NodeError> {
    Ok(Json(state.query.vehicles(params.limit).await?))
}

async fn get_vehicle(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<VehicleView>, NodeError> {
    Ok(Json(state.query.vehicle(&device_id).await?))
}

async fn get_routes(State(state): State<AppState>) -> Result<Json<Value>, NodeError> {
    let catalog = Arc::clone(&state.catalog);
    let routes = tokio::task::spawn_blocking(move || catalog.routes())
        .await
        .map_err(|_| NodeError::Internal)?;
    Ok(Json(routes))
}

async fn get_stops(State(state): State<AppState>) -> Result<Json<Vec<Stop>>, NodeError> {
    let catalog = Arc::clone(&state.catalog);
    let stops = tokio::task::spawn_blocking(move || catalog.stops())
        .await
        .map_err(|_| NodeError::Internal)?;
    Ok(Json(stops))
}

async fn stream_vehicles(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(sse_events(&state.gateway))
}

/// `vehicles` events carry the full snapshot; heartbeats are SSE comments.
pub fn sse_events(gateway: &StreamGateway) -> impl Stream<Item = Result<Event, Infallible>> {
    gateway.connect().filter_map(|msg| async move {
        match msg {
            GatewayMessage::Snapshot(views) => match Event::default().event("vehicles").json_data(&views) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::error!("failed to encode snapshot: {}", e);
                    None
                }
            },
            GatewayMessage::Heartbeat => Some(Ok(Event::default().comment("keepalive"))),
        }
    })
}

async fn all_locations(State(state): State<AppState>) -> Result<Json<Vec<Arc<LocationReport>>>, NodeError> {
    Ok(Json(state.query.all_records().await?))
}

async fn latest_location(State(state): State<AppState>) -> Result<Json<Value>, NodeError> {
    let latest = state
        .query
        .last_record()
        .await?
        .and_then(|r| serde_json::to_value(r.as_ref()).ok())
        .unwrap_or_else(|| Value::Object(Default::default()));
    Ok(Json(latest))
}

async fn recent_locations(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Arc<LocationReport>>>, NodeError> {
    Ok(Json(state.query.recent(params.limit).await?))
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, NodeError> {
    let stats = state.query.stats().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        records: stats.records,
        devices: stats.devices,
        subscribers: state.notifier.subscriber_count(),
        durable: stats.durable,
    }))
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
