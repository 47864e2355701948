use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::alert::summary::AlertSummary;
use crate::config::Config;
use crate::error::EngineError;
use crate::hazard::events::{EventDigest, EventFeed};
use crate::hazard::RiskAssessment;
use crate::inventory::shipment::ShipmentUpdate;
use crate::inventory::{normalize_product_id, NewShipment, Product, ShipmentRecord};
use crate::planner::{DelayPrediction, ReorderRecommendation, ResilienceScore};
use crate::scan::{ScanEngine, ScanReport};
use crate::types::Severity;

#[derive(Clone)]
pub struct ApiState {
    config: Arc<Config>,
    engine: Arc<ScanEngine>,
    events: Arc<EventFeed>,
}

impl ApiState {
    pub fn new(config: Config, engine: Arc<ScanEngine>, events: Arc<EventFeed>) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            events,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        let status = match &error {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    provider: String,
    events_provider: String,
}

#[derive(Debug, Default, Deserialize)]
struct DelayQuery {
    product: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventQuery {
    min_severity: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockRequest {
    product_id: String,
    stock_level: i64,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/scan", post(scan))
        .route("/v1/risk/:location", get(risk))
        .route("/v1/delays", get(delays))
        .route("/v1/reorder", get(reorder))
        .route("/v1/resilience", get(resilience))
        .route("/v1/alerts", get(alerts))
        .route("/v1/events", get(events))
        .route("/v1/products", get(products))
        .route("/v1/products/:id", get(product))
        .route("/v1/stock", post(update_stock))
        .route("/v1/shipments", get(shipments).post(register_shipment))
        .route("/v1/shipments/:id", post(update_shipment))
        .route("/v1/config", get(show_config))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(state: ApiState, bind: SocketAddr) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<ApiState>) -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse {
        status: "ok",
        provider: state.engine.assessor().provider_name().to_string(),
        events_provider: state.events.provider_name().to_string(),
    })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config.as_ref().clone())
}

async fn scan(State(state): State<ApiState>) -> ApiResult<ScanReport> {
    Ok(ok(state.engine.run().await?))
}

async fn risk(State(state): State<ApiState>, Path(location): Path<String>) -> ApiResult<RiskAssessment> {
    if location.trim().is_empty() {
        return Err(ApiError::bad_request("location must not be empty"));
    }
    Ok(ok(state.engine.risk(&location).await))
}

async fn delays(
    State(state): State<ApiState>,
    Query(query): Query<DelayQuery>,
) -> ApiResult<Vec<DelayPrediction>> {
    let product = query.product.as_deref().map(normalize_product_id);
    Ok(ok(state.engine.delays(product.as_deref()).await?))
}

async fn reorder(State(state): State<ApiState>) -> ApiResult<Vec<ReorderRecommendation>> {
    Ok(ok(state.engine.reorders().await?))
}

async fn resilience(State(state): State<ApiState>) -> ApiResult<ResilienceScore> {
    Ok(ok(state.engine.resilience().await?))
}

async fn alerts(State(state): State<ApiState>) -> ApiResult<AlertSummary> {
    Ok(ok(state.engine.alert_summary()?))
}

async fn events(
    State(state): State<ApiState>,
    Query(query): Query<EventQuery>,
) -> ApiResult<EventDigest> {
    let floor = match query.min_severity.as_deref() {
        Some(raw) => raw
            .parse::<Severity>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
        None => Severity::Low,
    };
    let mut digest = state.events.digest().await;
    digest.events.retain(|e| e.severity >= floor);
    Ok(ok(digest))
}

async fn products(State(state): State<ApiState>) -> ApiResult<Vec<Product>> {
    Ok(ok(state.engine.store().list_products()?))
}

async fn product(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult<Product> {
    Ok(ok(state.engine.product(&normalize_product_id(&id))?))
}

async fn update_stock(
    State(state): State<ApiState>,
    Json(request): Json<StockRequest>,
) -> ApiResult<Product> {
    let level = u32::try_from(request.stock_level)
        .map_err(|_| ApiError::bad_request("stockLevel must be a non-negative integer"))?;
    let product_id = normalize_product_id(&request.product_id);
    Ok(ok(state.engine.store().update_stock(&product_id, level)?))
}

async fn shipments(State(state): State<ApiState>) -> ApiResult<Vec<ShipmentRecord>> {
    Ok(ok(state.engine.store().list_shipments(None)?))
}

async fn register_shipment(
    State(state): State<ApiState>,
    Json(mut request): Json<NewShipment>,
) -> ApiResult<ShipmentRecord> {
    request.product_id = normalize_product_id(&request.product_id);
    Ok(ok(state.engine.store().register_shipment(&request)?))
}

async fn update_shipment(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(update): Json<ShipmentUpdate>,
) -> ApiResult<ShipmentRecord> {
    Ok(ok(state.engine.store().update_shipment(id, update)?))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}
