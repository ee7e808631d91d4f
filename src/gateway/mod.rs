//! REST gateway over the service facade.
//!
//! A thin axum shell mounted under `/api/v1`; no routing or arbitration
//! logic lives here. Selection and validation failures map to HTTP 400 with
//! an `{"status": "error", "message": ...}` body, unknown ids to 404, and
//! everything else to 500.

use crate::config::GatewayConfig;
use crate::error::{ArbiterError, Result};
use crate::router::RouteQuery;
use crate::service::ArbiterService;
use crate::types::{OutcomeId, StatusTag, TestId, VariantId};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Serve the gateway until the listener fails.
pub async fn run_gateway(config: GatewayConfig, service: Arc<ArbiterService>) -> Result<()> {
    let app = router(service);
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Gateway listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| ArbiterError::Network(e.to_string()))?;

    Ok(())
}

/// Build the gateway's route table.
pub fn router(service: Arc<ArbiterService>) -> axum::Router {
    axum::Router::new()
        .route("/api/v1/endpoints", get(list_endpoints))
        .route("/api/v1/endpoints/:name", get(get_endpoint))
        .route("/api/v1/variants", get(list_variants))
        .route("/api/v1/variants/:id", get(get_variant))
        .route("/api/v1/statuses", get(list_statuses).post(create_status))
        .route("/api/v1/outcomes", get(list_outcomes))
        .route("/api/v1/outcomes/:id", get(get_outcome))
        .route("/api/v1/outcomes/:id/feedback", put(put_feedback))
        .route("/api/v1/abtests", get(list_tests).post(start_test))
        .route("/api/v1/abtests/:id", get(get_test))
        .route("/api/v1/abtests/:id/stop", post(stop_test))
        .route("/api/v1/:endpoint/predict", post(predict))
        .with_state(service)
}

/// Error wrapper mapping the arbiter taxonomy onto HTTP statuses.
struct ApiError(ArbiterError);

impl From<ArbiterError> for ApiError {
    fn from(e: ArbiterError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ArbiterError::NotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "status": "error",
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct PredictParams {
    status: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateStatusRequest {
    variant: VariantId,
    status: StatusTag,
    created_by: String,
}

#[derive(Debug, Deserialize)]
struct StartTestRequest {
    variant_1: VariantId,
    variant_2: VariantId,
    created_by: String,
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    feedback: String,
}

#[derive(Debug, Deserialize)]
struct ActorParams {
    actor: Option<String>,
}

async fn predict(
    State(service): State<Arc<ArbiterService>>,
    Path(endpoint): Path<String>,
    Query(params): Query<PredictParams>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let query = RouteQuery::from_params(params.status.as_deref(), params.version)?;
    let outcome = service.predict(&endpoint, &query, body).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(ArbiterError::from)?))
}

async fn list_endpoints(State(service): State<Arc<ArbiterService>>) -> impl IntoResponse {
    Json(service.endpoints().await)
}

async fn get_endpoint(
    State(service): State<Arc<ArbiterService>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(service.endpoint(&name).await?))
}

async fn list_variants(State(service): State<Arc<ArbiterService>>) -> impl IntoResponse {
    Json(service.variants().await)
}

async fn get_variant(
    State(service): State<Arc<ArbiterService>>,
    Path(id): Path<VariantId>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(service.variant(id).await?))
}

async fn list_statuses(State(service): State<Arc<ArbiterService>>) -> impl IntoResponse {
    Json(service.statuses().await)
}

async fn create_status(
    State(service): State<Arc<ArbiterService>>,
    Json(request): Json<CreateStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let record = service
        .create_status(request.variant, request.status, &request.created_by)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_outcomes(State(service): State<Arc<ArbiterService>>) -> impl IntoResponse {
    Json(service.outcomes().await)
}

async fn get_outcome(
    State(service): State<Arc<ArbiterService>>,
    Path(id): Path<OutcomeId>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(service.outcome(id).await?))
}

async fn put_feedback(
    State(service): State<Arc<ArbiterService>>,
    Path(id): Path<OutcomeId>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(service.attach_feedback(id, &request.feedback).await?))
}

async fn list_tests(State(service): State<Arc<ArbiterService>>) -> impl IntoResponse {
    Json(service.ab_tests().await)
}

async fn get_test(
    State(service): State<Arc<ArbiterService>>,
    Path(id): Path<TestId>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(service.ab_test(id).await?))
}

async fn start_test(
    State(service): State<Arc<ArbiterService>>,
    Json(request): Json<StartTestRequest>,
) -> ApiResult<impl IntoResponse> {
    let test = service
        .start_ab_test(request.variant_1, request.variant_2, &request.created_by)
        .await?;
    Ok((StatusCode::CREATED, Json(test)))
}

async fn stop_test(
    State(service): State<Arc<ArbiterService>>,
    Path(id): Path<TestId>,
    Query(params): Query<ActorParams>,
) -> ApiResult<impl IntoResponse> {
    let actor = params.actor.unwrap_or_else(|| "system".to_string());
    Ok(Json(service.stop_ab_test(id, &actor).await?))
}
