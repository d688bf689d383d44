//! HTTP API дашборда

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::error::ApiError;
use crate::service::{AlertsView, DashboardData, DashboardRequest, DashboardService};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DashboardService>,
}

impl AppState {
    pub fn new(service: DashboardService) -> Self {
        Self { service: Arc::new(service) }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/dashboard-data", post(dashboard_data).delete(invalidate_cache))
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/resolve", post(resolve_alert))
        .route("/api/alerts/unresolve", post(unresolve_alert))
        .layer(cors)
        .with_state(state)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "error": self.to_string(),
            "timestamp": Utc::now(),
        });
        (status, Json(body)).into_response()
    }
}

/// `req_{ms}_{9 случайных символов}`
fn request_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("req_{}_{}", Utc::now().timestamp_millis(), suffix.to_lowercase())
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Resource Planner API",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Dashboard data API is running",
        "timestamp": Utc::now(),
        "redis_enabled": state.service.redis_enabled(),
    }))
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub data: DashboardData,
    pub request_id: String,
    pub response_time: String,
}

async fn dashboard_data(
    State(state): State<AppState>,
    Json(request): Json<DashboardRequest>,
) -> Result<Json<DashboardResponse>, Response> {
    let started = Instant::now();
    let request_id = request_id();

    let Some(filters) = request.filters else {
        return Err(ApiError::BadRequest("Фильтры обязательны для запроса".into()).into_response());
    };
    tracing::info!(
        request_id = %request_id,
        period = filters.period.as_str(),
        "Dashboard data request"
    );

    match state
        .service
        .load(filters, request.user_restrictions, request.what_if, Utc::now())
        .await
    {
        Ok(data) => {
            let response_time = format!("{}ms", started.elapsed().as_millis());
            tracing::info!(
                request_id = %request_id,
                response_time = %response_time,
                cache_status = %data.cache_status,
                "Dashboard data served"
            );
            Ok(Json(DashboardResponse { data, request_id, response_time }))
        }
        Err(err) => {
            tracing::error!(
                request_id = %request_id,
                stage = err.stage(),
                error = %err,
                "Dashboard data request failed"
            );
            let body = json!({
                "error": "Не удалось загрузить данные дашборда",
                "details": err.to_string(),
                "stage": err.stage(),
                "timestamp": Utc::now(),
                "cache_status": "error",
                "redis_enabled": state.service.redis_enabled(),
                "request_id": request_id,
            });
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response())
        }
    }
}

async fn invalidate_cache(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: DashboardRequest = if body.is_empty() {
        DashboardRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Некорректное тело запроса: {e}")))?
    };

    let report = state
        .service
        .invalidate(
            request.filters.as_ref(),
            request.user_restrictions.as_ref(),
            Utc::now().date_naive(),
        )
        .await?;
    tracing::info!(deleted = report.deleted, "{}", report.message);

    let mut body = json!({
        "success": true,
        "message": report.message,
        "deleted": report.deleted,
        "redis_enabled": state.service.redis_enabled(),
    });
    if request.filters.is_some() {
        body["invalidated_keys"] = json!(report.invalidated_keys);
    }
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    #[serde(default, alias = "alertsCacheKey")]
    alerts_cache_key: Option<String>,
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<AlertsView>, ApiError> {
    let key = query
        .alerts_cache_key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::BadRequest("alerts_cache_key is required".into()))?;
    Ok(Json(state.service.alerts(&key, Utc::now()).await))
}

#[derive(Debug, Deserialize)]
struct AlertActionRequest {
    #[serde(default, alias = "alertId")]
    alert_id: Option<String>,
}

impl AlertActionRequest {
    fn alert_id(self) -> Result<String, ApiError> {
        self.alert_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("alertId is required".into()))
    }
}

async fn resolve_alert(
    State(state): State<AppState>,
    Json(request): Json<AlertActionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let alert_id = request.alert_id()?;
    let now = Utc::now();
    state.service.resolve_alert(&alert_id, now).await?;
    Ok(Json(json!({
        "success": true,
        "alert_id": alert_id,
        "resolved": true,
        "resolved_at": now,
    })))
}

async fn unresolve_alert(
    State(state): State<AppState>,
    Json(request): Json<AlertActionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let alert_id = request.alert_id()?;
    let removed = state.service.unresolve_alert(&alert_id).await?;
    Ok(Json(json!({
        "success": true,
        "alert_id": alert_id,
        "resolved": false,
        "removed": removed,
    })))
}
