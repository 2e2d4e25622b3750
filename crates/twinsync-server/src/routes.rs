//! JSON API routes.
//!
//! [`router`] wires every endpoint into an [`axum::Router`] over a shared
//! [`ApiState`].  Handlers answer with JSON; every failure, including
//! unknown paths, wrong methods and malformed bodies, is `{"detail": "..."}`.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tower_http::timeout::RequestBodyTimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use twinsync_memory::{DEFAULT_HISTORY_LIMIT, StoreError};
use twinsync_runtime::{CheckError, SpotChecker, voices};
use twinsync_types::{NewSpot, SpotError, SpotType, SpotUpdate, Voice};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// How long a client may take to deliver a request body.
pub const DEFAULT_BODY_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Which external services have credentials, as reported by `/api/settings`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    pub gemini_api_key_configured: bool,
    pub supervisor_token_configured: bool,
}

/// Everything a request handler needs.
pub struct ApiState {
    checker: SpotChecker,
    status: ServiceStatus,
}

impl ApiState {
    pub fn new(checker: SpotChecker, status: ServiceStatus) -> Self {
        Self { checker, status }
    }
}

type SharedState = Arc<ApiState>;

/// Build the API router with the default body timeout.
pub fn router(state: SharedState) -> Router {
    router_with_body_timeout(state, DEFAULT_BODY_TIMEOUT)
}

pub fn router_with_body_timeout(state: SharedState, body_timeout: StdDuration) -> Router {
    Router::new()
        .route("/api/spots", only(get(list_spots).post(create_spot)))
        .route(
            "/api/spots/{id}",
            only(get(get_spot).put(update_spot).delete(delete_spot)),
        )
        .route("/api/spots/{id}/check", only(post(check_spot)))
        .route("/api/spots/{id}/reset", only(post(reset_spot)))
        .route("/api/spots/{id}/snooze", only(post(snooze_spot)))
        .route("/api/spots/{id}/unsnooze", only(post(unsnooze_spot)))
        .route("/api/check-all", only(post(check_all)))
        .route("/api/cameras", only(get(cameras)))
        .route("/api/spot-types", only(get(spot_types)))
        .route("/api/voices", only(get(list_voices)))
        .route("/api/settings", only(get(settings)))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyTimeoutLayer::new(body_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn only(methods: MethodRouter<SharedState>) -> MethodRouter<SharedState> {
    methods.fallback(method_not_allowed)
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not found")
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<SpotError> for ApiError {
    fn from(err: SpotError) -> Self {
        let status = match &err {
            SpotError::NotFound(_) => StatusCode::NOT_FOUND,
            SpotError::InvalidValue { .. } | SpotError::Snoozed(_) => StatusCode::BAD_REQUEST,
            SpotError::SnapshotUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            SpotError::Storage(detail) => {
                error!(detail = %detail, "storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        SpotError::from(err).into()
    }
}

impl From<CheckError> for ApiError {
    fn from(err: CheckError) -> Self {
        SpotError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            s @ (StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNSUPPORTED_MEDIA_TYPE) => s,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// Numeric `{id}` path segment; anything else is an unknown path.
struct SpotId(i64);

impl<S: Send + Sync> FromRequestParts<S> for SpotId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::new(StatusCode::NOT_FOUND, "Not found"))?;
        Ok(SpotId(id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateSpotBody {
    name: String,
    description: String,
    camera_entity_id: String,
    spot_type: String,
    #[serde(default)]
    voice_id: Option<String>,
}

#[derive(Deserialize)]
struct UpdateSpotBody {
    name: Option<String>,
    description: Option<String>,
    camera_entity_id: Option<String>,
    spot_type: Option<String>,
    voice_id: Option<String>,
}

#[derive(Deserialize)]
struct SnoozeBody {
    hours: i64,
}

async fn list_spots(State(state): State<SharedState>) -> ApiResult {
    let spots = state.checker.with_store(|store| store.list_spots()).await?;
    Ok(Json(json!({ "spots": spots })))
}

async fn create_spot(
    State(state): State<SharedState>,
    body: Result<Json<CreateSpotBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let spot = NewSpot {
        name: body.name,
        description: body.description,
        camera_entity_id: body.camera_entity_id,
        spot_type: body.spot_type.parse::<SpotType>()?,
        voice: match body.voice_id {
            Some(v) => v.parse::<Voice>()?,
            None => Voice::default(),
        },
    };
    let id = state
        .checker
        .with_store(move |store| store.create_spot(&spot))
        .await?;
    Ok(Json(json!({ "id": id, "message": "Spot created successfully" })))
}

async fn get_spot(State(state): State<SharedState>, SpotId(id): SpotId) -> ApiResult {
    let (spot, checks) = state
        .checker
        .with_store(move |store| {
            let spot = store.get_spot(id)?.ok_or(StoreError::SpotNotFound(id))?;
            Ok((spot, store.history(id, DEFAULT_HISTORY_LIMIT)?))
        })
        .await?;
    Ok(Json(json!({ "spot": spot, "checks": checks })))
}

async fn update_spot(
    State(state): State<SharedState>,
    SpotId(id): SpotId,
    body: Result<Json<UpdateSpotBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let update = SpotUpdate {
        name: body.name,
        description: body.description,
        camera_entity_id: body.camera_entity_id,
        spot_type: body.spot_type.map(|t| t.parse::<SpotType>()).transpose()?,
        voice: body.voice_id.map(|v| v.parse::<Voice>()).transpose()?,
    };
    let spot = state
        .checker
        .with_store(move |store| store.update_spot(id, &update))
        .await?;
    Ok(Json(json!({ "message": "Spot updated successfully", "spot": spot })))
}

async fn delete_spot(State(state): State<SharedState>, SpotId(id): SpotId) -> ApiResult {
    state.checker.with_store(move |store| store.delete_spot(id)).await?;
    Ok(Json(json!({ "message": "Spot deleted successfully" })))
}

async fn check_spot(State(state): State<SharedState>, SpotId(id): SpotId) -> ApiResult {
    let check = state.checker.check_spot(id).await?;
    Ok(Json(json!(check)))
}

async fn reset_spot(State(state): State<SharedState>, SpotId(id): SpotId) -> ApiResult {
    let removed = state.checker.with_store(move |store| store.reset_spot(id)).await?;
    Ok(Json(json!({ "message": "Spot reset successfully", "removed": removed })))
}

async fn snooze_spot(
    State(state): State<SharedState>,
    SpotId(id): SpotId,
    body: Result<Json<SnoozeBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let until = Duration::try_hours(body.hours)
        .and_then(|d| Utc::now().checked_add_signed(d))
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Snooze duration out of range"))?;
    state
        .checker
        .with_store(move |store| store.snooze_spot(id, until))
        .await?;
    Ok(Json(json!({
        "message": format!("Spot snoozed for {} hours", body.hours),
        "snoozed_until": until,
    })))
}

async fn unsnooze_spot(State(state): State<SharedState>, SpotId(id): SpotId) -> ApiResult {
    state.checker.with_store(move |store| store.unsnooze_spot(id)).await?;
    Ok(Json(json!({ "message": "Spot unsnoozed" })))
}

async fn check_all(State(state): State<SharedState>) -> ApiResult {
    let results = state.checker.check_all().await?;
    Ok(Json(json!({ "results": results })))
}

async fn cameras(State(state): State<SharedState>) -> ApiResult {
    let cameras = state.checker.camera().cameras().await;
    Ok(Json(json!({ "cameras": cameras })))
}

async fn spot_types() -> Json<Value> {
    let templates: Map<String, Value> = SpotType::ALL
        .iter()
        .filter_map(|t| Some((t.as_str().to_string(), json!(t.template()?))))
        .collect();
    let types: Vec<&str> = SpotType::ALL.iter().map(|t| t.as_str()).collect();
    Json(json!({ "types": types, "templates": templates }))
}

async fn list_voices() -> Json<Value> {
    Json(json!({ "voices": voices::all_voices() }))
}

async fn settings(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "gemini_api_key_configured": state.status.gemini_api_key_configured,
        "supervisor_token_configured": state.status.supervisor_token_configured,
    }))
}
