use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::service::{OrderChange, PlaceOrder, Storefront, Today};
use crate::calendar::CutoffConfig;
use crate::codes::{CodeValidation, CodeValidator, RebateCodeRequest, ReferralCodeRequest};
use crate::errors::{CalendarError, CodeValidationError, SessionError, StorefrontError};
use crate::models::parse_date;
use crate::session::{Claims, SessionService, bearer_token};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub storefront: Storefront,
    pub validator: Arc<dyn CodeValidator>,
    /// `None` when admin sessions are not configured; admin routes then
    /// answer 401.
    pub sessions: Option<SessionService>,
    pub today: Today,
    pub max_horizon_weeks: u32,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CalendarQuery {
    pub weeks: Option<u32>,
    pub date: Option<String>,
}

#[derive(Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Result of a code check. Failures are reported in the body, not as an
/// error status.
#[derive(Serialize)]
pub struct CodeCheckResponse {
    pub valid: bool,
    #[serde(flatten)]
    pub validation: Option<CodeValidation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub retryable: bool,
}

impl From<Result<CodeValidation, CodeValidationError>> for CodeCheckResponse {
    fn from(result: Result<CodeValidation, CodeValidationError>) -> Self {
        match result {
            Ok(validation) => Self {
                valid: true,
                validation: Some(validation),
                reason: None,
                retryable: false,
            },
            Err(e) => {
                let retryable = e.is_retryable();
                let reason = match e {
                    CodeValidationError::InvalidCode { reason } => reason,
                    CodeValidationError::Transient(_) => {
                        "Code validation is temporarily unavailable".to_string()
                    }
                };
                Self {
                    valid: false,
                    validation: None,
                    reason: Some(reason),
                    retryable,
                }
            }
        }
    }
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<StorefrontError> for ApiError {
    fn from(err: StorefrontError) -> Self {
        let msg = err.to_string();
        match err {
            StorefrontError::BreedNotFound { .. } | StorefrontError::OrderNotFound { .. } => {
                ApiError::NotFound(msg)
            }
            StorefrontError::CutoffPassed { .. }
            | StorefrontError::WeekOutsideHorizon { .. }
            | StorefrontError::InsufficientAvailability { .. }
            | StorefrontError::OrderCancelled { .. } => ApiError::Conflict(msg),
            StorefrontError::Calendar(_) | StorefrontError::BadRequest(_) => {
                ApiError::BadRequest(msg)
            }
            StorefrontError::Database(e) | StorefrontError::Other(e) => {
                error!(error = format!("{:#}", e), "Storefront request failed");
                ApiError::Internal(msg)
            }
        }
    }
}

impl From<CalendarError> for ApiError {
    fn from(err: CalendarError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Signing(_) => ApiError::Internal(err.to_string()),
            _ => ApiError::Unauthorized(err.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/breeds", get(list_breeds))
        .route("/api/calendar", get(get_calendar))
        .route("/api/cutoff", get(get_cutoff))
        .route("/api/admin/cutoff", put(set_cutoff))
        .route("/api/session", get(get_session).post(login))
        .route("/api/codes/rebate", post(validate_rebate))
        .route("/api/codes/referral", post(validate_referral))
        .route("/api/orders", post(place_order))
        .route(
            "/api/orders/{reference}",
            get(get_order).patch(modify_order),
        )
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

fn resolve_date(state: &AppState, raw: Option<&str>) -> Result<chrono::NaiveDate, ApiError> {
    match raw {
        Some(raw) => parse_date(raw).map_err(ApiError::BadRequest),
        None => Ok((state.today)()),
    }
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    let sessions = state
        .sessions
        .as_ref()
        .ok_or_else(|| ApiError::Unauthorized("Admin sessions are not configured".to_string()))?;
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let claims = sessions.verify_admin(bearer_token(raw)?)?;
    Ok(claims)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_breeds(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let breeds = state.storefront.breeds().await?;
    Ok(Json(breeds))
}

async fn get_calendar(
    State(state): State<SharedState>,
    Query(query): Query<CalendarQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let weeks = query.weeks.unwrap_or(state.storefront.horizon_weeks());
    if weeks == 0 {
        return Err(CalendarError::InvalidHorizon { horizon: 0 }.into());
    }
    if weeks > state.max_horizon_weeks {
        return Err(ApiError::BadRequest(format!(
            "Horizon {} exceeds the maximum of {} weeks",
            weeks, state.max_horizon_weeks
        )));
    }
    let reference = resolve_date(&state, query.date.as_deref())?;
    debug!(%reference, weeks, "Building calendar");
    let calendar = state.storefront.calendar(reference, weeks).await?;
    Ok(Json(calendar))
}

async fn get_cutoff(
    State(state): State<SharedState>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let today = resolve_date(&state, query.date.as_deref())?;
    let status = state.storefront.cutoff_status(today).await?;
    Ok(Json(status))
}

async fn set_cutoff(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<CutoffConfig>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = require_admin(&state, &headers)?;
    let cutoff = state.storefront.set_cutoff(req).await?;
    info!(admin = %claims.sub, cutoff = %cutoff.as_week(), "Cutoff set via API");
    Ok(Json(cutoff))
}

async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state
        .sessions
        .as_ref()
        .ok_or_else(|| ApiError::Unauthorized("Admin sessions are not configured".to_string()))?;
    let session = sessions.login(&req.username, &req.password).inspect_err(|_| {
        warn!(username = %req.username, "Failed admin login");
    })?;
    Ok(Json(session))
}

async fn get_session(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let claims = require_admin(&state, &headers)?;
    Ok(Json(claims))
}

async fn validate_rebate(
    State(state): State<SharedState>,
    Json(req): Json<RebateCodeRequest>,
) -> Json<CodeCheckResponse> {
    let result = state.validator.validate_rebate(req.normalized()).await;
    if let Err(CodeValidationError::Transient(detail)) = &result {
        warn!(detail = %detail, "Rebate code validation unavailable");
    }
    Json(result.into())
}

async fn validate_referral(
    State(state): State<SharedState>,
    Json(req): Json<ReferralCodeRequest>,
) -> Json<CodeCheckResponse> {
    let result = state.validator.validate_referral(req.normalized()).await;
    if let Err(CodeValidationError::Transient(detail)) = &result {
        warn!(detail = %detail, "Referral code validation unavailable");
    }
    Json(result.into())
}

async fn place_order(
    State(state): State<SharedState>,
    Json(req): Json<PlaceOrder>,
) -> Result<impl IntoResponse, ApiError> {
    let today = (state.today)();
    let order = state.storefront.place_order(req, today).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    State(state): State<SharedState>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.storefront.get_order(reference).await?;
    Ok(Json(order))
}

async fn modify_order(
    State(state): State<SharedState>,
    Path(reference): Path<String>,
    Json(change): Json<OrderChange>,
) -> Result<impl IntoResponse, ApiError> {
    let today = (state.today)();
    let order = state
        .storefront
        .modify_order(reference, change, today)
        .await?;
    Ok(Json(order))
}
