use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::AppContext;
use crate::domain::{BridgeResult, Level, Profile, ProfileOverrides};
use crate::error::AppError;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Liveness payload
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

/// Body of `POST /api/connect`
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    concept_a: String,
    concept_b: String,
    #[serde(default)]
    knowledge_level: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    education_level: Option<String>,
    #[serde(default)]
    education_system: Option<String>,
    #[serde(default)]
    concept_a_knowledge: Option<i64>,
    #[serde(default)]
    concept_b_knowledge: Option<i64>,
}

/// Query string carrying an optional session and limit
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    session_id: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

/// Body of `POST /api/profile`
#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    session_id: String,
    #[serde(flatten)]
    profile: Profile,
}

/// Body of `POST /api/feedback`
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    connection_id: Option<String>,
    #[serde(default)]
    rating: Option<i64>,
    #[serde(default)]
    comments: Option<String>,
}

/// Error wrapper mapping pipeline errors onto HTTP responses
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<crate::error::StorageError> for ApiError {
    fn from(err: crate::error::StorageError) -> Self {
        Self(AppError::Storage(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Model(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Liveness endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Run the bridge pipeline for a concept pair
pub async fn connect(
    State(ctx): State<AppContext>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<BridgeResult>, ApiError> {
    let level = request
        .knowledge_level
        .as_deref()
        .and_then(|raw| raw.parse::<Level>().ok())
        .unwrap_or_default();

    let overrides = ProfileOverrides {
        knowledge_level: Some(level.to_string()),
        education_level: request.education_level.clone(),
        education_system: request.education_system.clone(),
        concept_a_knowledge: request.concept_a_knowledge,
        concept_b_knowledge: request.concept_b_knowledge,
    };

    // Profiles are written back only on this explicit path, never by the
    // orchestrator itself.
    if let Some(session_id) = &request.session_id {
        let mut profile = ctx.storage.get_profile(session_id).await?;
        profile.apply_overrides(&overrides);
        ctx.storage.upsert_profile(session_id, &profile).await?;
    }

    let result = ctx
        .orchestrator
        .process_query(
            &request.concept_a,
            &request.concept_b,
            level,
            request.session_id.as_deref(),
            Some(&overrides),
        )
        .await?;

    Ok(Json(result))
}

/// Fetch the stored profile for a session
pub async fn get_profile(
    State(ctx): State<AppContext>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Profile>, ApiError> {
    let session_id = require_session(query.session_id)?;
    let profile = ctx.storage.get_profile(&session_id).await?;
    Ok(Json(profile))
}

/// Create or update the profile for a session
pub async fn set_profile(
    State(ctx): State<AppContext>,
    Json(request): Json<ProfileUpdateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.storage
        .upsert_profile(&request.session_id, &request.profile)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

/// Record learner feedback
pub async fn feedback(
    State(ctx): State<AppContext>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.storage
        .save_feedback(
            request.session_id.as_deref(),
            request.connection_id.as_deref(),
            request.rating,
            request.comments.as_deref(),
        )
        .await?;
    Ok(Json(json!({ "ok": true })))
}

/// Recent fairness reports for a session, with an aggregate
pub async fn fairness(
    State(ctx): State<AppContext>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session_id = require_session(query.session_id)?;
    let limit = query.limit.unwrap_or(5);
    let items = ctx.storage.recent_results(&session_id, limit).await?;

    let overalls: Vec<f64> = items
        .iter()
        .filter_map(|item| item.fairness.as_ref())
        .filter_map(|fairness| fairness.get("overall").and_then(|v| v.as_f64()))
        .collect();
    let avg_overall = if overalls.is_empty() {
        None
    } else {
        let avg = overalls.iter().sum::<f64>() / overalls.len() as f64;
        Some((avg * 100.0).round() / 100.0)
    };
    let bias_flags = items.iter().filter(|item| item.bias_flag).count();

    Ok(Json(json!({
        "items": items,
        "aggregate": {
            "avg_overall": avg_overall,
            "runs": items.len(),
            "bias_flags": bias_flags,
        }
    })))
}

/// Operational metrics: orchestrator summary plus database totals
pub async fn metrics(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let summary = ctx.orchestrator.metrics_summary();
    let totals = ctx.storage.usage_totals().await?;

    Ok(Json(json!({
        "pipeline": summary,
        "database": totals,
    })))
}

fn require_session(session_id: Option<String>) -> Result<String, ApiError> {
    session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            ApiError(AppError::Validation {
                field: "session_id".to_string(),
                reason: "is required".to_string(),
            })
        })
}
