//! HTTP routes
//!
//! Thin JSON wrappers over the classifier and the escalation tracker.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use concierge_core::{ChatMessage, IntentResult, SemanticMatcher};
use concierge_escalation::{EscalationContext, EscalationEntry, EscalationReason};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::state::{AppState, ReloadReport};

pub fn router(state: AppState) -> Router {
    Router::new()
        // Classification
        .route("/api/classify", post(classify))
        // Escalation
        .route("/api/escalate", post(escalate))
        .route("/api/staff-reply", post(staff_reply))
        .route("/api/should-escalate", post(should_escalate))
        .route("/api/escalations", get(pending_escalations))
        // Admin
        .route("/api/admin/reload", post(reload))
        // Operations
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
    pub text: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub last_intent: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EscalateResponse {
    /// Localized text to send back to the guest
    pub acknowledgment: String,
}

#[derive(Debug, Deserialize)]
pub struct StaffReplyRequest {
    pub phone: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StaffReplyResponse {
    pub cleared: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShouldEscalateRequest {
    #[serde(default)]
    pub reason: Option<EscalationReason>,
    #[serde(default)]
    pub unknown_count: u32,
    #[serde(default)]
    pub guest_count: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShouldEscalateResponse {
    pub escalate: bool,
    pub reason: Option<EscalationReason>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub emergency_rules: usize,
    pub keyword_intents: usize,
    pub semantic_examples: usize,
    pub semantic_ready: bool,
    pub llm_configured: bool,
    pub pending_escalations: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/classify - Classify one guest message
async fn classify(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Json<IntentResult> {
    let result = state
        .classifier
        .classify(&req.text, &req.history, req.last_intent.as_deref())
        .await;
    Json(result)
}

/// POST /api/escalate - Page staff for a guest
async fn escalate(
    State(state): State<AppState>,
    Json(ctx): Json<EscalationContext>,
) -> Result<Json<EscalateResponse>, StatusCode> {
    if ctx.phone.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let acknowledgment = state.escalations.escalate(ctx).await;
    Ok(Json(EscalateResponse { acknowledgment }))
}

/// POST /api/staff-reply - A staff member answered; clear pending escalations
async fn staff_reply(
    State(state): State<AppState>,
    Json(req): Json<StaffReplyRequest>,
) -> Json<StaffReplyResponse> {
    let cleared = state.escalations.on_staff_reply(&req.phone);
    Json(StaffReplyResponse { cleared })
}

/// POST /api/should-escalate - Evaluate the escalation policy
async fn should_escalate(
    State(state): State<AppState>,
    Json(req): Json<ShouldEscalateRequest>,
) -> Json<ShouldEscalateResponse> {
    let reason = state
        .escalations
        .should_escalate(req.reason, req.unknown_count, req.guest_count);
    Json(ShouldEscalateResponse {
        escalate: reason.is_some(),
        reason,
    })
}

/// GET /api/escalations - Pending escalations
async fn pending_escalations(State(state): State<AppState>) -> Json<Vec<EscalationEntry>> {
    Json(state.escalations.pending())
}

/// POST /api/admin/reload - Re-read configuration and data files
async fn reload(State(state): State<AppState>) -> (StatusCode, Json<ReloadReport>) {
    let report = state.reload().await;
    let status = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(report))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        emergency_rules: state.rules.len(),
        keyword_intents: state.keywords.len(),
        semantic_examples: state.examples.len(),
        semantic_ready: state.examples.is_ready(),
        llm_configured: state.classifier.has_llm(),
        pending_escalations: state.escalations.len(),
    })
}

/// GET /metrics - Prometheus text format
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics {
        Some(ref handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed".to_string()),
    }
}
