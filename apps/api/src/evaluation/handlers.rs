//! Axum route handlers for the Evaluation and Outcome APIs.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::blueprint::spec::PromptSpec;
use crate::errors::AppError;
use crate::evaluation::judge::{judge_output, Judgement};
use crate::evaluation::outcomes::{
    compute_outcome_stats, validate_outcome, OutcomeCategory, OutcomeStats,
};
use crate::evaluation::rubric::{score_rubric, RubricReport};
use crate::evaluation::store;
use crate::models::evaluation::OutcomeRow;
use crate::organizations::access::{llm_for_scope, require_permission, track_usage, CallerScope};
use crate::organizations::roles::Permission;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    #[serde(default)]
    pub scores: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
pub struct JudgeRequest {
    #[serde(flatten)]
    pub scope: CallerScope,
    pub spec: PromptSpec,
    pub output: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordOutcomeRequest {
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub rating: i16,
    pub category: OutcomeCategory,
    #[serde(default)]
    pub edits_needed: bool,
    pub feedback: Option<String>,
    pub spec: PromptSpec,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/evaluations/score
///
/// Folds caller-supplied dimension scores into a rubric report. No LLM call.
pub async fn handle_score(Json(request): Json<ScoreRequest>) -> Json<RubricReport> {
    Json(score_rubric(&request.scores))
}

/// POST /api/v1/evaluations/judge
///
/// Has the LLM grade an output against its spec. Unusable replies come back
/// as neutral scores with `degraded: true`.
pub async fn handle_judge(
    State(state): State<AppState>,
    Json(request): Json<JudgeRequest>,
) -> Result<Json<Judgement>, AppError> {
    if request.output.trim().is_empty() {
        return Err(AppError::Validation("output cannot be empty".to_string()));
    }

    let llm = llm_for_scope(&state, &request.scope, Permission::RunExperiments).await?;
    let judgement =
        judge_output(&llm, &request.spec, &request.output, request.scope.provider).await?;
    track_usage(&state, &request.scope, "judge", judgement.usage.as_ref()).await;

    Ok(Json(judgement))
}

/// POST /api/v1/outcomes
///
/// Appends an outcome record with an immutable snapshot of the spec it rates.
pub async fn handle_record_outcome(
    State(state): State<AppState>,
    Json(request): Json<RecordOutcomeRequest>,
) -> Result<(StatusCode, Json<OutcomeRow>), AppError> {
    let outcome = validate_outcome(
        request.rating,
        request.category,
        request.edits_needed,
        request.feedback.as_deref(),
    )
    .map_err(AppError::Validation)?;

    if let Some(org_id) = request.organization_id {
        require_permission(&state, org_id, request.user_id, Permission::RunExperiments).await?;
    }

    let snapshot = serde_json::to_value(&request.spec).map_err(|e| AppError::Internal(e.into()))?;
    let row = store::insert_outcome(
        &state.db,
        request.organization_id,
        request.user_id,
        &outcome,
        &snapshot,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/outcomes/stats?user_id=...&organization_id=...
pub async fn handle_outcome_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<OutcomeStats>, AppError> {
    if let Some(org_id) = query.organization_id {
        require_permission(&state, org_id, query.user_id, Permission::ViewPrompts).await?;
    }

    let rows = store::list_outcomes(&state.db, query.organization_id, query.user_id).await?;
    Ok(Json(compute_outcome_stats(&rows)))
}
