//! Axum route handlers for the Blueprint API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::blueprint::analyzer::analyze_intent;
use crate::blueprint::render::render_blueprint;
use crate::blueprint::spec::{PromptSpec, SpecDraft};
use crate::errors::AppError;
use crate::organizations::access::{llm_for_scope, track_usage, CallerScope};
use crate::organizations::roles::Permission;
use crate::state::AppState;

const MAX_INTENT_CHARS: usize = 4000;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(flatten)]
    pub scope: CallerScope,
    #[serde(flatten)]
    pub draft: SpecDraft,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub spec: PromptSpec,
    pub degraded: bool,
    pub blueprint: String,
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub spec: PromptSpec,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub blueprint: String,
}

pub(crate) fn validate_intent(intent: &str) -> Result<(), AppError> {
    let intent = intent.trim();
    if intent.is_empty() {
        return Err(AppError::Validation("intent cannot be empty".to_string()));
    }
    if intent.chars().count() > MAX_INTENT_CHARS {
        return Err(AppError::Validation(format!(
            "intent exceeds {MAX_INTENT_CHARS} characters"
        )));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/blueprints/analyze
///
/// Infers tone / format / length for an intent and returns the merged spec
/// with its rendered blueprint. An unusable model reply still succeeds with
/// defaults and `degraded: true`.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    validate_intent(&request.draft.intent)?;

    let llm = llm_for_scope(&state, &request.scope, Permission::RunExperiments).await?;
    let analysis = analyze_intent(&llm, &request.draft, request.scope.provider).await?;
    track_usage(&state, &request.scope, "analyze", analysis.usage.as_ref()).await;

    let blueprint = render_blueprint(&analysis.spec);
    Ok(Json(AnalyzeResponse {
        spec: analysis.spec,
        degraded: analysis.degraded,
        blueprint,
    }))
}

/// POST /api/v1/blueprints/render
///
/// Renders a blueprint from a caller-supplied spec. No LLM call.
pub async fn handle_render(
    Json(request): Json<RenderRequest>,
) -> Result<Json<RenderResponse>, AppError> {
    validate_intent(&request.spec.intent)?;
    Ok(Json(RenderResponse {
        blueprint: render_blueprint(&request.spec),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_request_flattens_scope_and_draft() {
        let json = serde_json::json!({
            "user_id": "7f0c4a3e-5d0b-4a43-9d42-0d3e1b6f1a11",
            "provider": "openai",
            "intent": "Write a launch tweet",
            "tone": "casual"
        });
        let request: AnalyzeRequest = serde_json::from_value(json).unwrap();
        assert!(request.scope.organization_id.is_none());
        assert_eq!(request.scope.provider, Some(crate::llm_client::Provider::OpenAi));
        assert_eq!(request.draft.intent, "Write a launch tweet");
        assert_eq!(request.draft.tone, Some(crate::blueprint::vocab::Tone::Casual));
    }

    #[test]
    fn test_validate_intent_rejects_blank_and_oversized() {
        assert!(validate_intent("   ").is_err());
        assert!(validate_intent(&"x".repeat(MAX_INTENT_CHARS + 1)).is_err());
        assert!(validate_intent("Summarize this report").is_ok());
    }
}
