//! Axum route handlers for the Experiment API.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::blueprint::handlers::validate_intent;
use crate::blueprint::spec::PromptSpec;
use crate::blueprint::vocab::{Format, Length, Tone};
use crate::errors::AppError;
use crate::experiment::matrix::{dedup_axis, expand_matrix, MatrixCell};
use crate::experiment::report::{render_report_md, report_key, upload_report};
use crate::experiment::runner::{run_experiment, ExperimentRun};
use crate::experiment::store;
use crate::llm_client::{CompletionBackend, LlmError};
use crate::models::evaluation::ExperimentRow;
use crate::organizations::access::{llm_for_scope, require_permission, track_usage, CallerScope};
use crate::organizations::roles::Permission;
use crate::state::AppState;

fn default_true() -> bool {
    true
}

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RunExperimentRequest {
    #[serde(flatten)]
    pub scope: CallerScope,
    pub spec: PromptSpec,
    pub tones: Vec<Tone>,
    pub lengths: Vec<Length>,
    pub formats: Vec<Format>,
    /// Upload a markdown report to object storage.
    #[serde(default = "default_true")]
    pub export_report: bool,
}

#[derive(Debug, Serialize)]
pub struct RunExperimentResponse {
    pub experiment_id: Uuid,
    #[serde(flatten)]
    pub run: ExperimentRun,
    pub report_s3_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExperimentQuery {
    pub user_id: Uuid,
}

/// Expands the request's axes, rejecting empty or oversized matrices.
pub(crate) fn plan_cells(
    request: &RunExperimentRequest,
    max_cells: usize,
) -> Result<Vec<MatrixCell>, AppError> {
    let tones = dedup_axis(&request.tones);
    let lengths = dedup_axis(&request.lengths);
    let formats = dedup_axis(&request.formats);

    let cells = expand_matrix(&tones, &lengths, &formats);
    if cells.is_empty() {
        return Err(AppError::Validation(
            "tones, lengths and formats each need at least one value".to_string(),
        ));
    }
    if cells.len() > max_cells {
        return Err(AppError::Validation(format!(
            "matrix expands to {} cells; the maximum is {max_cells}",
            cells.len()
        )));
    }
    Ok(cells)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/experiments
///
/// Runs the spec across tone × length × format, judges every output, stores
/// the run, and optionally exports a markdown report. A failed upload is
/// logged and leaves `report_s3_key` empty.
pub async fn handle_run_experiment(
    State(state): State<AppState>,
    Json(request): Json<RunExperimentRequest>,
) -> Result<Json<RunExperimentResponse>, AppError> {
    validate_intent(&request.spec.intent)?;
    let cells = plan_cells(&request, state.config.max_matrix_cells)?;

    let llm = llm_for_scope(&state, &request.scope, Permission::RunExperiments).await?;
    let provider = request.scope.provider.unwrap_or(llm.default_provider());
    if llm.key_for(provider).is_none() {
        return Err(LlmError::MissingKey(provider).into());
    }

    info!("Running experiment with {} cells", cells.len());
    let backend: Arc<dyn CompletionBackend> = Arc::new(llm);
    let run = run_experiment(
        backend,
        &request.spec,
        &cells,
        Some(provider),
        state.config.experiment_concurrency,
    )
    .await;
    track_usage(&state, &request.scope, "experiment", run.usage.as_ref()).await;

    let experiment_id = Uuid::new_v4();
    let spec_snapshot =
        serde_json::to_value(&request.spec).map_err(|e| AppError::Internal(e.into()))?;
    let results = serde_json::to_value(&run).map_err(|e| AppError::Internal(e.into()))?;
    store::insert_experiment(
        &state.db,
        experiment_id,
        request.scope.organization_id,
        request.scope.user_id,
        &spec_snapshot,
        &results,
    )
    .await?;

    let mut report_s3_key = None;
    if request.export_report {
        let key = report_key(request.scope.organization_id, experiment_id);
        let markdown = render_report_md(experiment_id, &request.spec, &run);
        match upload_report(&state.s3, &state.config.s3_bucket, &key, markdown).await {
            Ok(()) => {
                store::set_report_key(&state.db, experiment_id, &key).await?;
                report_s3_key = Some(key);
            }
            Err(e) => warn!("Experiment {experiment_id} stored without report: {e}"),
        }
    }

    Ok(Json(RunExperimentResponse {
        experiment_id,
        run,
        report_s3_key,
    }))
}

/// GET /api/v1/experiments/:id?user_id=...
pub async fn handle_get_experiment(
    State(state): State<AppState>,
    Path(experiment_id): Path<Uuid>,
    Query(query): Query<ExperimentQuery>,
) -> Result<Json<ExperimentRow>, AppError> {
    let row = store::get_experiment(&state.db, experiment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Experiment {experiment_id} not found")))?;

    match row.organization_id {
        Some(org_id) => {
            require_permission(&state, org_id, query.user_id, Permission::ViewPrompts).await?;
        }
        None if row.user_id != query.user_id => {
            return Err(AppError::Forbidden(format!(
                "Experiment {experiment_id} belongs to another user"
            )));
        }
        None => {}
    }

    Ok(Json(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tones: &str, lengths: &str, formats: &str) -> RunExperimentRequest {
        let json = format!(
            r#"{{
                "user_id": "7f0c4a3e-5d0b-4a43-9d42-0d3e1b6f1a11",
                "spec": {{
                    "intent": "Summarize the quarter",
                    "audience": null, "context": null, "output_type": null,
                    "settings": {{"tone": "formal", "format": "paragraph", "length": "short", "reasoning": ""}}
                }},
                "tones": {tones},
                "lengths": {lengths},
                "formats": {formats}
            }}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_plan_cells_dedups_axes() {
        let req = request(
            r#"["casual","casual","formal"]"#,
            r#"["brief"]"#,
            r#"["json","table"]"#,
        );
        assert!(req.export_report);
        let cells = plan_cells(&req, 60).unwrap();
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_plan_cells_rejects_empty_axis() {
        let req = request(r#"["casual"]"#, "[]", r#"["json"]"#);
        assert!(matches!(plan_cells(&req, 60), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_plan_cells_rejects_oversized_matrix() {
        let req = request(
            r#"["professional","casual","friendly","formal","persuasive","technical","creative","empathetic"]"#,
            r#"["brief","short","medium","long","comprehensive"]"#,
            r#"["paragraph","json"]"#,
        );
        let err = plan_cells(&req, 60).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("80 cells")));
    }
}
