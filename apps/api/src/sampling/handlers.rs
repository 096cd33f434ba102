//! Axum route handlers for the Sampling API.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::blueprint::vocab::Tone;
use crate::errors::AppError;
use crate::organizations::access::{llm_for_scope, track_usage, CallerScope};
use crate::organizations::roles::Permission;
use crate::sampling::diversity::DiversityLevel;
use crate::sampling::verbalized::{run_verbalized_sampling, SamplingInput, VsResult};
use crate::state::AppState;

const DEFAULT_DIVERSITY: f64 = 0.5;
const DEFAULT_OUTPUT_TYPE: &str = "response";

#[derive(Debug, Deserialize)]
pub struct SamplingRequest {
    #[serde(flatten)]
    pub scope: CallerScope,
    pub prompt: String,
    #[serde(default)]
    pub tone: Tone,
    pub output_type: Option<String>,
    /// Slider position in [0, 1].
    pub diversity: Option<f64>,
}

impl SamplingRequest {
    fn input(&self) -> SamplingInput {
        SamplingInput {
            prompt: self.prompt.clone(),
            tone: self.tone,
            output_type: self
                .output_type
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_OUTPUT_TYPE)
                .to_string(),
            level: DiversityLevel::from_slider(self.diversity.unwrap_or(DEFAULT_DIVERSITY)),
        }
    }
}

/// POST /api/v1/sampling
///
/// Runs one Verbalized Sampling round. A bad model reply is reported in the
/// body (`success: false`), not as an HTTP error.
pub async fn handle_sampling(
    State(state): State<AppState>,
    Json(request): Json<SamplingRequest>,
) -> Result<Json<VsResult>, AppError> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::Validation("prompt cannot be empty".to_string()));
    }

    let llm = llm_for_scope(&state, &request.scope, Permission::RunExperiments).await?;
    let result = run_verbalized_sampling(&llm, &request.input(), request.scope.provider).await?;
    track_usage(&state, &request.scope, "sampling", result.usage.as_ref()).await;

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let json = serde_json::json!({
            "user_id": "7f0c4a3e-5d0b-4a43-9d42-0d3e1b6f1a11",
            "prompt": "Name a bakery",
            "output_type": "  "
        });
        let request: SamplingRequest = serde_json::from_value(json).unwrap();
        let input = request.input();
        assert_eq!(input.tone, Tone::Professional);
        assert_eq!(input.output_type, DEFAULT_OUTPUT_TYPE);
        assert_eq!(input.level, DiversityLevel::Diverse);
    }

    #[test]
    fn test_slider_maps_to_level() {
        let json = serde_json::json!({
            "user_id": "7f0c4a3e-5d0b-4a43-9d42-0d3e1b6f1a11",
            "prompt": "Name a bakery",
            "diversity": 0.1
        });
        let request: SamplingRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.input().level, DiversityLevel::Focused);
    }
}
