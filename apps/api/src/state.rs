use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Experiment report exports.
    pub s3: S3Client,
    /// Server-key client. Organization keys are overlaid per request.
    pub llm: LlmClient,
    pub config: Config,
}
