use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only. Never UPDATE an outcome row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutcomeRow {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,
    pub user_id: Uuid,
    pub rating: i16,
    pub category: String,
    pub edits_needed: bool,
    pub feedback: Option<String>,
    pub spec_snapshot: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExperimentRow {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,
    pub user_id: Uuid,
    pub spec_snapshot: Value,
    pub results: Value,
    pub report_s3_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
