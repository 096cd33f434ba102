//! PostgreSQL persistence for outcome records. Append-only.

use sqlx::PgPool;
use uuid::Uuid;

use crate::evaluation::outcomes::ValidOutcome;
use crate::models::evaluation::OutcomeRow;

pub async fn insert_outcome(
    pool: &PgPool,
    organization_id: Option<Uuid>,
    user_id: Uuid,
    outcome: &ValidOutcome,
    spec_snapshot: &serde_json::Value,
) -> Result<OutcomeRow, sqlx::Error> {
    sqlx::query_as::<_, OutcomeRow>(
        r#"
        INSERT INTO outcomes
            (id, organization_id, user_id, rating, category, edits_needed, feedback, spec_snapshot)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(organization_id)
    .bind(user_id)
    .bind(outcome.rating)
    .bind(outcome.category.as_str())
    .bind(outcome.edits_needed)
    .bind(outcome.feedback.as_deref())
    .bind(spec_snapshot)
    .fetch_one(pool)
    .await
}

/// Outcomes for an organization when `organization_id` is set, otherwise the
/// user's own outcomes outside any organization.
pub async fn list_outcomes(
    pool: &PgPool,
    organization_id: Option<Uuid>,
    user_id: Uuid,
) -> Result<Vec<OutcomeRow>, sqlx::Error> {
    match organization_id {
        Some(org_id) => {
            sqlx::query_as::<_, OutcomeRow>(
                "SELECT * FROM outcomes WHERE organization_id = $1 ORDER BY created_at DESC",
            )
            .bind(org_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, OutcomeRow>(
                "SELECT * FROM outcomes WHERE user_id = $1 AND organization_id IS NULL ORDER BY created_at DESC",
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
        }
    }
}
