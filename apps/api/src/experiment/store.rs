//! PostgreSQL persistence for experiment runs.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::evaluation::ExperimentRow;

pub async fn insert_experiment(
    pool: &PgPool,
    id: Uuid,
    organization_id: Option<Uuid>,
    user_id: Uuid,
    spec_snapshot: &serde_json::Value,
    results: &serde_json::Value,
) -> Result<ExperimentRow, sqlx::Error> {
    sqlx::query_as::<_, ExperimentRow>(
        r#"
        INSERT INTO experiments (id, organization_id, user_id, spec_snapshot, results)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .bind(user_id)
    .bind(spec_snapshot)
    .bind(results)
    .fetch_one(pool)
    .await
}

pub async fn set_report_key(pool: &PgPool, id: Uuid, key: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE experiments SET report_s3_key = $2 WHERE id = $1")
        .bind(id)
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_experiment(pool: &PgPool, id: Uuid) -> Result<Option<ExperimentRow>, sqlx::Error> {
    sqlx::query_as::<_, ExperimentRow>("SELECT * FROM experiments WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}
