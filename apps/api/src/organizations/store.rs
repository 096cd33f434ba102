//! PostgreSQL persistence for organizations, members, invites, keys and usage.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm_client::{Provider, UsageRecord};
use crate::models::organization::{
    ApiKeyRow, InviteRow, MemberRow, OrganizationRow, UsageEventRow,
};
use crate::organizations::invites::{check_invite, InviteStatus};
use crate::organizations::roles::Role;

/// Creates an organization and makes `creator_id` its owner in one transaction.
pub async fn create_organization(
    pool: &PgPool,
    name: &str,
    creator_id: Uuid,
    creator_email: &str,
    settings: &serde_json::Value,
) -> Result<OrganizationRow, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let org = sqlx::query_as::<_, OrganizationRow>(
        r#"
        INSERT INTO organizations (id, name, settings, created_by)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(settings)
    .bind(creator_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO organization_members (organization_id, user_id, email, role) VALUES ($1, $2, $3, $4)",
    )
    .bind(org.id)
    .bind(creator_id)
    .bind(creator_email)
    .bind(Role::Owner.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!("Created organization {} owned by {creator_id}", org.id);
    Ok(org)
}

pub async fn get_organization(
    pool: &PgPool,
    org_id: Uuid,
) -> Result<Option<OrganizationRow>, sqlx::Error> {
    sqlx::query_as::<_, OrganizationRow>("SELECT * FROM organizations WHERE id = $1")
        .bind(org_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_members(pool: &PgPool, org_id: Uuid) -> Result<Vec<MemberRow>, sqlx::Error> {
    sqlx::query_as::<_, MemberRow>(
        "SELECT * FROM organization_members WHERE organization_id = $1 ORDER BY joined_at ASC",
    )
    .bind(org_id)
    .fetch_all(pool)
    .await
}

/// Returns the member's role, or `None` if the user is not a member.
pub async fn get_member_role(
    pool: &PgPool,
    org_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Role>, sqlx::Error> {
    let raw: Option<String> = sqlx::query_scalar(
        "SELECT role FROM organization_members WHERE organization_id = $1 AND user_id = $2",
    )
    .bind(org_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(raw.and_then(|r| match r.parse::<Role>() {
        Ok(role) => Some(role),
        Err(e) => {
            warn!("Member {user_id} of {org_id} has unreadable role: {e}");
            None
        }
    }))
}

pub async fn update_settings(
    pool: &PgPool,
    org_id: Uuid,
    settings: &serde_json::Value,
) -> Result<Option<OrganizationRow>, sqlx::Error> {
    sqlx::query_as::<_, OrganizationRow>(
        "UPDATE organizations SET settings = $1, updated_at = now() WHERE id = $2 RETURNING *",
    )
    .bind(settings)
    .bind(org_id)
    .fetch_optional(pool)
    .await
}

pub async fn set_member_role(
    pool: &PgPool,
    org_id: Uuid,
    user_id: Uuid,
    role: Role,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE organization_members SET role = $1 WHERE organization_id = $2 AND user_id = $3",
    )
    .bind(role.as_str())
    .bind(org_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn remove_member(pool: &PgPool, org_id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM organization_members WHERE organization_id = $1 AND user_id = $2",
    )
    .bind(org_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Members, invites, keys and usage go with it (ON DELETE CASCADE).
/// Outcomes and experiments keep their rows with the organization unset.
pub async fn delete_organization(pool: &PgPool, org_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
        .bind(org_id)
        .execute(pool)
        .await?;
    info!("Deleted organization {org_id}");
    Ok(result.rows_affected())
}

// ────────────────────────────────────────────────────────────────────────────
// Invites
// ────────────────────────────────────────────────────────────────────────────

pub struct NewInvite<'a> {
    pub code: &'a str,
    pub organization_id: Uuid,
    pub role: Role,
    pub max_uses: i32,
    pub expires_at: DateTime<Utc>,
    pub created_by: Uuid,
}

pub async fn create_invite(pool: &PgPool, invite: NewInvite<'_>) -> Result<InviteRow, sqlx::Error> {
    sqlx::query_as::<_, InviteRow>(
        r#"
        INSERT INTO invites (code, organization_id, role, max_uses, use_count, expires_at, created_by)
        VALUES ($1, $2, $3, $4, 0, $5, $6)
        RETURNING *
        "#,
    )
    .bind(invite.code)
    .bind(invite.organization_id)
    .bind(invite.role.as_str())
    .bind(invite.max_uses)
    .bind(invite.expires_at)
    .bind(invite.created_by)
    .fetch_one(pool)
    .await
}

pub async fn get_invite(pool: &PgPool, code: &str) -> Result<Option<InviteRow>, sqlx::Error> {
    sqlx::query_as::<_, InviteRow>("SELECT * FROM invites WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await
}

#[derive(Debug)]
pub enum RedeemOutcome {
    Joined(MemberRow),
    NotFound,
    AlreadyMember,
    Rejected(InviteStatus),
}

/// Consumes one use of `code` and adds the user as a member.
///
/// The counter is bumped with a conditional UPDATE so concurrent redemptions
/// can never exceed `max_uses`. If the user is already a member the
/// transaction rolls back and no use is consumed.
pub async fn redeem_invite(
    pool: &PgPool,
    code: &str,
    user_id: Uuid,
    email: &str,
) -> Result<RedeemOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let claimed = sqlx::query_as::<_, InviteRow>(
        r#"
        UPDATE invites SET use_count = use_count + 1
        WHERE code = $1 AND use_count < max_uses AND expires_at > now()
        RETURNING *
        "#,
    )
    .bind(code)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(invite) = claimed else {
        tx.rollback().await?;
        // Same clock as the refused UPDATE.
        let db_now: DateTime<Utc> = sqlx::query_scalar("SELECT now()").fetch_one(pool).await?;
        return Ok(match get_invite(pool, code).await? {
            None => RedeemOutcome::NotFound,
            Some(existing) => RedeemOutcome::Rejected(check_invite(&existing, db_now)),
        });
    };

    let member = sqlx::query_as::<_, MemberRow>(
        r#"
        INSERT INTO organization_members (organization_id, user_id, email, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (organization_id, user_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(invite.organization_id)
    .bind(user_id)
    .bind(email)
    .bind(&invite.role)
    .fetch_optional(&mut *tx)
    .await?;

    match member {
        Some(member) => {
            tx.commit().await?;
            info!(
                "User {user_id} joined {} via invite {code} ({}/{} uses)",
                invite.organization_id, invite.use_count, invite.max_uses
            );
            Ok(RedeemOutcome::Joined(member))
        }
        None => {
            tx.rollback().await?;
            Ok(RedeemOutcome::AlreadyMember)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// API keys
// ────────────────────────────────────────────────────────────────────────────

pub async fn upsert_api_key(
    pool: &PgPool,
    org_id: Uuid,
    provider: Provider,
    api_key: &str,
    manual_balance_usd: Option<f64>,
    actor_id: Uuid,
) -> Result<ApiKeyRow, sqlx::Error> {
    sqlx::query_as::<_, ApiKeyRow>(
        r#"
        INSERT INTO organization_api_keys
            (organization_id, provider, api_key, manual_balance_usd, updated_by)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (organization_id, provider) DO UPDATE
        SET api_key = EXCLUDED.api_key,
            manual_balance_usd = EXCLUDED.manual_balance_usd,
            updated_by = EXCLUDED.updated_by,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(org_id)
    .bind(provider.as_str())
    .bind(api_key)
    .bind(manual_balance_usd)
    .bind(actor_id)
    .fetch_one(pool)
    .await
}

pub async fn list_api_keys(pool: &PgPool, org_id: Uuid) -> Result<Vec<ApiKeyRow>, sqlx::Error> {
    sqlx::query_as::<_, ApiKeyRow>(
        "SELECT * FROM organization_api_keys WHERE organization_id = $1 ORDER BY provider",
    )
    .bind(org_id)
    .fetch_all(pool)
    .await
}

// ────────────────────────────────────────────────────────────────────────────
// Usage
// ────────────────────────────────────────────────────────────────────────────

/// Token counts are stored as INTEGER; larger values saturate.
fn token_column(tokens: u32) -> i32 {
    i32::try_from(tokens).unwrap_or(i32::MAX)
}

/// Appends one usage event per operation.
pub async fn record_usage(
    pool: &PgPool,
    org_id: Uuid,
    user_id: Uuid,
    operation: &str,
    record: &UsageRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO usage_events
            (id, organization_id, user_id, provider, model, operation, input_tokens, output_tokens)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .bind(user_id)
    .bind(record.provider.as_str())
    .bind(&record.model)
    .bind(operation)
    .bind(token_column(record.usage.input_tokens))
    .bind(token_column(record.usage.output_tokens))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_usage(
    pool: &PgPool,
    org_id: Uuid,
    since: DateTime<Utc>,
) -> Result<Vec<UsageEventRow>, sqlx::Error> {
    sqlx::query_as::<_, UsageEventRow>(
        "SELECT * FROM usage_events WHERE organization_id = $1 AND created_at >= $2 ORDER BY created_at ASC",
    )
    .bind(org_id)
    .bind(since)
    .fetch_all(pool)
    .await
}
