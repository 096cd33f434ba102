//! Axum route handlers for the Organization API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::balance::BalanceReport;
use crate::llm_client::Provider;
use crate::models::organization::{InviteRow, MemberRow, OrganizationRow};
use crate::organizations::access::require_permission;
use crate::organizations::invites::{
    expiry_from, generate_code, normalize_code, rejection_message,
};
use crate::organizations::keys::{evaluate_alerts, mask_key, BalanceAlert, OrganizationSettings};
use crate::organizations::roles::{assignable_roles, can_manage_role, Permission, Role};
use crate::organizations::store::{self, NewInvite, RedeemOutcome};
use crate::organizations::usage::{summarize_usage, UsageSummary};
use crate::state::AppState;

const MAX_INVITE_USES: i32 = 500;
const DEFAULT_USAGE_WINDOW_DAYS: i64 = 30;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub actor_id: Uuid,
    pub actor_email: String,
    #[serde(default)]
    pub settings: OrganizationSettings,
}

#[derive(Debug, Serialize)]
pub struct OrganizationDetail {
    pub organization: OrganizationRow,
    pub settings: OrganizationSettings,
    pub members: Vec<MemberRow>,
    /// Roles the requesting actor may grant.
    pub assignable_roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub actor_id: Uuid,
    pub settings: OrganizationSettings,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub actor_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    pub actor_id: Uuid,
    pub role: Role,
    pub max_uses: Option<i32>,
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemInviteRequest {
    pub code: String,
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PutApiKeyRequest {
    pub actor_id: Uuid,
    pub api_key: String,
    /// Required for providers without a balance endpoint if alerts are wanted.
    pub manual_balance_usd: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyView {
    pub provider: String,
    pub masked_key: String,
    pub manual_balance_usd: Option<f64>,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub actor_id: Uuid,
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub window_days: i64,
    pub usage: UsageSummary,
    pub balances: Vec<BalanceReport>,
    pub alerts: Vec<BalanceAlert>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/organizations
pub async fn handle_create_organization(
    State(state): State<AppState>,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<OrganizationDetail>), AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let settings_value = serde_json::to_value(&req.settings)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize settings: {e}")))?;
    let organization =
        store::create_organization(&state.db, name, req.actor_id, &req.actor_email, &settings_value)
            .await?;
    let members = store::list_members(&state.db, organization.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrganizationDetail {
            organization,
            settings: req.settings,
            members,
            assignable_roles: assignable_roles(Role::Owner),
        }),
    ))
}

/// GET /api/v1/organizations/:id
pub async fn handle_get_organization(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(q): Query<ActorQuery>,
) -> Result<Json<OrganizationDetail>, AppError> {
    let role = require_permission(&state, org_id, q.actor_id, Permission::ViewPrompts).await?;
    let organization = load_organization(&state, org_id).await?;
    let members = store::list_members(&state.db, org_id).await?;

    Ok(Json(OrganizationDetail {
        settings: OrganizationSettings::from_value(&organization.settings),
        organization,
        members,
        assignable_roles: assignable_roles(role),
    }))
}

/// DELETE /api/v1/organizations/:id
pub async fn handle_delete_organization(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(q): Query<ActorQuery>,
) -> Result<StatusCode, AppError> {
    require_permission(&state, org_id, q.actor_id, Permission::DeleteOrganization).await?;
    if store::delete_organization(&state.db, org_id).await? == 0 {
        return Err(AppError::NotFound(format!("Organization {org_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/organizations/:id/settings
pub async fn handle_update_settings(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<OrganizationSettings>, AppError> {
    require_permission(&state, org_id, req.actor_id, Permission::ManageSettings).await?;

    if let Some((provider, threshold)) = req
        .settings
        .alert_thresholds
        .iter()
        .find(|(_, t)| !t.is_finite() || **t < 0.0)
    {
        return Err(AppError::Validation(format!(
            "alert threshold for {provider} must be a non-negative number, got {threshold}"
        )));
    }

    let value = serde_json::to_value(&req.settings)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize settings: {e}")))?;
    store::update_settings(&state.db, org_id, &value)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Organization {org_id} not found")))?;

    info!("Settings updated for {org_id} by {}", req.actor_id);
    Ok(Json(req.settings))
}

/// PATCH /api/v1/organizations/:id/members/:user_id
///
/// The actor must outrank both the member's current role and the new role.
pub async fn handle_change_member_role(
    State(state): State<AppState>,
    Path((org_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<StatusCode, AppError> {
    let actor_role =
        require_permission(&state, org_id, req.actor_id, Permission::ManageMembers).await?;
    if req.actor_id == user_id {
        return Err(AppError::Forbidden("members cannot change their own role".to_string()));
    }

    let current = store::get_member_role(&state.db, org_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{user_id} is not a member of {org_id}")))?;

    ensure_can_manage(actor_role, current)?;
    ensure_can_manage(actor_role, req.role)?;

    store::set_member_role(&state.db, org_id, user_id, req.role).await?;
    info!("{} changed {user_id} in {org_id}: {current} -> {}", req.actor_id, req.role);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/organizations/:id/members/:user_id
pub async fn handle_remove_member(
    State(state): State<AppState>,
    Path((org_id, user_id)): Path<(Uuid, Uuid)>,
    Query(q): Query<ActorQuery>,
) -> Result<StatusCode, AppError> {
    let actor_role =
        require_permission(&state, org_id, q.actor_id, Permission::ManageMembers).await?;

    let current = store::get_member_role(&state.db, org_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{user_id} is not a member of {org_id}")))?;
    ensure_can_manage(actor_role, current)?;

    store::remove_member(&state.db, org_id, user_id).await?;
    info!("{} removed {user_id} ({current}) from {org_id}", q.actor_id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/organizations/:id/invites
pub async fn handle_create_invite(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(req): Json<CreateInviteRequest>,
) -> Result<(StatusCode, Json<InviteRow>), AppError> {
    let actor_role =
        require_permission(&state, org_id, req.actor_id, Permission::ManageInvites).await?;
    ensure_can_manage(actor_role, req.role)?;

    let max_uses = req.max_uses.unwrap_or(1);
    if !(1..=MAX_INVITE_USES).contains(&max_uses) {
        return Err(AppError::Validation(format!(
            "max_uses must be between 1 and {MAX_INVITE_USES}"
        )));
    }

    let code = generate_code();
    let invite = store::create_invite(
        &state.db,
        NewInvite {
            code: &code,
            organization_id: org_id,
            role: req.role,
            max_uses,
            expires_at: expiry_from(Utc::now(), req.expires_in_days),
            created_by: req.actor_id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(invite)))
}

/// POST /api/v1/invites/redeem
pub async fn handle_redeem_invite(
    State(state): State<AppState>,
    Json(req): Json<RedeemInviteRequest>,
) -> Result<Json<MemberRow>, AppError> {
    let code = normalize_code(&req.code);
    if code.is_empty() {
        return Err(AppError::Validation("code cannot be empty".to_string()));
    }

    match store::redeem_invite(&state.db, &code, req.user_id, &req.email).await? {
        RedeemOutcome::Joined(member) => Ok(Json(member)),
        RedeemOutcome::NotFound => Err(AppError::NotFound(format!("Invite {code} not found"))),
        RedeemOutcome::AlreadyMember => Err(AppError::UnprocessableEntity(
            "user is already a member of this organization".to_string(),
        )),
        RedeemOutcome::Rejected(status) => {
            Err(AppError::UnprocessableEntity(rejection_message(&code, status)))
        }
    }
}

/// PUT /api/v1/organizations/:id/api-keys/:provider
pub async fn handle_put_api_key(
    State(state): State<AppState>,
    Path((org_id, provider)): Path<(Uuid, String)>,
    Json(req): Json<PutApiKeyRequest>,
) -> Result<Json<ApiKeyView>, AppError> {
    require_permission(&state, org_id, req.actor_id, Permission::ManageApiKeys).await?;
    let provider = provider.parse::<Provider>().map_err(AppError::Validation)?;

    let api_key = req.api_key.trim();
    if api_key.is_empty() {
        return Err(AppError::Validation("api_key cannot be empty".to_string()));
    }
    if req.manual_balance_usd.is_some_and(|b| !b.is_finite() || b < 0.0) {
        return Err(AppError::Validation(
            "manual_balance_usd must be a non-negative number".to_string(),
        ));
    }

    let row = store::upsert_api_key(
        &state.db,
        org_id,
        provider,
        api_key,
        req.manual_balance_usd,
        req.actor_id,
    )
    .await?;
    info!("{} stored {provider} key for {org_id}", req.actor_id);

    Ok(Json(ApiKeyView {
        masked_key: mask_key(&row.api_key),
        provider: row.provider,
        manual_balance_usd: row.manual_balance_usd,
        updated_by: row.updated_by,
        updated_at: row.updated_at,
    }))
}

/// GET /api/v1/organizations/:id/api-keys
pub async fn handle_list_api_keys(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(q): Query<ActorQuery>,
) -> Result<Json<Vec<ApiKeyView>>, AppError> {
    require_permission(&state, org_id, q.actor_id, Permission::ManageApiKeys).await?;
    let rows = store::list_api_keys(&state.db, org_id).await?;

    Ok(Json(
        rows.into_iter()
            .map(|row| ApiKeyView {
                masked_key: mask_key(&row.api_key),
                provider: row.provider,
                manual_balance_usd: row.manual_balance_usd,
                updated_by: row.updated_by,
                updated_at: row.updated_at,
            })
            .collect(),
    ))
}

/// GET /api/v1/organizations/:id/usage
///
/// Usage summary over the window plus current balances and threshold alerts.
pub async fn handle_usage(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(q): Query<UsageQuery>,
) -> Result<Json<UsageResponse>, AppError> {
    require_permission(&state, org_id, q.actor_id, Permission::ViewUsage).await?;
    let organization = load_organization(&state, org_id).await?;
    let settings = OrganizationSettings::from_value(&organization.settings);

    let window_days = q.days.unwrap_or(DEFAULT_USAGE_WINDOW_DAYS).clamp(1, 365);
    let events = store::list_usage(&state.db, org_id, Utc::now() - Duration::days(window_days)).await?;

    let key_rows = store::list_api_keys(&state.db, org_id).await?;
    let mut balances = Vec::with_capacity(key_rows.len());
    for row in key_rows {
        let Ok(provider) = row.provider.parse::<Provider>() else {
            continue;
        };
        let client = state
            .llm
            .with_key_overrides([(provider, row.api_key.clone())].into_iter().collect());
        balances.push(client.resolve_balance(provider, row.manual_balance_usd).await);
    }

    let alerts = evaluate_alerts(&balances, &settings.alert_thresholds);

    Ok(Json(UsageResponse {
        window_days,
        usage: summarize_usage(&events),
        balances,
        alerts,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn load_organization(state: &AppState, org_id: Uuid) -> Result<OrganizationRow, AppError> {
    store::get_organization(&state.db, org_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Organization {org_id} not found")))
}

fn ensure_can_manage(actor: Role, target: Role) -> Result<(), AppError> {
    if can_manage_role(actor, target) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role '{actor}' cannot manage role '{target}'"
        )))
    }
}
