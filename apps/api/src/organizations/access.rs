//! Request-scoped access checks shared by every handler that acts on behalf
//! of an organization member.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::{LlmClient, Provider, UsageRecord};
use crate::organizations::keys::{KeyPolicy, OrganizationSettings};
use crate::organizations::roles::{has_permission, Permission, Role};
use crate::organizations::store;
use crate::state::AppState;

/// Who is calling and on whose behalf. Flattened into LLM-backed request bodies.
#[derive(Debug, Clone, Deserialize)]
pub struct CallerScope {
    pub user_id: Uuid,
    /// When set, organization keys (per key policy) are used and usage is recorded.
    pub organization_id: Option<Uuid>,
    pub provider: Option<Provider>,
}

/// Fails with `Forbidden` unless `actor_id` is a member holding `permission`.
pub async fn require_permission(
    state: &AppState,
    org_id: Uuid,
    actor_id: Uuid,
    permission: Permission,
) -> Result<Role, AppError> {
    let role = store::get_member_role(&state.db, org_id, actor_id)
        .await?
        .ok_or_else(|| AppError::Forbidden(format!("{actor_id} is not a member of {org_id}")))?;

    if !has_permission(role, permission) {
        return Err(AppError::Forbidden(format!(
            "role '{role}' lacks permission {permission:?}"
        )));
    }
    Ok(role)
}

/// Resolves the LLM client for a caller: server keys, overlaid with the
/// organization's stored keys when its key policy is `organization`.
pub async fn llm_for_scope(
    state: &AppState,
    scope: &CallerScope,
    permission: Permission,
) -> Result<LlmClient, AppError> {
    let Some(org_id) = scope.organization_id else {
        return Ok(state.llm.clone());
    };

    require_permission(state, org_id, scope.user_id, permission).await?;

    let org = store::get_organization(&state.db, org_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Organization {org_id} not found")))?;
    let settings = OrganizationSettings::from_value(&org.settings);

    if settings.key_policy == KeyPolicy::Personal {
        return Ok(state.llm.clone());
    }

    let overrides: HashMap<Provider, String> = store::list_api_keys(&state.db, org_id)
        .await?
        .into_iter()
        .filter_map(|row| match row.provider.parse::<Provider>() {
            Ok(p) => Some((p, row.api_key)),
            Err(e) => {
                warn!("Skipping stored key for {org_id}: {e}");
                None
            }
        })
        .collect();

    Ok(state.llm.with_key_overrides(overrides))
}

/// Records usage for organization-scoped calls. Failures are logged, never
/// surfaced: the LLM work already succeeded.
pub async fn track_usage(
    state: &AppState,
    scope: &CallerScope,
    operation: &str,
    record: Option<&UsageRecord>,
) {
    let (Some(org_id), Some(record)) = (scope.organization_id, record) else {
        return;
    };
    if let Err(e) = store::record_usage(&state.db, org_id, scope.user_id, operation, record).await {
        warn!("Failed to record {operation} usage for {org_id}: {e}");
    }
}
