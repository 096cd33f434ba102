//! Role hierarchy and permission table for organization members.
//!
//! Levels: owner(4) > admin(3) > member(2) > viewer(1).
//! An actor may only manage roles strictly below its own level, so an admin
//! can never promote, demote or remove another admin.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageMembers,
    ManageApiKeys,
    ManageInvites,
    ManageSettings,
    ViewUsage,
    RunExperiments,
    ViewPrompts,
    DeleteOrganization,
}

impl Role {
    /// Highest first.
    pub const ALL: [Role; 4] = [Role::Owner, Role::Admin, Role::Member, Role::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

pub fn role_level(role: Role) -> u8 {
    match role {
        Role::Owner => 4,
        Role::Admin => 3,
        Role::Member => 2,
        Role::Viewer => 1,
    }
}

/// True iff `actor` strictly outranks `target`.
pub fn can_manage_role(actor: Role, target: Role) -> bool {
    role_level(actor) > role_level(target)
}

/// Static permission table.
pub fn permissions_for(role: Role) -> &'static [Permission] {
    use Permission::*;
    match role {
        Role::Owner => &[
            ManageMembers,
            ManageApiKeys,
            ManageInvites,
            ManageSettings,
            ViewUsage,
            RunExperiments,
            ViewPrompts,
            DeleteOrganization,
        ],
        Role::Admin => &[
            ManageMembers,
            ManageApiKeys,
            ManageInvites,
            ManageSettings,
            ViewUsage,
            RunExperiments,
            ViewPrompts,
        ],
        Role::Member => &[RunExperiments, ViewPrompts, ViewUsage],
        Role::Viewer => &[ViewPrompts],
    }
}

pub fn has_permission(role: Role, permission: Permission) -> bool {
    permissions_for(role).contains(&permission)
}

/// Roles `actor` may grant or revoke, highest first.
pub fn assignable_roles(actor: Role) -> Vec<Role> {
    Role::ALL
        .into_iter()
        .filter(|&r| can_manage_role(actor, r))
        .collect()
}
