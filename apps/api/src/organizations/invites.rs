//! Invite codes: generation and validity checks.
//! Redemption itself is a single conditional UPDATE in `store::redeem_invite`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::organization::InviteRow;

pub const CODE_LENGTH: usize = 8;
pub const DEFAULT_EXPIRY_DAYS: i64 = 7;
pub const MAX_EXPIRY_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Valid,
    Expired,
    Exhausted,
}

/// 8 uppercase alphanumeric characters taken from a v4 UUID.
pub fn generate_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(CODE_LENGTH)
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Normalizes user-typed codes (whitespace, case).
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

pub fn check_invite(invite: &InviteRow, now: DateTime<Utc>) -> InviteStatus {
    if invite.expires_at <= now {
        InviteStatus::Expired
    } else if invite.use_count >= invite.max_uses {
        InviteStatus::Exhausted
    } else {
        InviteStatus::Valid
    }
}

/// Message for a redemption the database refused. `Valid` only shows up when
/// the invite changed between the refused claim and the re-read.
pub fn rejection_message(code: &str, status: InviteStatus) -> String {
    match status {
        InviteStatus::Expired => format!("Invite {code} has expired"),
        InviteStatus::Exhausted => format!("Invite {code} has no uses remaining"),
        InviteStatus::Valid => format!("Invite {code} could not be redeemed, please retry"),
    }
}

/// Expiry timestamp for an invite created at `now`.
/// `None` → default; values are clamped to 1..=MAX_EXPIRY_DAYS.
pub fn expiry_from(now: DateTime<Utc>, days: Option<i64>) -> DateTime<Utc> {
    let days = days
        .unwrap_or(DEFAULT_EXPIRY_DAYS)
        .clamp(1, MAX_EXPIRY_DAYS);
    now + Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organizations::roles::Role;

    fn invite(max_uses: i32, use_count: i32, expires_in_hours: i64) -> InviteRow {
        let now = Utc::now();
        InviteRow {
            code: "ABCD1234".to_string(),
            organization_id: Uuid::new_v4(),
            role: Role::Member.as_str().to_string(),
            max_uses,
            use_count,
            expires_at: now + Duration::hours(expires_in_hours),
            created_by: Uuid::new_v4(),
            created_at: now,
        }
    }

    #[test]
    fn test_generated_code_shape() {
        let code = generate_code();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generated_codes_differ() {
        assert_ne!(generate_code(), generate_code());
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  abcd1234 \n"), "ABCD1234");
    }

    #[test]
    fn test_valid_invite() {
        assert_eq!(check_invite(&invite(5, 2, 24), Utc::now()), InviteStatus::Valid);
    }

    #[test]
    fn test_exhausted_invite() {
        assert_eq!(check_invite(&invite(3, 3, 24), Utc::now()), InviteStatus::Exhausted);
    }

    #[test]
    fn test_expired_wins_over_exhausted() {
        assert_eq!(check_invite(&invite(1, 1, -1), Utc::now()), InviteStatus::Expired);
    }

    #[test]
    fn test_rejection_messages_are_distinct() {
        assert!(rejection_message("AB12CD34", InviteStatus::Expired).contains("expired"));
        assert!(rejection_message("AB12CD34", InviteStatus::Exhausted).contains("no uses remaining"));
        let raced = rejection_message("AB12CD34", InviteStatus::Valid);
        assert!(raced.contains("retry"));
        assert!(!raced.contains("no uses remaining"));
    }

    #[test]
    fn test_expiry_clamped() {
        let now = Utc::now();
        assert_eq!(expiry_from(now, None), now + Duration::days(DEFAULT_EXPIRY_DAYS));
        assert_eq!(expiry_from(now, Some(0)), now + Duration::days(1));
        assert_eq!(expiry_from(now, Some(1000)), now + Duration::days(MAX_EXPIRY_DAYS));
    }
}
