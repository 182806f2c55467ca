/// Data models for database operations.
/// Represents users, groups, memberships, and the request/response DTOs.
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a user's relationship to a group.
///
/// `Pending` is an open invitation, `Active` is the sole definition of
/// "is a member", `Rejected` marks a declined invitation. Rejecting an
/// invitation deletes the row, so `Rejected` rows only exist when written
/// explicitly; a later invite overwrites them back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MembershipStatus {
    Pending,
    Active,
    Rejected,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "PENDING",
            MembershipStatus::Active => "ACTIVE",
            MembershipStatus::Rejected => "REJECTED",
        }
    }
}

impl ToSql for MembershipStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MembershipStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "PENDING" => Ok(MembershipStatus::Pending),
            "ACTIVE" => Ok(MembershipStatus::Active),
            "REJECTED" => Ok(MembershipStatus::Rejected),
            other => Err(FromSqlError::Other(
                format!("unknown membership status: {}", other).into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Opaque session credential issued at registration.
    #[serde(skip_serializing)]
    pub token: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub admin_id: i64,
    pub created_at: String,
}

/// Join entity between users and groups. At most one row exists per
/// (user_id, group_id) pair; the schema enforces this with a UNIQUE key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub id: i64,
    pub user_id: i64,
    pub group_id: i64,
    pub status: MembershipStatus,
    pub invited_by: i64,
    pub invited_at: String,
}

// Request/Response DTOs

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterUserResponse {
    pub id: i64,
    pub username: String,
    pub token: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateInvitationRequest {
    pub invitee_id: i64,
}

/// Pending invitation enriched with display names for listing endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvitationResponse {
    pub id: i64,
    pub user_id: i64,
    pub group_id: i64,
    pub group_name: String,
    pub status: MembershipStatus,
    pub invited_by: i64,
    pub inviter_username: String,
    pub invited_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupResponse {
    pub id: i64,
    pub name: String,
    pub admin_id: i64,
    pub created_at: String,
    pub active_members: Vec<MemberResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemberResponse {
    pub id: i64,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_strings() {
        assert_eq!(MembershipStatus::Pending.as_str(), "PENDING");
        assert_eq!(MembershipStatus::Active.as_str(), "ACTIVE");
        assert_eq!(MembershipStatus::Rejected.as_str(), "REJECTED");
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&MembershipStatus::Pending).expect("Serialization failed");
        assert_eq!(json, "\"PENDING\"");
        let back: MembershipStatus =
            serde_json::from_str("\"ACTIVE\"").expect("Deserialization failed");
        assert_eq!(back, MembershipStatus::Active);
    }

    #[test]
    fn test_user_token_not_serialized() {
        let user = User {
            id: 1,
            username: "alice".to_string(),
            token: "secret-token".to_string(),
            created_at: "2025-10-20T10:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&user).expect("Serialization failed");
        assert!(!json.contains("secret-token"));
        assert!(json.contains("alice"));
    }

    #[test]
    fn test_invitation_response_serialization() {
        let invitation = InvitationResponse {
            id: 7,
            user_id: 2,
            group_id: 3,
            group_name: "algorithms".to_string(),
            status: MembershipStatus::Pending,
            invited_by: 1,
            inviter_username: "alice".to_string(),
            invited_at: "2025-10-20T10:00:00Z".to_string(),
        };

        let json = serde_json::to_string(&invitation).expect("Serialization failed");
        let deserialized: InvitationResponse =
            serde_json::from_str(&json).expect("Deserialization failed");

        assert_eq!(deserialized.group_name, "algorithms");
        assert_eq!(deserialized.status, MembershipStatus::Pending);
    }
}
