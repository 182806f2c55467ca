/// Group operations built on the membership engine: creation (the creator
/// becomes the admin and first active member) and member removal.

use crate::auth;
use crate::db::models::{Group, GroupResponse, MemberResponse, MembershipStatus};
use crate::db::{Database, DbPool};
use crate::error::ServiceError;
use crate::membership::MembershipEngine;

/// Group operations
pub struct GroupService;

impl GroupService {
    /// Create a group. The creator is recorded as `admin_id` and immediately
    /// gets an ACTIVE membership, invited by themselves.
    pub async fn create_group(
        pool: &DbPool,
        name: &str,
        admin_token: &str,
    ) -> Result<Group, ServiceError> {
        let admin = auth::resolve_user(pool, admin_token).await?;
        let group = Database::create_group(pool, name, admin.id).await?;

        MembershipEngine::upsert(pool, admin.id, group.id, MembershipStatus::Active, admin.id)
            .await?;

        log::info!("User {} created group {} ({})", admin.id, group.id, name);
        Ok(group)
    }

    /// List all groups. Requires authentication.
    pub async fn get_groups(pool: &DbPool, token: &str) -> Result<Vec<Group>, ServiceError> {
        auth::resolve_user(pool, token).await?;
        Ok(Database::get_groups(pool).await?)
    }

    /// Group details with its active member list. Requires authentication.
    pub async fn get_group(
        pool: &DbPool,
        group_id: i64,
        token: &str,
    ) -> Result<GroupResponse, ServiceError> {
        auth::resolve_user(pool, token).await?;

        let group = Database::get_group(pool, group_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("group {} was not found", group_id)))?;

        let active_members = MembershipEngine::active_members(pool, group.id)
            .await?
            .into_iter()
            .map(|u| MemberResponse {
                id: u.id,
                username: u.username,
            })
            .collect();

        Ok(GroupResponse {
            id: group.id,
            name: group.name,
            admin_id: group.admin_id,
            created_at: group.created_at,
            active_members,
        })
    }

    /// Groups the user is an active member of. Only the user themselves may list them.
    pub async fn groups_for_user(
        pool: &DbPool,
        user_id: i64,
        token: &str,
    ) -> Result<Vec<Group>, ServiceError> {
        let caller = auth::resolve_user(pool, token).await?;
        if caller.id != user_id {
            return Err(ServiceError::Forbidden(
                "you can only view your own groups".to_string(),
            ));
        }

        Ok(MembershipEngine::active_groups(pool, user_id).await?)
    }

    /// Remove a member from a group. Allowed for the member themselves
    /// (leave) and for the group admin (removal). The engine's remove is
    /// idempotent, so removing an already-absent member succeeds quietly.
    pub async fn remove_member(
        pool: &DbPool,
        group_id: i64,
        caller_token: &str,
        user_id: i64,
    ) -> Result<(), ServiceError> {
        let caller = auth::resolve_user(pool, caller_token).await?;

        let group = Database::get_group(pool, group_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("group {} was not found", group_id)))?;

        if caller.id != user_id && caller.id != group.admin_id {
            return Err(ServiceError::Forbidden(format!(
                "user {} may not remove user {} from group {}",
                caller.id, user_id, group_id
            )));
        }

        MembershipEngine::remove(pool, user_id, group_id).await?;
        log::info!(
            "User {} removed user {} from group {}",
            caller.id,
            user_id,
            group_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_create_group_makes_creator_active_member() {
        let pool = create_test_pool();
        let alice = Database::register_user(&pool, "alice")
            .await
            .expect("Failed to register");

        let group = GroupService::create_group(&pool, "study", &alice.token)
            .await
            .expect("Failed to create group");

        assert_eq!(group.admin_id, alice.id);
        assert!(
            MembershipEngine::is_active_member(&pool, alice.id, group.id)
                .await
                .expect("Query failed")
        );

        let membership = MembershipEngine::find_by_user_and_group(&pool, alice.id, group.id)
            .await
            .expect("Query failed")
            .expect("Membership missing");
        assert_eq!(membership.invited_by, alice.id);
    }

    #[tokio::test]
    async fn test_get_groups_requires_auth() {
        let pool = create_test_pool();
        let alice = Database::register_user(&pool, "alice")
            .await
            .expect("Failed to register");
        GroupService::create_group(&pool, "study", &alice.token)
            .await
            .expect("Failed to create group");
        GroupService::create_group(&pool, "reading", &alice.token)
            .await
            .expect("Failed to create group");

        let groups = GroupService::get_groups(&pool, &alice.token)
            .await
            .expect("Listing failed");
        assert_eq!(groups.len(), 2);

        let anonymous = GroupService::get_groups(&pool, "bogus").await;
        assert!(matches!(anonymous, Err(ServiceError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_get_group_includes_active_members() {
        let pool = create_test_pool();
        let alice = Database::register_user(&pool, "alice")
            .await
            .expect("Failed to register");
        let group = GroupService::create_group(&pool, "study", &alice.token)
            .await
            .expect("Failed to create group");

        let response = GroupService::get_group(&pool, group.id, &alice.token)
            .await
            .expect("Get group failed");
        assert_eq!(response.active_members.len(), 1);
        assert_eq!(response.active_members[0].username, "alice");
    }

    #[tokio::test]
    async fn test_member_can_leave() {
        let pool = create_test_pool();
        let alice = Database::register_user(&pool, "alice")
            .await
            .expect("Failed to register");
        let bob = Database::register_user(&pool, "bob")
            .await
            .expect("Failed to register");
        let group = GroupService::create_group(&pool, "study", &alice.token)
            .await
            .expect("Failed to create group");
        MembershipEngine::upsert(&pool, bob.id, group.id, MembershipStatus::Active, alice.id)
            .await
            .expect("Upsert failed");

        GroupService::remove_member(&pool, group.id, &bob.token, bob.id)
            .await
            .expect("Leave failed");

        assert!(!MembershipEngine::is_active_member(&pool, bob.id, group.id)
            .await
            .expect("Query failed"));
    }

    #[tokio::test]
    async fn test_admin_can_remove_other_member() {
        let pool = create_test_pool();
        let alice = Database::register_user(&pool, "alice")
            .await
            .expect("Failed to register");
        let bob = Database::register_user(&pool, "bob")
            .await
            .expect("Failed to register");
        let group = GroupService::create_group(&pool, "study", &alice.token)
            .await
            .expect("Failed to create group");
        MembershipEngine::upsert(&pool, bob.id, group.id, MembershipStatus::Active, alice.id)
            .await
            .expect("Upsert failed");

        GroupService::remove_member(&pool, group.id, &alice.token, bob.id)
            .await
            .expect("Removal failed");
        assert!(!MembershipEngine::is_active_member(&pool, bob.id, group.id)
            .await
            .expect("Query failed"));
    }

    #[tokio::test]
    async fn test_non_admin_cannot_remove_others() {
        let pool = create_test_pool();
        let alice = Database::register_user(&pool, "alice")
            .await
            .expect("Failed to register");
        let bob = Database::register_user(&pool, "bob")
            .await
            .expect("Failed to register");
        let group = GroupService::create_group(&pool, "study", &alice.token)
            .await
            .expect("Failed to create group");
        MembershipEngine::upsert(&pool, bob.id, group.id, MembershipStatus::Active, alice.id)
            .await
            .expect("Upsert failed");

        let result = GroupService::remove_member(&pool, group.id, &bob.token, alice.id).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_groups_for_user_is_self_only() {
        let pool = create_test_pool();
        let alice = Database::register_user(&pool, "alice")
            .await
            .expect("Failed to register");
        let bob = Database::register_user(&pool, "bob")
            .await
            .expect("Failed to register");
        let group = GroupService::create_group(&pool, "study", &alice.token)
            .await
            .expect("Failed to create group");

        let own = GroupService::groups_for_user(&pool, alice.id, &alice.token)
            .await
            .expect("Listing failed");
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, group.id);

        let foreign = GroupService::groups_for_user(&pool, alice.id, &bob.token).await;
        assert!(matches!(foreign, Err(ServiceError::Forbidden(_))));
    }
}
