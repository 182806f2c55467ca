/// Invitation workflow: invite semantics and their authorization, layered on
/// the membership engine. Every precondition is checked before the single
/// mutating call, so a failed operation leaves the store untouched.

use crate::auth;
use crate::db::models::{Group, InvitationResponse, Membership, MembershipStatus};
use crate::db::{Database, DbPool};
use crate::error::ServiceError;
use crate::membership::MembershipEngine;

/// Invitation operations
pub struct InvitationService;

impl InvitationService {
    /// Create a PENDING invitation for `invitee_id` to join `group_id`.
    ///
    /// Check order matters and is part of the contract: the inviter's own
    /// membership is validated before anything about the invitee, and the
    /// "already a member" conflict is reported before "already pending" so
    /// the error matches what the caller expects.
    pub async fn create_invitation(
        pool: &DbPool,
        group_id: i64,
        inviter_token: &str,
        invitee_id: i64,
    ) -> Result<Membership, ServiceError> {
        let inviter = auth::resolve_user(pool, inviter_token).await?;

        let group = Database::get_group(pool, group_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("group {} was not found", group_id)))?;

        if !MembershipEngine::is_active_member(pool, inviter.id, group.id).await? {
            return Err(ServiceError::Forbidden(format!(
                "user {} is not a member of group {}",
                inviter.id, group.id
            )));
        }

        let invitee = Database::get_user_by_id(pool, invitee_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {} was not found", invitee_id)))?;

        if MembershipEngine::is_active_member(pool, invitee.id, group.id).await? {
            return Err(ServiceError::Conflict(format!(
                "user {} is already a member of group {}",
                invitee.id, group.id
            )));
        }

        // A leftover row may exist: PENDING blocks a duplicate invite, ACTIVE
        // is caught again defensively, REJECTED is overwritten by the upsert
        // below (an explicit reissue).
        if let Some(existing) =
            MembershipEngine::find_by_user_and_group(pool, invitee.id, group.id).await?
        {
            match existing.status {
                MembershipStatus::Pending => {
                    return Err(ServiceError::Conflict(
                        "invitation already pending".to_string(),
                    ));
                }
                MembershipStatus::Active => {
                    return Err(ServiceError::Conflict(format!(
                        "user {} is already a member of group {}",
                        invitee.id, group.id
                    )));
                }
                MembershipStatus::Rejected => {}
            }
        }

        let membership = MembershipEngine::upsert(
            pool,
            invitee.id,
            group.id,
            MembershipStatus::Pending,
            inviter.id,
        )
        .await?;

        log::info!(
            "User {} invited user {} to group {}",
            inviter.id,
            invitee.id,
            group.id
        );

        Ok(membership)
    }

    /// Pending invitations addressed to `user_id`. Only the user themselves
    /// may list them.
    pub async fn list_for_user(
        pool: &DbPool,
        user_id: i64,
        token: &str,
    ) -> Result<Vec<InvitationResponse>, ServiceError> {
        let caller = auth::resolve_user(pool, token).await?;
        if caller.id != user_id {
            return Err(ServiceError::Forbidden(
                "you can only view your own invitations".to_string(),
            ));
        }

        let pending = MembershipEngine::pending_for_user(pool, user_id).await?;
        Self::enrich(pool, pending).await
    }

    /// Pending invitations for a group. The membership check comes first so a
    /// non-member gets Forbidden whether or not the group exists.
    pub async fn list_for_group(
        pool: &DbPool,
        group_id: i64,
        token: &str,
    ) -> Result<Vec<InvitationResponse>, ServiceError> {
        let caller = auth::resolve_user(pool, token).await?;
        if !MembershipEngine::is_active_member(pool, caller.id, group_id).await? {
            return Err(ServiceError::Forbidden(format!(
                "user {} is not a member of group {}",
                caller.id, group_id
            )));
        }

        let pending = MembershipEngine::pending_for_group(pool, group_id).await?;
        Self::enrich(pool, pending).await
    }

    /// Accept an invitation. Acceptance is not delegable: only the invited
    /// user may accept, group admins included.
    pub async fn accept(
        pool: &DbPool,
        invitation_id: i64,
        token: &str,
    ) -> Result<Group, ServiceError> {
        let caller = auth::resolve_user(pool, token).await?;

        let membership = MembershipEngine::find_by_id(pool, invitation_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("invitation {} was not found", invitation_id))
            })?;

        if membership.user_id != caller.id {
            return Err(ServiceError::Forbidden(format!(
                "this invitation does not belong to user {}",
                caller.id
            )));
        }

        MembershipEngine::set_status(pool, membership.id, MembershipStatus::Active).await?;
        log::info!(
            "User {} accepted invitation {} to group {}",
            caller.id,
            invitation_id,
            membership.group_id
        );

        let group = Database::get_group(pool, membership.group_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("group {} was not found", membership.group_id))
            })?;

        Ok(group)
    }

    /// Reject an invitation. Same ownership check as accept; the row is
    /// deleted, so a later invite for the same pair starts fresh.
    pub async fn reject(
        pool: &DbPool,
        invitation_id: i64,
        token: &str,
    ) -> Result<Membership, ServiceError> {
        let caller = auth::resolve_user(pool, token).await?;

        let membership = MembershipEngine::find_by_id(pool, invitation_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("invitation {} was not found", invitation_id))
            })?;

        if membership.user_id != caller.id {
            return Err(ServiceError::Forbidden(format!(
                "this invitation does not belong to user {}",
                caller.id
            )));
        }

        MembershipEngine::remove(pool, membership.user_id, membership.group_id).await?;
        log::info!(
            "User {} rejected invitation {} to group {}",
            caller.id,
            invitation_id,
            membership.group_id
        );

        Ok(membership)
    }

    async fn enrich(
        pool: &DbPool,
        memberships: Vec<Membership>,
    ) -> Result<Vec<InvitationResponse>, ServiceError> {
        let mut invitations = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let group_name = Database::get_group(pool, membership.group_id)
                .await?
                .map(|g| g.name)
                .unwrap_or_default();
            let inviter_username = Database::get_user_by_id(pool, membership.invited_by)
                .await?
                .map(|u| u.username)
                .unwrap_or_default();
            invitations.push(InvitationResponse {
                id: membership.id,
                user_id: membership.user_id,
                group_id: membership.group_id,
                group_name,
                status: membership.status,
                invited_by: membership.invited_by,
                inviter_username,
                invited_at: membership.invited_at,
            });
        }
        Ok(invitations)
    }
}
