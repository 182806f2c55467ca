/// REST API handlers for HTTP endpoints.
/// Handles user registration, groups, memberships, and invitations.

use crate::auth;
use crate::db::{models::*, Database, DbPool};
use crate::error::ServiceError;
use crate::groups::GroupService;
use crate::handlers::websocket::WsServer;
use crate::invitations::InvitationService;
use crate::membership::MembershipEngine;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

/// Register a new user and issue their session token
/// POST /users
pub async fn register_user(
    pool: web::Data<DbPool>,
    req: web::Json<RegisterUserRequest>,
) -> Result<HttpResponse, ServiceError> {
    match Database::register_user(&pool, &req.username).await {
        Ok(user) => {
            let response = RegisterUserResponse {
                id: user.id,
                username: user.username,
                token: user.token,
                created_at: user.created_at,
            };
            Ok(HttpResponse::Created().json(response))
        }
        Err(e) if e.to_string().contains("UNIQUE constraint failed") => Err(
            ServiceError::Conflict(format!("username {} already exists", req.username)),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Create a group; the caller becomes its admin and first active member
/// POST /groups
pub async fn create_group(
    pool: web::Data<DbPool>,
    http_req: HttpRequest,
    req: web::Json<CreateGroupRequest>,
) -> Result<HttpResponse, ServiceError> {
    let token = auth::token_from_request(&http_req)?;
    let group = GroupService::create_group(&pool, &req.name, &token).await?;
    Ok(HttpResponse::Created().json(group))
}

/// List all groups
/// GET /groups
pub async fn list_groups(
    pool: web::Data<DbPool>,
    http_req: HttpRequest,
) -> Result<HttpResponse, ServiceError> {
    let token = auth::token_from_request(&http_req)?;
    let groups = GroupService::get_groups(&pool, &token).await?;
    Ok(HttpResponse::Ok().json(groups))
}

/// Get a group with its active member list
/// GET /groups/:id
pub async fn get_group(
    pool: web::Data<DbPool>,
    http_req: HttpRequest,
    group_id: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let token = auth::token_from_request(&http_req)?;
    let group = GroupService::get_group(&pool, group_id.into_inner(), &token).await?;
    Ok(HttpResponse::Ok().json(group))
}

/// Active members of a group; caller must be one of them
/// GET /groups/:id/members
pub async fn get_group_members(
    pool: web::Data<DbPool>,
    http_req: HttpRequest,
    group_id: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let token = auth::token_from_request(&http_req)?;
    let caller = auth::resolve_user(&pool, &token).await?;
    let group_id = group_id.into_inner();

    if !MembershipEngine::is_active_member(&pool, caller.id, group_id).await? {
        return Err(ServiceError::Forbidden(format!(
            "user {} is not a member of group {}",
            caller.id, group_id
        )));
    }

    let members: Vec<MemberResponse> = MembershipEngine::active_members(&pool, group_id)
        .await?
        .into_iter()
        .map(|u| MemberResponse {
            id: u.id,
            username: u.username,
        })
        .collect();
    Ok(HttpResponse::Ok().json(members))
}

/// Groups the user is an active member of (self only)
/// GET /users/:id/groups
pub async fn get_user_groups(
    pool: web::Data<DbPool>,
    http_req: HttpRequest,
    user_id: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let token = auth::token_from_request(&http_req)?;
    let groups = GroupService::groups_for_user(&pool, user_id.into_inner(), &token).await?;
    Ok(HttpResponse::Ok().json(groups))
}

/// Invite a user to a group
/// POST /groups/:id/invitations
pub async fn create_invitation(
    pool: web::Data<DbPool>,
    http_req: HttpRequest,
    group_id: web::Path<i64>,
    req: web::Json<CreateInvitationRequest>,
) -> Result<HttpResponse, ServiceError> {
    let token = auth::token_from_request(&http_req)?;
    let membership =
        InvitationService::create_invitation(&pool, group_id.into_inner(), &token, req.invitee_id)
            .await?;
    Ok(HttpResponse::Created().json(membership))
}

/// Pending invitations for a group (members only)
/// GET /groups/:id/invitations
pub async fn get_group_invitations(
    pool: web::Data<DbPool>,
    http_req: HttpRequest,
    group_id: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let token = auth::token_from_request(&http_req)?;
    let invitations =
        InvitationService::list_for_group(&pool, group_id.into_inner(), &token).await?;
    Ok(HttpResponse::Ok().json(invitations))
}

/// Pending invitations addressed to a user (self only)
/// GET /users/:id/invitations
pub async fn get_user_invitations(
    pool: web::Data<DbPool>,
    http_req: HttpRequest,
    user_id: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let token = auth::token_from_request(&http_req)?;
    let invitations = InvitationService::list_for_user(&pool, user_id.into_inner(), &token).await?;
    Ok(HttpResponse::Ok().json(invitations))
}

/// Accept an invitation; returns the joined group
/// PUT /invitations/:id/accept
pub async fn accept_invitation(
    pool: web::Data<DbPool>,
    http_req: HttpRequest,
    invitation_id: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let token = auth::token_from_request(&http_req)?;
    let group = InvitationService::accept(&pool, invitation_id.into_inner(), &token).await?;
    Ok(HttpResponse::Ok().json(group))
}

/// Reject an invitation (deletes the membership row)
/// DELETE /invitations/:id
pub async fn reject_invitation(
    pool: web::Data<DbPool>,
    ws_server: web::Data<WsServer>,
    http_req: HttpRequest,
    invitation_id: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let token = auth::token_from_request(&http_req)?;
    let membership = InvitationService::reject(&pool, invitation_id.into_inner(), &token).await?;

    // Best-effort presence cleanup; a stale entry heals on next disconnect
    ws_server
        .leave_by_user(membership.group_id, membership.user_id)
        .await;

    Ok(HttpResponse::NoContent().finish())
}

/// Remove a member from a group (the member themselves, or the admin)
/// DELETE /groups/:gid/members/:uid
pub async fn remove_group_member(
    pool: web::Data<DbPool>,
    ws_server: web::Data<WsServer>,
    http_req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ServiceError> {
    let (group_id, user_id) = path.into_inner();
    let token = auth::token_from_request(&http_req)?;

    GroupService::remove_member(&pool, group_id, &token, user_id).await?;

    // Best-effort presence cleanup; a stale entry heals on next disconnect
    ws_server.leave_by_user(group_id, user_id).await;

    Ok(HttpResponse::NoContent().finish())
}

/// Health check endpoint
/// GET /health
pub async fn health() -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok"
    })))
}
