/// Identity resolution.
/// Tokens are opaque credentials issued at registration; this module is the
/// only place that turns one into a user identity.

use crate::db::models::User;
use crate::db::{Database, DbPool};
use crate::error::ServiceError;
use actix_web::HttpRequest;

/// Resolve an opaque token to a user, failing with `Unauthorized` if unknown.
pub async fn resolve_user(pool: &DbPool, token: &str) -> Result<User, ServiceError> {
    Database::get_user_by_token(pool, token)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("invalid token".to_string()))
}

/// Extract the token from the `Authorization` header.
/// Accepts either the raw token or a `Bearer <token>` form.
pub fn token_from_request(req: &HttpRequest) -> Result<String, ServiceError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("missing Authorization header".to_string()))?;

    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        return Err(ServiceError::Unauthorized(
            "missing Authorization header".to_string(),
        ));
    }
    Ok(token.to_string())
}
