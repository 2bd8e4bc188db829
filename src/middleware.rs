use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::IntoResponse,
};

use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    db::UserExt,
    error::{ErrorMessage, HttpError},
    models::{User, UserRole},
    utils::token,
};

/// Authenticated user attached to the request extensions by `auth`.
/// Downstream handlers extract it with `Extension<JWTAuthMiddleware>`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JWTAuthMiddleware {
    pub user: User,
}

/// Authentication middleware.
///
/// Token extraction order: `access_token` cookie first (browser clients),
/// then `Authorization: Bearer <token>` (API clients). The decoded subject
/// is re-fetched from the database so deleted users are rejected even with
/// a still-valid token.
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let cookies = cookie_jar
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| {
                    auth_value
                        .strip_prefix("Bearer ")
                        .map(|token| token.to_owned())
                })
        });

    let token = cookies
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let token_details = match token::decode_token(token, app_state.env.jwt_secret.as_bytes()) {
        Ok(token_details) => token_details,
        Err(_) => {
            return Err(HttpError::unauthorized(
                ErrorMessage::InvalidToken.to_string(),
            ));
        }
    };

    let user_id = Uuid::parse_str(&token_details)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|_| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    let user =
        user.ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    req.extensions_mut()
        .insert(JWTAuthMiddleware { user: user.clone() });

    Ok(next.run(req).await)
}

/// Role gate, layered after `auth`. Rejects with 403 when the
/// authenticated user holds none of `required_roles`.
pub async fn role_check(
    req: Request,
    next: Next,
    required_roles: Vec<UserRole>,
) -> Result<impl IntoResponse, HttpError> {
    let user = req
        .extensions()
        .get::<JWTAuthMiddleware>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    if !required_roles.contains(&user.user.role) {
        return Err(HttpError::new(
            ErrorMessage::AdminRequired.to_string(),
            StatusCode::FORBIDDEN,
        ));
    }

    Ok(next.run(req).await)
}

/// Owner-or-admin rule for per-user resources: the acting user must match
/// the owning user id or hold the admin role.
pub fn require_owner_or_admin(acting_user: &User, owner_id: Uuid) -> Result<(), HttpError> {
    if acting_user.role.is_admin() || acting_user.id == owner_id {
        Ok(())
    } else {
        Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user_with(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            username: "fan".to_string(),
            email: "fan@example.com".to_string(),
            password: String::new(),
            role,
            bio: String::new(),
            favorite_genres: vec![],
            total_reviews: 0,
            average_rating: 0.0,
            movies_watched: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_passes_ownership_check() {
        let user = user_with(UserRole::User);
        assert!(require_owner_or_admin(&user, user.id).is_ok());
    }

    #[test]
    fn admin_passes_for_any_resource() {
        let admin = user_with(UserRole::Admin);
        assert!(require_owner_or_admin(&admin, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn stranger_is_forbidden() {
        let user = user_with(UserRole::User);
        let err = require_owner_or_admin(&user, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }
}
