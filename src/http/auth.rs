use axum::extract::{FromRef, FromRequestParts};
use axum::http::header;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::users::UserService;
use crate::domain::user::{Role, User, UserStatus};
use crate::http::AppError;
use crate::AppState;

/// The caller behind a bearer token, freshly loaded from the database.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
    pub user: User,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // The role gate and the handler both extract the caller; load it once.
        if let Some(cached) = parts.extensions.get::<AuthUser>() {
            return Ok(cached.clone());
        }

        let app_state = AppState::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::unauthorized("You are not logged in. Please log in to get access.")
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Invalid token. Please log in again."))?;

        let user_id = AuthService::from_state(&app_state)
            .authenticate_token(token)
            .map_err(|err| {
                tracing::error!(error = ?err, "failed to authenticate");
                AppError::internal("failed to authenticate")
            })?
            .ok_or_else(|| AppError::unauthorized("Invalid token. Please log in again."))?;

        let user = UserService::new(app_state.db.clone())
            .get_user(user_id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %user_id, "failed to load caller");
                AppError::internal("failed to authenticate")
            })?
            .ok_or_else(|| {
                AppError::unauthorized("The user belonging to this token no longer exists.")
            })?;

        if user.status != UserStatus::Active {
            return Err(AppError::forbidden(
                "Your account is not active. Please contact support.",
            ));
        }

        let auth_user = AuthUser {
            user_id: user.id,
            role: user.role,
            user,
        };
        parts.extensions.insert(auth_user.clone());
        Ok(auth_user)
    }
}
