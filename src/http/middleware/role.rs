use axum::extract::{FromRef, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::domain::user::Role;
use crate::http::{AppError, AuthUser};
use crate::AppState;

/// Middleware state for a route group that needs at least `min_role`.
#[derive(Clone)]
pub struct RoleGate {
    pub state: AppState,
    pub min_role: Role,
}

impl RoleGate {
    pub fn new(state: AppState, min_role: Role) -> Self {
        Self { state, min_role }
    }
}

impl FromRef<RoleGate> for AppState {
    fn from_ref(gate: &RoleGate) -> Self {
        gate.state.clone()
    }
}

/// Rejects callers below the gate's minimum role.
pub async fn require_role(
    State(gate): State<RoleGate>,
    auth: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !auth.role.at_least(gate.min_role) {
        tracing::debug!(
            user_id = %auth.user_id,
            role = ?auth.role,
            required = ?gate.min_role,
            "role gate rejected request"
        );
        return Err(AppError::forbidden(
            "You do not have permission to perform this action",
        ));
    }

    Ok(next.run(request).await)
}
