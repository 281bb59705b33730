use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::validate_session::SessionUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::PermissionKind;

/// Route-level permission requirement: fixed kinds on a fixed function
#[derive(Clone)]
pub struct PermissionGuard {
    pub app: AppState,
    pub function_id: i64,
    pub kinds: &'static [PermissionKind],
}

impl PermissionGuard {
    pub fn new(app: AppState, function_id: i64, kinds: &'static [PermissionKind]) -> Self {
        Self { app, function_id, kinds }
    }
}

/// Must run inside `validate_session_middleware`
pub async fn require_permission(
    State(guard): State<PermissionGuard>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<SessionUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Token di sessione mancante"))?;

    guard
        .app
        .permissions()
        .check(user.group_id, guard.function_id, guard.kinds)
        .await?;

    Ok(next.run(request).await)
}
