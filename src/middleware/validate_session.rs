use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::auth::token_from_header;
use crate::error::ApiError;
use crate::state::AppState;

/// Caller identity resolved from the `ANS_Sessioni` row of the request token
#[derive(Clone, Debug)]
pub struct SessionUser {
    pub token: String,
    pub user_id: i64,
    pub username: Option<String>,
    pub group_id: Option<i64>,
}

/// Session middleware for every protected route.
///
/// Expired sessions are deleted on sight, so a stale token is rejected once
/// as `Sessione scaduta` and afterwards as unknown.
pub async fn validate_session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(token_from_header)
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized("Token di sessione mancante"))?;

    let auth = state.auth();
    let session = auth.find_session(&token).await?.ok_or_else(|| {
        tracing::warn!("Rejected unknown session token");
        ApiError::unauthorized("Sessione non valida o scaduta")
    })?;

    if session.expired {
        auth.delete_session(&token).await?;
        tracing::warn!("Session of user {} expired", session.user_id);
        return Err(ApiError::unauthorized("Sessione scaduta"));
    }

    request.extensions_mut().insert(SessionUser {
        token: session.token,
        user_id: session.user_id,
        username: session.username,
        group_id: session.group_id,
    });

    Ok(next.run(request).await)
}
