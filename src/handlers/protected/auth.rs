use axum::extract::{Extension, State};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, SessionUser};
use crate::state::AppState;

/// POST /logout - close the caller's session
pub async fn logout(State(state): State<AppState>, Extension(user): Extension<SessionUser>) -> ApiResult<Value> {
    state.auth().logout(&user.token).await?;
    tracing::info!("User {} logged out", user.user_id);
    Ok(ApiResponse::success(json!({"message": "Logout effettuato con successo."})))
}
