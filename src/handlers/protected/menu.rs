use axum::extract::{Extension, State};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, SessionUser};
use crate::services::menu_service::Menu;
use crate::state::AppState;

/// GET /abilitazioneUtenti/menu - navigation tree of the caller's group
pub async fn menu(State(state): State<AppState>, Extension(user): Extension<SessionUser>) -> ApiResult<Menu> {
    let group_id = user.group_id.ok_or_else(|| {
        tracing::warn!("User {} has no permission group", user.user_id);
        ApiError::forbidden("Gruppo di abilitazione non disponibile")
    })?;

    let menu = state.menus().menu(group_id).await?;
    Ok(ApiResponse::success(menu))
}
