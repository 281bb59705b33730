use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/questionari/:descrizione/domandeMapping - numbered question texts
pub async fn domande_mapping(State(state): State<AppState>, Path(descrizione): Path<String>) -> ApiResult<Value> {
    let mapping = state.questionnaires().questions_mapping(&descrizione).await?;
    Ok(ApiResponse::success(json!({"domandeMapping": mapping})))
}
