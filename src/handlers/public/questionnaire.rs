use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, ClientIp};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AnswersRequest {
    #[serde(default)]
    pub risposte: Value,
}

/// GET /api/questionari/:id - questionnaire with questions and proposed answers
pub async fn questionnaire_get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let questionnaire = state.questionnaires().questionnaire(&id).await?;
    Ok(ApiResponse::success(questionnaire))
}

/// POST /api/questionari/:id/risposte - store one completed questionnaire
pub async fn answers_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ClientIp(terminal): ClientIp,
    Json(payload): Json<AnswersRequest>,
) -> ApiResult<Value> {
    state
        .questionnaires()
        .submit_answers(&id, payload.risposte.as_array().map(Vec::as_slice).unwrap_or_default(), &terminal)
        .await?;
    Ok(ApiResponse::success(json!({"message": "Risposte salvate con successo."})))
}
