use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ClientIp};
use crate::services::auth_service::NewUser;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

impl AccountRequest {
    /// `(username, password, email)` when all three are non-empty
    fn fields(&self) -> Option<(&str, &str, &str)> {
        Some((
            non_empty(&self.username)?,
            non_empty(&self.password)?,
            non_empty(&self.email)?,
        ))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// POST /login - open a session and return its token
pub async fn login(
    State(state): State<AppState>,
    ClientIp(terminal): ClientIp,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Value> {
    let (Some(username), Some(password)) = (non_empty(&payload.username), non_empty(&payload.password)) else {
        return Err(ApiError::bad_request("Nome utente e password sono obbligatori"));
    };

    let token = state
        .auth()
        .login(username, password, &terminal, state.config.sessions.default_duration_minutes)
        .await?;

    Ok(ApiResponse::success(json!({
        "message": "Accesso effettuato con successo",
        "token": token,
    })))
}

/// POST /register - self-service account in the default group
pub async fn register(
    State(state): State<AppState>,
    ClientIp(terminal): ClientIp,
    Json(payload): Json<AccountRequest>,
) -> ApiResult<Value> {
    let (username, password, email) = payload
        .fields()
        .ok_or_else(|| ApiError::bad_request("Tutti i campi sono obbligatori"))?;

    state
        .auth()
        .register(NewUser {
            username,
            password,
            email,
            session_minutes: state.config.sessions.default_duration_minutes,
            terminal: &terminal,
        })
        .await?;

    Ok(ApiResponse::created(json!({"message": "Utente registrato con successo"})))
}

/// POST /utenteIns - first administrator, only while setup is enabled
pub async fn utente_ins(
    State(state): State<AppState>,
    ClientIp(terminal): ClientIp,
    Json(payload): Json<AccountRequest>,
) -> ApiResult<Value> {
    let (username, password, email) = payload
        .fields()
        .ok_or_else(|| ApiError::bad_request("Tutti i campi sono obbligatori"))?;

    state
        .auth()
        .create_first_admin(username, password, email, &terminal)
        .await?;

    Ok(ApiResponse::created(json!({"message": "Utente amministratore inserito con successo"})))
}

/// GET /check-config
pub async fn check_config(State(state): State<AppState>) -> ApiResult<Value> {
    let allow_config = state.auth().config_enabled().await?;
    Ok(ApiResponse::success(json!({"allowConfig": allow_config})))
}
