use axum::extract::{Extension, State};
use axum::response::Json;
use serde_json::Value;

use super::utils::{self, allowed_table, CrudOutcome, CrudRequest};
use crate::auth::{hash_password, is_password_hash};
use crate::database::crud::Change;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ClientIp, SessionUser};
use crate::services::permission_service::{classify_payload, FUNZIONI_FUNCTION};
use crate::state::AppState;
use crate::types::{Operation, RecordStatus};

const USERS_TABLE: &str = "ANS_Utenti";
const FUNCTIONS_TABLE: &str = "ANS_Funzioni";

const USER_PASSWORD: &str = "UTE_Password";
const USER_SESSION_MINUTES: &str = "UTE_DurataSessione";
const USER_STATUS: &str = "UTE_StatoRecord";

/// POST /crudTabella - generic CRUD on an allow-listed table
pub async fn crud_tabella(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ClientIp(terminal): ClientIp,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let kind = classify_payload(&body)?;
    let table = allowed_table(&state.config, utils::table_name(&body))?;

    let permissions = state.permissions();
    let function_id = permissions
        .function_id_for_table(table, state.config.crud.default_function_id)
        .await?;
    permissions.check(user.group_id, function_id, &[kind]).await?;

    let request = CrudRequest::parse(&body)?;
    let outcome = utils::execute(&state.pool, table, request, &user, &terminal).await?;
    Ok(ApiResponse::success(outcome.into_json("Operazioni eseguite con successo")))
}

/// POST /api/internalUtenti/users - user administration, passwords hashed on the way in
pub async fn users(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ClientIp(terminal): ClientIp,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let kind = classify_payload(&body)?;
    let permissions = state.permissions();
    let function_id = permissions
        .function_id_for_table(USERS_TABLE, state.config.crud.default_function_id)
        .await?;
    permissions.check(user.group_id, function_id, &[kind]).await?;

    let request = match CrudRequest::parse(&body)? {
        CrudRequest::Write { mut changes } => {
            prepare_user_changes(&mut changes)?;
            CrudRequest::Write { changes }
        }
        read => read,
    };

    match utils::execute(&state.pool, USERS_TABLE, request, &user, &terminal).await? {
        CrudOutcome::Rows(rows) => Ok(ApiResponse::success(Value::Array(rows))),
        CrudOutcome::Written(written) => Ok(ApiResponse::success(CrudOutcome::results(&written))),
    }
}

/// POST /api/internalFunzioni/users - function catalogue administration
pub async fn functions(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ClientIp(terminal): ClientIp,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let kind = classify_payload(&body)?;
    state
        .permissions()
        .check(user.group_id, FUNZIONI_FUNCTION, &[kind])
        .await?;

    let request = CrudRequest::parse(&body)?;
    let outcome = utils::execute(&state.pool, FUNCTIONS_TABLE, request, &user, &terminal).await?;
    Ok(ApiResponse::success(
        outcome.into_json("Operazioni su ANS_Funzioni eseguite con successo"),
    ))
}

/// Hash plain passwords and apply account defaults before the generic write
pub fn prepare_user_changes(changes: &mut [Change]) -> Result<(), ApiError> {
    for change in changes.iter_mut() {
        let password = change
            .data
            .get(USER_PASSWORD)
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        if let Some(password) = &password {
            if !is_password_hash(password) {
                let hashed = hash_password(password).map_err(|e| {
                    tracing::error!("Password hashing failed: {}", e);
                    ApiError::internal_server_error("Errore interno del server")
                })?;
                change.data.insert(USER_PASSWORD.to_string(), Value::from(hashed));
            }
        }

        match change.operation {
            Operation::Create => {
                let has_duration = change
                    .data
                    .get(USER_SESSION_MINUTES)
                    .is_some_and(|v| !v.is_null() && v != &Value::from(0) && v != &Value::from(""));
                if !has_duration {
                    change.data.insert(USER_SESSION_MINUTES.to_string(), Value::from(30));
                }
                change
                    .data
                    .insert(USER_STATUS.to_string(), Value::from(RecordStatus::Active.code()));
            }
            Operation::Update if password.is_some() => {
                change
                    .data
                    .insert(USER_STATUS.to_string(), Value::from(RecordStatus::Active.code()));
            }
            _ => {}
        }
    }
    Ok(())
}
