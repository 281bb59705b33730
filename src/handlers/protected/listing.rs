use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::utils::{allowed_table, table_name};
use crate::database::crud;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReferenceQuery {
    pub table: Option<String>,
    #[serde(rename = "idColumn")]
    pub id_column: Option<String>,
    #[serde(rename = "displayField")]
    pub display_field: Option<String>,
}

/// POST /api/dataHandling/risposteQuestionari - answer listing, gated by function 5
pub async fn risposte_questionari(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<Value> {
    listing(&state, &body).await
}

/// POST /listaRecords - the same listing for any allow-listed table
pub async fn lista_records(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<Value> {
    listing(&state, &body).await
}

async fn listing(state: &AppState, body: &Value) -> ApiResult<Value> {
    let table = allowed_table(&state.config, table_name(body))?;
    let filtro = body.get("filtro").cloned().unwrap_or(Value::Null);

    let data = crud::list_records(&state.pool, table, &filtro).await?;
    tracing::debug!("Listing {} returned {} rows", table, data.len());
    Ok(ApiResponse::success(json!({"data": data, "tableName": table})))
}

/// GET /referenceDataSimple?table&idColumn&displayField
pub async fn reference_data_simple(
    State(state): State<AppState>,
    Query(query): Query<ReferenceQuery>,
) -> ApiResult<Value> {
    let (Some(table), Some(id_column), Some(display_field)) = (
        query.table.as_deref().filter(|s| !s.is_empty()),
        query.id_column.as_deref().filter(|s| !s.is_empty()),
        query.display_field.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return Err(ApiError::bad_request(
            "Params 'table', 'idColumn', and 'displayField' are all required.",
        ));
    };
    if !state.config.is_allowed_table(table) {
        return Err(ApiError::bad_request(format!("Table '{}' not in allowed list.", table)));
    }

    let rows = crud::reference_data(&state.pool, table, id_column, display_field).await?;
    Ok(ApiResponse::success(Value::Array(rows)))
}

/// POST /getForeignKeyData - every row of an allow-listed table
pub async fn foreign_key_data(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<Value> {
    let table = table_name(&body)
        .filter(|t| state.config.is_allowed_table(t))
        .ok_or_else(|| ApiError::bad_request("Nome della tabella non valido"))?;

    let rows = crud::all_rows(&state.pool, table).await?;
    Ok(ApiResponse::success(Value::Array(rows)))
}
