use serde_json::{json, Value};
use sqlx::MySqlPool;

use crate::config::AppConfig;
use crate::database::crud::{self, Change, RequestInfo, WriteResult};
use crate::error::ApiError;
use crate::middleware::SessionUser;

/// `tableName` of a request body, present and allow-listed
pub fn allowed_table<'a>(config: &AppConfig, table: Option<&'a str>) -> Result<&'a str, ApiError> {
    let table = table
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Nome della tabella mancante"))?;
    if !config.is_allowed_table(table) {
        tracing::warn!("Rejected table outside the allow-list: {}", table);
        return Err(ApiError::bad_request("Nome della tabella non valido"));
    }
    Ok(table)
}

pub fn table_name(body: &Value) -> Option<&str> {
    body.get("tableName").and_then(Value::as_str)
}

/// A CRUD request body: `{operation: "read", filters}` or `{changes: [...]}`
#[derive(Debug, Clone)]
pub enum CrudRequest {
    Read { filters: Value },
    Write { changes: Vec<Change> },
}

impl CrudRequest {
    pub fn parse(body: &Value) -> Result<Self, ApiError> {
        if body.get("operation").and_then(Value::as_str) == Some("read") {
            let filters = body.get("filters").cloned().unwrap_or(Value::Null);
            return Ok(CrudRequest::Read { filters });
        }
        match body.get("changes").and_then(Value::as_array) {
            Some(changes) => Ok(CrudRequest::Write { changes: Change::parse_all(changes)? }),
            None => Err(ApiError::bad_request(
                "Payload non valido. Inviare \"operation\": \"read\" oppure un array \"changes\".",
            )),
        }
    }
}

pub enum CrudOutcome {
    Rows(Vec<Value>),
    Written(Vec<WriteResult>),
}

impl CrudOutcome {
    pub fn results(written: &[WriteResult]) -> Value {
        Value::Array(written.iter().map(WriteResult::to_json).collect())
    }

    /// Read rows as an array, writes as `{message, results}`
    pub fn into_json(self, message: &str) -> Value {
        match self {
            CrudOutcome::Rows(rows) => Value::Array(rows),
            CrudOutcome::Written(written) => json!({
                "message": message,
                "results": Self::results(&written),
            }),
        }
    }
}

pub async fn execute(
    pool: &MySqlPool,
    table: &str,
    request: CrudRequest,
    user: &SessionUser,
    terminal: &str,
) -> Result<CrudOutcome, ApiError> {
    match request {
        CrudRequest::Read { filters } => Ok(CrudOutcome::Rows(crud::read_operation(pool, table, &filters).await?)),
        CrudRequest::Write { changes } => {
            let info = RequestInfo { user_id: user.user_id, terminal: terminal.to_string() };
            let written = crud::write_operations(pool, table, &changes, &info).await?;
            Ok(CrudOutcome::Written(written))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operation;

    #[test]
    fn table_must_be_present_and_allowed() {
        let config = AppConfig::from_env();
        assert_eq!(allowed_table(&config, Some("ANS_Questionari")).unwrap(), "ANS_Questionari");
        assert_eq!(allowed_table(&config, None).unwrap_err().message(), "Nome della tabella mancante");
        assert_eq!(allowed_table(&config, Some("")).unwrap_err().status_code(), 400);
        assert_eq!(
            allowed_table(&config, Some("ANS_Sessioni")).unwrap_err().message(),
            "Nome della tabella non valido"
        );
    }

    #[test]
    fn parses_read_and_write_bodies() {
        let read = CrudRequest::parse(&json!({"operation": "read", "filters": {"QUE_Descrizione": "Day"}})).unwrap();
        assert!(matches!(read, CrudRequest::Read { filters } if filters["QUE_Descrizione"] == "Day"));

        let write = CrudRequest::parse(&json!({"changes": [{"operation": "delete", "QUE_Id_Questionari": 2}]})).unwrap();
        assert!(matches!(write, CrudRequest::Write { changes } if changes[0].operation == Operation::Delete));

        assert_eq!(CrudRequest::parse(&json!({"changes": [{"operation": "merge"}]})).unwrap_err().status_code(), 400);
        assert_eq!(CrudRequest::parse(&json!({})).unwrap_err().status_code(), 400);
    }

    #[test]
    fn writes_render_message_and_results() {
        let outcome = CrudOutcome::Written(vec![
            WriteResult::Created { id: 8 },
            WriteResult::Updated { old_id: json!(3), new_id: 9 },
        ]);
        let body = outcome.into_json("ok");
        assert_eq!(body["message"], "ok");
        assert_eq!(body["results"][0], json!({"operation": "create", "id": 8}));
        assert_eq!(body["results"][1], json!({"operation": "update", "oldId": 3, "newId": 9}));
        assert_eq!(CrudOutcome::Rows(vec![json!({"a": 1})]).into_json("ok"), json!([{"a": 1}]));
    }
}
