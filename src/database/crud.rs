//! Table-driven CRUD over the allow-listed SiQuest tables.
//!
//! Writes never update data columns in place: an update disables the current
//! row (`D`) and inserts a new version that shares its reference id, and a
//! delete only flips the status to `C`.

use serde_json::{json, Map, Value};
use sqlx::{MySqlConnection, MySqlPool};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::manager::{DatabaseError, DatabaseManager};
use super::query_builder::QueryBuilder;
use super::schema::TableSchema;
use super::values::{as_i64, as_text, format_datetime, is_datetime_field, is_present_key, is_primitive, now_mysql, parse_datetime, row_to_json, rows_to_json};
use crate::filter::{Filter, FilterError, FilterMode};
use crate::types::{Operation, RecordStatus};

/// Request key carrying the modification time the client last saw
pub const ORIGINAL_TIMESTAMP: &str = "originalTimestamp";

#[derive(Debug, Error)]
pub enum CrudError {
    #[error("{0}")]
    InvalidChange(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict { message: String, current_record: Value },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for CrudError {
    fn from(err: sqlx::Error) -> Self {
        CrudError::Database(DatabaseError::Sqlx(err))
    }
}

/// Who is writing, stamped into the audit columns
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub user_id: i64,
    pub terminal: String,
}

/// One entry of a `changes` array
#[derive(Debug, Clone)]
pub struct Change {
    pub operation: Operation,
    pub data: Map<String, Value>,
}

impl Change {
    /// Validate a whole `changes` array before anything is written
    pub fn parse_all(changes: &[Value]) -> Result<Vec<Change>, CrudError> {
        changes.iter().map(Change::parse).collect()
    }

    pub fn parse(value: &Value) -> Result<Change, CrudError> {
        let mut data = value
            .as_object()
            .cloned()
            .ok_or_else(|| CrudError::InvalidChange("Ogni modifica deve essere un oggetto".to_string()))?;
        let operation = match data.remove("operation") {
            Some(Value::String(op)) => Operation::parse(&op)
                .ok_or_else(|| CrudError::InvalidChange(format!("Operazione non supportata: {}", op)))?,
            _ => return Err(CrudError::InvalidChange("Tipo di operazione mancante".to_string())),
        };
        Ok(Change { operation, data })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteResult {
    Created { id: i64 },
    Updated { old_id: Value, new_id: i64 },
    Deleted { id: Value },
}

impl WriteResult {
    pub fn to_json(&self) -> Value {
        match self {
            WriteResult::Created { id } => json!({"operation": "create", "id": id}),
            WriteResult::Updated { old_id, new_id } => json!({"operation": "update", "oldId": old_id, "newId": new_id}),
            WriteResult::Deleted { id } => json!({"operation": "delete", "id": id}),
        }
    }
}

/// Active rows of `table` matching `filters`
pub async fn read_operation(pool: &MySqlPool, table: &str, filters: &Value) -> Result<Vec<Value>, CrudError> {
    let mut conn = pool.acquire().await?;
    let schema = TableSchema::load(&mut conn, table).await?;

    let mut filter = Filter::new(table, schema.column_names(), FilterMode::Crud)?;
    filter.active_only(schema.existing_status_column().as_deref());
    filter.where_clause(filters.clone())?;
    let sql = filter.to_sql()?;

    let rows = QueryBuilder::bind(&sql).fetch_all(&mut *conn).await?;
    debug!("Read {} rows from {}", rows.len(), table);
    Ok(rows_to_json(&rows))
}

/// Active rows of `table` matching a listing `filtro`
pub async fn list_records(pool: &MySqlPool, table: &str, filtro: &Value) -> Result<Vec<Value>, CrudError> {
    let mut conn = pool.acquire().await?;
    let schema = TableSchema::load(&mut conn, table).await?;

    let mut filter = Filter::new(table, schema.column_names(), FilterMode::Listing)?;
    filter.active_only(schema.existing_status_column().as_deref());
    filter.where_clause(filtro.clone())?;
    let sql = filter.to_sql()?;

    let rows = QueryBuilder::bind(&sql).fetch_all(&mut *conn).await?;
    Ok(rows_to_json(&rows))
}

/// Every row of `table`, whatever its status
pub async fn all_rows(pool: &MySqlPool, table: &str) -> Result<Vec<Value>, CrudError> {
    let filter = Filter::new(table, vec![], FilterMode::Crud)?;
    let sql = filter.to_sql()?;
    let rows = QueryBuilder::bind(&sql).fetch_all(pool).await?;
    Ok(rows_to_json(&rows))
}

/// `{id, <display_field>}` pairs for lookup widgets, ordered by id
pub async fn reference_data(
    pool: &MySqlPool,
    table: &str,
    id_column: &str,
    display_field: &str,
) -> Result<Vec<Value>, CrudError> {
    let mut conn = pool.acquire().await?;
    let schema = TableSchema::load(&mut conn, table).await?;
    for column in [id_column, display_field] {
        if !schema.has_column(column) {
            return Err(FilterError::InvalidColumn(column.to_string()).into());
        }
    }

    let id = DatabaseManager::quote_identifier(id_column)?;
    let display = DatabaseManager::quote_identifier(display_field)?;
    let sql = format!(
        "SELECT {id} AS id, {display} FROM {} WHERE {id} IS NOT NULL ORDER BY {id} ASC",
        schema.quoted_table()?
    );
    debug!("Reference data: {}", sql);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    Ok(rows_to_json(&rows))
}

/// Apply `changes` to `table` in one transaction.
///
/// The batch is all or nothing: the first failing change, a conflict
/// included, rolls back every change before it and nothing after it runs.
pub async fn write_operations(
    pool: &MySqlPool,
    table: &str,
    changes: &[Change],
    request: &RequestInfo,
) -> Result<Vec<WriteResult>, CrudError> {
    let mut tx = pool.begin().await?;
    let schema = TableSchema::load(&mut tx, table).await?;
    let status = schema
        .existing_status_column()
        .ok_or_else(|| CrudError::InvalidChange("Colonna StatoRecord non trovata".to_string()))?;

    let mut results = Vec::with_capacity(changes.len());
    for change in changes {
        let outcome = match change.operation {
            Operation::Create => create(&mut tx, &schema, &status, &change.data, request).await,
            Operation::Update => update(&mut tx, &schema, &status, &change.data, request).await,
            Operation::Delete => delete(&mut tx, &schema, &status, &change.data).await,
        };
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                // Dropping the transaction rolls it back
                warn!("Rolling back {} changes on {}: {}", changes.len(), table, e);
                return Err(e);
            }
        }
    }

    tx.commit().await?;
    info!("Committed {} changes on {}", results.len(), table);
    Ok(results)
}

async fn create(
    conn: &mut MySqlConnection,
    schema: &TableSchema,
    status: &str,
    data: &Map<String, Value>,
    request: &RequestInfo,
) -> Result<WriteResult, CrudError> {
    let new_id = next_id(conn, schema).await?;
    let now = now_mysql();

    let mut record = clean_data(schema, data);
    record.insert(schema.primary_key.clone(), Value::from(new_id));
    set_field(schema, &mut record, "InizioValidita", Value::from(now.clone()));
    record.insert(status.to_string(), Value::from(RecordStatus::Active.code()));
    set_field(schema, &mut record, "Utente", Value::from(request.user_id));
    set_field(schema, &mut record, "Terminale", Value::from(request.terminal.clone()));
    set_field(schema, &mut record, "UtenteInserimento", Value::from(request.user_id));
    set_field(schema, &mut record, "DataOraInserimento", Value::from(now));
    set_field(schema, &mut record, "TerminaleInserimento", Value::from(request.terminal.clone()));
    let reference = schema.reference_column();
    if schema.has_column(&reference) {
        record.insert(reference, Value::from(new_id));
    }
    format_dates(&mut record)?;

    let sql = QueryBuilder::insert(&schema.table, &record)?;
    QueryBuilder::bind(&sql).execute(&mut *conn).await?;
    debug!("Created {} {}", schema.table, new_id);
    Ok(WriteResult::Created { id: new_id })
}

async fn update(
    conn: &mut MySqlConnection,
    schema: &TableSchema,
    status: &str,
    data: &Map<String, Value>,
    request: &RequestInfo,
) -> Result<WriteResult, CrudError> {
    let pk = &schema.primary_key;
    let old_id = data
        .get(pk)
        .filter(|v| is_present_key(Some(v)))
        .cloned()
        .ok_or_else(|| CrudError::InvalidChange(format!("ID mancante per l'aggiornamento (campo atteso: {})", pk)))?;

    let current = fetch_by_id(conn, schema, &old_id).await?.ok_or_else(|| {
        CrudError::NotFound(format!("Record con ID {} non trovato per l'aggiornamento", old_id))
    })?;

    if let Some(seen) = data.get(ORIGINAL_TIMESTAMP).and_then(as_text).filter(|s| !s.is_empty()) {
        check_conflict(conn, schema, status, &current, &seen).await?;
    }

    let changes = clean_data(schema, data);

    let sql = QueryBuilder::set_status(&schema.table, status, pk, &old_id, RecordStatus::Disabled)?;
    QueryBuilder::bind(&sql).execute(&mut *conn).await?;

    let new_id = next_id(conn, schema).await?;
    let now = now_mysql();

    let mut record: Map<String, Value> = current
        .iter()
        .filter(|(_, v)| is_primitive(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    record.extend(changes);
    record.insert(pk.clone(), Value::from(new_id));

    let reference = schema.reference_column();
    if schema.has_column(&reference) {
        let chain = current
            .get(&reference)
            .filter(|v| is_present_key(Some(v)))
            .cloned()
            .unwrap_or_else(|| old_id.clone());
        record.insert(reference, chain);
    }
    record.insert(status.to_string(), Value::from(RecordStatus::Active.code()));
    set_field(schema, &mut record, "DataOraModifica", Value::from(now.clone()));
    set_field(schema, &mut record, "UtenteModifica", Value::from(request.user_id));
    set_field(schema, &mut record, "TerminaleModifica", Value::from(request.terminal.clone()));
    set_field(schema, &mut record, "UtenteInserimento", Value::from(request.user_id));
    set_field(schema, &mut record, "InizioValidita", Value::from(now));
    format_dates(&mut record)?;

    let sql = QueryBuilder::insert(&schema.table, &record)?;
    QueryBuilder::bind(&sql).execute(&mut *conn).await?;
    debug!("Updated {} {} -> {}", schema.table, old_id, new_id);
    Ok(WriteResult::Updated { old_id, new_id })
}

async fn delete(
    conn: &mut MySqlConnection,
    schema: &TableSchema,
    status: &str,
    data: &Map<String, Value>,
) -> Result<WriteResult, CrudError> {
    let pk = &schema.primary_key;
    let id = data
        .get(pk)
        .filter(|v| is_present_key(Some(v)))
        .cloned()
        .ok_or_else(|| CrudError::InvalidChange(format!("ID mancante per la cancellazione (campo atteso: {})", pk)))?;

    let sql = QueryBuilder::set_status(&schema.table, status, pk, &id, RecordStatus::Cancelled)?;
    QueryBuilder::bind(&sql).execute(&mut *conn).await?;
    debug!("Cancelled {} {}", schema.table, id);
    Ok(WriteResult::Deleted { id })
}

/// How the stored row compares to the version a client edited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Staleness {
    Current,
    /// Modified after the client read it
    Modified,
    /// Replaced by a newer version of the same record
    Superseded,
}

/// An unparseable `seen` disables the check, so the update goes ahead.
fn staleness(schema: &TableSchema, status: &str, current: &Map<String, Value>, seen: &str) -> Staleness {
    let Some(seen_at) = parse_datetime(seen) else {
        debug!("Ignoring unparseable {} {:?} on {}", ORIGINAL_TIMESTAMP, seen, schema.table);
        return Staleness::Current;
    };
    if current.get(status).and_then(Value::as_str) == Some(RecordStatus::Disabled.code()) {
        return Staleness::Superseded;
    }
    let modified_at = current
        .get(&schema.field("DataOraModifica"))
        .and_then(as_text)
        .and_then(|s| parse_datetime(&s));
    if modified_at.is_some_and(|m| m > seen_at) {
        Staleness::Modified
    } else {
        Staleness::Current
    }
}

/// Fail with a conflict when the row changed after the client read it.
///
/// A superseded row hands the client the active version of the same record.
async fn check_conflict(
    conn: &mut MySqlConnection,
    schema: &TableSchema,
    status: &str,
    current: &Map<String, Value>,
    seen: &str,
) -> Result<(), CrudError> {
    let latest = match staleness(schema, status, current, seen) {
        Staleness::Current => return Ok(()),
        Staleness::Modified => None,
        Staleness::Superseded => latest_version(conn, schema, status, current).await?,
    };

    warn!("Concurrent modification on {}", schema.table);
    Err(CrudError::Conflict {
        message: "Il record è stato modificato da un altro utente".to_string(),
        current_record: Value::Object(latest.unwrap_or_else(|| current.clone())),
    })
}

async fn latest_version(
    conn: &mut MySqlConnection,
    schema: &TableSchema,
    status: &str,
    current: &Map<String, Value>,
) -> Result<Option<Map<String, Value>>, CrudError> {
    let reference = schema.reference_column();
    let Some(chain) = current.get(&reference).filter(|v| is_present_key(Some(v))) else {
        return Ok(None);
    };

    let mut filter = Filter::new(&schema.table, schema.column_names(), FilterMode::Crud)?;
    filter.active_only(Some(status));
    let mut conditions = Map::new();
    conditions.insert(reference, chain.clone());
    filter.where_clause(Value::Object(conditions))?;
    filter.order(&schema.primary_key)?;
    let sql = filter.to_sql()?;

    let rows = QueryBuilder::bind(&sql).fetch_all(&mut *conn).await?;
    Ok(rows.last().map(row_to_json))
}

async fn fetch_by_id(
    conn: &mut MySqlConnection,
    schema: &TableSchema,
    id: &Value,
) -> Result<Option<Map<String, Value>>, CrudError> {
    let sql = QueryBuilder::select_by_id(&schema.table, &schema.primary_key, id)?;
    let row = QueryBuilder::bind(&sql).fetch_optional(&mut *conn).await?;
    Ok(row.as_ref().map(row_to_json))
}

async fn next_id(conn: &mut MySqlConnection, schema: &TableSchema) -> Result<i64, CrudError> {
    let sql = QueryBuilder::next_id(&schema.table, &schema.primary_key)?;
    let row = QueryBuilder::bind(&sql).fetch_one(&mut *conn).await?;
    row_to_json(&row)
        .get("next_id")
        .and_then(as_i64)
        .ok_or_else(|| CrudError::Database(DatabaseError::MissingPrimaryKey(schema.table.clone())))
}

/// Keep real columns with primitive values; the concurrency token is never a column
fn clean_data(schema: &TableSchema, data: &Map<String, Value>) -> Map<String, Value> {
    data.iter()
        .filter(|(k, v)| k.as_str() != ORIGINAL_TIMESTAMP && schema.has_column(k) && is_primitive(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn set_field(schema: &TableSchema, record: &mut Map<String, Value>, name: &str, value: Value) {
    let column = schema.field(name);
    if schema.has_column(&column) {
        record.insert(column, value);
    }
}

/// Convert ISO strings in date-like columns to MySQL text
fn format_dates(record: &mut Map<String, Value>) -> Result<(), CrudError> {
    for (field, value) in record.iter_mut() {
        if !is_datetime_field(field) {
            continue;
        }
        if let Value::String(s) = value {
            if s.contains('T') {
                let formatted = format_datetime(s)
                    .ok_or_else(|| CrudError::InvalidChange(format!("Data non valida per {}: {}", field, s)))?;
                *s = formatted;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::ColumnInfo;

    fn schema() -> TableSchema {
        let columns = [
            "QUE_Id_Questionari",
            "QUE_IdRif_Questionari",
            "QUE_Descrizione",
            "QUE_InizioValidita",
            "QUE_StatoRecord",
            "QUE_DataOraModifica",
        ]
        .iter()
        .map(|n| ColumnInfo { name: n.to_string() })
        .collect();
        TableSchema::new("ANS_Questionari", "QUE_Id_Questionari".to_string(), columns)
    }

    #[test]
    fn parses_and_validates_changes() {
        let changes = Change::parse_all(&[
            json!({"operation": "create", "QUE_Descrizione": "Ricovero"}),
            json!({"operation": "delete", "QUE_Id_Questionari": 3}),
        ])
        .unwrap();
        assert_eq!(changes[0].operation, Operation::Create);
        assert!(!changes[0].data.contains_key("operation"));
        assert_eq!(changes[1].data["QUE_Id_Questionari"], 3);

        assert!(matches!(Change::parse(&json!({"QUE_Descrizione": "x"})), Err(CrudError::InvalidChange(m)) if m == "Tipo di operazione mancante"));
        assert!(matches!(Change::parse(&json!({"operation": "upsert"})), Err(CrudError::InvalidChange(_))));
        assert!(matches!(Change::parse(&json!("create")), Err(CrudError::InvalidChange(_))));
    }

    #[test]
    fn clean_data_keeps_known_primitive_columns() {
        let data = json!({
            "QUE_Descrizione": "Day hospital",
            "QUE_Sconosciuta": 1,
            "QUE_IdRif_Questionari": {"nested": true},
            "originalTimestamp": "2024-01-01 00:00:00"
        });
        let cleaned = clean_data(&schema(), data.as_object().unwrap());
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned["QUE_Descrizione"], "Day hospital");
    }

    #[test]
    fn audit_fields_only_when_columns_exist() {
        let schema = schema();
        let mut record = Map::new();
        set_field(&schema, &mut record, "InizioValidita", json!("2024-01-01 00:00:00"));
        set_field(&schema, &mut record, "Terminale", json!("10.0.0.1"));
        assert!(record.contains_key("QUE_InizioValidita"));
        assert!(!record.contains_key("QUE_Terminale"));
    }

    #[test]
    fn iso_dates_are_formatted_in_date_columns_only() {
        let mut record = json!({
            "QUE_InizioValidita": "2024-05-02T08:30:00",
            "QUE_Descrizione": "Test T"
        })
        .as_object()
        .cloned()
        .unwrap();
        format_dates(&mut record).unwrap();
        assert_eq!(record["QUE_InizioValidita"], "2024-05-02 08:30:00");
        assert_eq!(record["QUE_Descrizione"], "Test T");

        let mut bad = json!({"QUE_DataOraModifica": "notTadate"}).as_object().cloned().unwrap();
        assert!(matches!(format_dates(&mut bad), Err(CrudError::InvalidChange(_))));
    }

    fn stored(status: &str, modified: Option<&str>) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("QUE_Id_Questionari".to_string(), json!(4));
        row.insert("QUE_StatoRecord".to_string(), json!(status));
        row.insert("QUE_DataOraModifica".to_string(), modified.map_or(Value::Null, Value::from));
        row
    }

    #[test]
    fn later_modification_is_stale() {
        let schema = schema();
        let row = stored("A", Some("2024-05-02 10:00:00"));
        assert_eq!(staleness(&schema, "QUE_StatoRecord", &row, "2024-05-02 09:59:59"), Staleness::Modified);
        assert_eq!(staleness(&schema, "QUE_StatoRecord", &row, "2024-05-02 10:00:00"), Staleness::Current);
        assert_eq!(
            staleness(&schema, "QUE_StatoRecord", &stored("A", None), "2024-05-02 09:00:00"),
            Staleness::Current
        );
    }

    #[test]
    fn disabled_rows_are_superseded() {
        let row = stored("D", None);
        assert_eq!(staleness(&schema(), "QUE_StatoRecord", &row, "2030-01-01T00:00:00"), Staleness::Superseded);
    }

    #[test]
    fn unparseable_timestamp_skips_the_check() {
        let schema = schema();
        let row = stored("A", Some("2024-05-02 10:00:00"));
        assert_eq!(staleness(&schema, "QUE_StatoRecord", &row, "ieri"), Staleness::Current);
        assert_eq!(staleness(&schema, "QUE_StatoRecord", &stored("D", None), "ieri"), Staleness::Current);
    }

    #[test]
    fn write_results_render_legacy_shape() {
        assert_eq!(WriteResult::Created { id: 9 }.to_json(), json!({"operation": "create", "id": 9}));
        assert_eq!(
            WriteResult::Updated { old_id: json!(4), new_id: 10 }.to_json(),
            json!({"operation": "update", "oldId": 4, "newId": 10})
        );
        assert_eq!(WriteResult::Deleted { id: json!("7") }.to_json(), json!({"operation": "delete", "id": "7"}));
    }
}
