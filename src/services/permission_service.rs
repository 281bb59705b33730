use serde_json::Value;
use sqlx::{MySqlPool, Row};
use thiserror::Error;
use tracing::{debug, warn};

use crate::database::DatabaseError;
use crate::types::PermissionKind;

/// Function guarding the answer listing
pub const RISPOSTE_QUESTIONARI_FUNCTION: i64 = 5;
/// Function guarding the function catalogue
pub const FUNZIONI_FUNCTION: i64 = 10;

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("Gruppo di abilitazione non disponibile")]
    NoGroup,

    #[error("Permesso non trovato per questa funzione")]
    NotFound(i64),

    #[error("Permesso non autorizzato per l'operazione: {0}")]
    Denied(PermissionKind),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for PermissionError {
    fn from(err: sqlx::Error) -> Self {
        PermissionError::Database(DatabaseError::Sqlx(err))
    }
}

/// Why a CRUD payload could not be classified
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("Operazione non riconosciuta")]
    UnknownOperation,

    #[error("Payload non valido")]
    InvalidPayload,
}

/// Flags of one `ANS_AbilitazioniOperazioni` row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionFlags {
    pub access: i64,
    pub insert: i64,
    pub modify: i64,
    pub advanced: i64,
}

impl PermissionFlags {
    pub fn allows(&self, kind: PermissionKind) -> bool {
        let flag = match kind {
            PermissionKind::Access => self.access,
            PermissionKind::Insert => self.insert,
            PermissionKind::Modify => self.modify,
            PermissionKind::Advanced => self.advanced,
        };
        flag == 1
    }

    /// First requested kind that is not granted
    pub fn first_denied(&self, kinds: &[PermissionKind]) -> Option<PermissionKind> {
        kinds.iter().copied().find(|k| !self.allows(*k))
    }
}

/// Permission kind a `crudTabella`-style payload needs
pub fn classify_payload(body: &Value) -> Result<PermissionKind, PayloadError> {
    if body.get("operation").and_then(Value::as_str) == Some("read") {
        return Ok(PermissionKind::Access);
    }
    let changes = body
        .get("changes")
        .and_then(Value::as_array)
        .ok_or(PayloadError::InvalidPayload)?;

    let has = |op: &str| changes.iter().any(|c| c.get("operation").and_then(Value::as_str) == Some(op));
    if has("create") {
        Ok(PermissionKind::Insert)
    } else if has("update") || has("delete") {
        Ok(PermissionKind::Modify)
    } else {
        Err(PayloadError::UnknownOperation)
    }
}

/// Active permission row of one (function, group) pair, one aliased flag per kind
fn flags_query() -> String {
    let columns = PermissionKind::ALL
        .iter()
        .map(|k| format!("CAST({} AS SIGNED) AS `{}`", k.column(), k.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM ANS_AbilitazioniOperazioni \
         WHERE ABO_Id_Funzioni = ? AND ABO_Id_GruppiAbilitazioni = ? AND ABO_StatoRecord = 'A' \
         LIMIT 1",
        columns
    )
}

pub struct PermissionService {
    pool: MySqlPool,
}

impl PermissionService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Require every kind in `kinds` on `function_id` for `group_id`
    pub async fn check(&self, group_id: Option<i64>, function_id: i64, kinds: &[PermissionKind]) -> Result<(), PermissionError> {
        let group_id = group_id.ok_or(PermissionError::NoGroup)?;
        let flags = self
            .flags(group_id, function_id)
            .await?
            .ok_or(PermissionError::NotFound(function_id))?;
        debug!("Permissions of group {} on function {}: {:?}", group_id, function_id, flags);

        if let Some(kind) = flags.first_denied(kinds) {
            warn!("Group {} denied {} on function {}", group_id, kind, function_id);
            return Err(PermissionError::Denied(kind));
        }
        Ok(())
    }

    pub async fn flags(&self, group_id: i64, function_id: i64) -> Result<Option<PermissionFlags>, PermissionError> {
        let row = sqlx::query(&flags_query())
            .bind(function_id)
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| {
            let flag = |kind: PermissionKind| r.try_get::<Option<i64>, _>(kind.as_str()).ok().flatten().unwrap_or(0);
            PermissionFlags {
                access: flag(PermissionKind::Access),
                insert: flag(PermissionKind::Insert),
                modify: flag(PermissionKind::Modify),
                advanced: flag(PermissionKind::Advanced),
            }
        }))
    }

    /// Function catalogue entry for a table: exact name, then substring, then `default_id`
    pub async fn function_id_for_table(&self, table: &str, default_id: i64) -> Result<i64, PermissionError> {
        let exact = sqlx::query(
            "SELECT CAST(EFU_Id_Funzioni AS SIGNED) AS id FROM ANS_Funzioni \
             WHERE EFU_NomeTabella = ? AND EFU_StatoRecord = 'A' LIMIT 1",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(id) = exact.and_then(|r| r.try_get::<i64, _>("id").ok()) {
            return Ok(id);
        }

        let partial = sqlx::query(
            "SELECT CAST(EFU_Id_Funzioni AS SIGNED) AS id FROM ANS_Funzioni \
             WHERE EFU_NomeTabella LIKE ? AND EFU_StatoRecord = 'A' LIMIT 1",
        )
        .bind(format!("%{}%", table))
        .fetch_optional(&self.pool)
        .await?;
        if let Some(id) = partial.and_then(|r| r.try_get::<i64, _>("id").ok()) {
            return Ok(id);
        }

        warn!("No function found for table {}, using default {}", table, default_id);
        Ok(default_id)
    }
}
