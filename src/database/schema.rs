//! Naming-convention introspection of the SiQuest tables.
//!
//! Every table follows `PFX_Id_<Suffix>` for its primary key, and the prefix
//! (`PFX_`) is reused for the status, reference and audit columns.

use sqlx::MySqlConnection;

use super::manager::{DatabaseError, DatabaseManager};
use super::values::get_text;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub table: String,
    pub primary_key: String,
    pub prefix: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    /// Read primary key and columns of `table`
    pub async fn load(conn: &mut MySqlConnection, table: &str) -> Result<Self, DatabaseError> {
        let quoted = DatabaseManager::quote_identifier(table)?;

        let keys = sqlx::query(&format!("SHOW KEYS FROM {} WHERE Key_name = 'PRIMARY'", quoted))
            .fetch_all(&mut *conn)
            .await?;
        let primary_key = keys
            .first()
            .and_then(|row| get_text(row, "Column_name"))
            .ok_or_else(|| DatabaseError::MissingPrimaryKey(table.to_string()))?;

        let rows = sqlx::query(&format!("SHOW COLUMNS FROM {}", quoted))
            .fetch_all(&mut *conn)
            .await?;
        let columns = rows
            .iter()
            .filter_map(|row| get_text(row, "Field"))
            .map(|name| ColumnInfo { name })
            .collect();

        Ok(Self::new(table, primary_key, columns))
    }

    pub fn new(table: &str, primary_key: String, columns: Vec<ColumnInfo>) -> Self {
        let prefix = prefix_from_primary_key(&primary_key);
        Self {
            table: table.to_string(),
            primary_key,
            prefix,
            columns,
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// `<prefix><name>`, e.g. `UTE_` + `StatoRecord`
    pub fn field(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    pub fn status_column(&self) -> String {
        self.field("StatoRecord")
    }

    /// Status column as it exists in the table; a column ending in
    /// `StatoRecord` is accepted when the prefixed name is absent
    pub fn existing_status_column(&self) -> Option<String> {
        let conventional = self.status_column();
        if self.has_column(&conventional) {
            return Some(conventional);
        }
        self.columns
            .iter()
            .find(|c| c.name.ends_with("StatoRecord"))
            .map(|c| c.name.clone())
    }

    /// Column linking every version of a record to the first one
    pub fn reference_column(&self) -> String {
        format!("{}IdRif_{}", self.prefix, table_suffix(&self.table))
    }

    pub fn quoted_table(&self) -> Result<String, DatabaseError> {
        DatabaseManager::quote_identifier(&self.table)
    }
}

/// Primary key text before its first `Id`; empty when `Id` is absent or leading
pub fn prefix_from_primary_key(primary_key: &str) -> String {
    match primary_key.find("Id") {
        Some(idx) if idx > 0 => primary_key[..idx].to_string(),
        _ => String::new(),
    }
}

/// Table name after its own prefix: `ANS_Utenti` -> `Utenti`
pub fn table_suffix(table: &str) -> &str {
    table.split_once('_').map(|(_, rest)| rest).unwrap_or(table)
}
