use serde_json::{Map, Value};
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::Query;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::values::bind_value;
use crate::filter::types::SqlResult;
use crate::types::RecordStatus;

/// Statement constructors for the write paths; reads go through `Filter`
pub struct QueryBuilder;

impl QueryBuilder {
    /// Bind every parameter of a generated statement
    pub fn bind(sql: &SqlResult) -> Query<'_, MySql, MySqlArguments> {
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_value(q, p);
        }
        q
    }

    pub fn next_id(table: &str, primary_key: &str) -> Result<SqlResult, DatabaseError> {
        let pk = DatabaseManager::quote_identifier(primary_key)?;
        Ok(SqlResult {
            query: format!(
                "SELECT COALESCE(MAX({pk}), 0) + 1 AS next_id FROM {}",
                DatabaseManager::quote_identifier(table)?
            ),
            params: vec![],
        })
    }

    pub fn select_by_id(table: &str, primary_key: &str, id: &Value) -> Result<SqlResult, DatabaseError> {
        Ok(SqlResult {
            query: format!(
                "SELECT * FROM {} WHERE {} = ?",
                DatabaseManager::quote_identifier(table)?,
                DatabaseManager::quote_identifier(primary_key)?
            ),
            params: vec![id.clone()],
        })
    }

    pub fn insert(table: &str, record: &Map<String, Value>) -> Result<SqlResult, DatabaseError> {
        if record.is_empty() {
            return Err(DatabaseError::InvalidIdentifier(format!("{}: no columns to insert", table)));
        }
        let columns = record
            .keys()
            .map(|k| DatabaseManager::quote_identifier(k))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        Ok(SqlResult {
            query: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                DatabaseManager::quote_identifier(table)?,
                columns.join(", "),
                placeholders
            ),
            params: record.values().cloned().collect(),
        })
    }

    /// Multi-row INSERT; every row must follow `columns`
    pub fn insert_many(table: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Result<SqlResult, DatabaseError> {
        let quoted = columns
            .iter()
            .map(|c| DatabaseManager::quote_identifier(c))
            .collect::<Result<Vec<_>, _>>()?;
        let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
        let mut params = Vec::with_capacity(rows.len() * columns.len());
        for row in rows {
            debug_assert_eq!(row.len(), columns.len());
            params.extend(row);
        }
        let tuples = vec![tuple; params.len() / columns.len().max(1)].join(", ");
        Ok(SqlResult {
            query: format!(
                "INSERT INTO {} ({}) VALUES {}",
                DatabaseManager::quote_identifier(table)?,
                quoted.join(", "),
                tuples
            ),
            params,
        })
    }

    pub fn set_status(
        table: &str,
        status_column: &str,
        primary_key: &str,
        id: &Value,
        status: RecordStatus,
    ) -> Result<SqlResult, DatabaseError> {
        Ok(SqlResult {
            query: format!(
                "UPDATE {} SET {} = ? WHERE {} = ?",
                DatabaseManager::quote_identifier(table)?,
                DatabaseManager::quote_identifier(status_column)?,
                DatabaseManager::quote_identifier(primary_key)?
            ),
            params: vec![Value::from(status.code()), id.clone()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_keeps_column_order() {
        let record = json!({"QUE_Id_Questionari": 5, "QUE_Descrizione": "Day surgery", "QUE_StatoRecord": "A"});
        let sql = QueryBuilder::insert("ANS_Questionari", record.as_object().unwrap()).unwrap();
        assert_eq!(
            sql.query,
            "INSERT INTO `ANS_Questionari` (`QUE_Id_Questionari`, `QUE_Descrizione`, `QUE_StatoRecord`) VALUES (?, ?, ?)"
        );
        assert_eq!(sql.params, vec![json!(5), json!("Day surgery"), json!("A")]);
    }

    #[test]
    fn insert_many_repeats_tuples() {
        let sql = QueryBuilder::insert_many(
            "ANS_RisposteQuestionari",
            &["RQU_IdRif_Questionari", "RQU_Valore"],
            vec![vec![json!(1), json!("a")], vec![json!(1), json!("b")]],
        )
        .unwrap();
        assert_eq!(
            sql.query,
            "INSERT INTO `ANS_RisposteQuestionari` (`RQU_IdRif_Questionari`, `RQU_Valore`) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(sql.params.len(), 4);
    }

    #[test]
    fn status_and_lookup_statements() {
        let sql = QueryBuilder::set_status("ANS_Utenti", "UTE_StatoRecord", "UTE_Id_Utenti", &json!(3), RecordStatus::Cancelled).unwrap();
        assert_eq!(sql.query, "UPDATE `ANS_Utenti` SET `UTE_StatoRecord` = ? WHERE `UTE_Id_Utenti` = ?");
        assert_eq!(sql.params, vec![json!("C"), json!(3)]);

        let sql = QueryBuilder::next_id("ANS_Utenti", "UTE_Id_Utenti").unwrap();
        assert_eq!(sql.query, "SELECT COALESCE(MAX(`UTE_Id_Utenti`), 0) + 1 AS next_id FROM `ANS_Utenti`");

        assert!(QueryBuilder::select_by_id("ANS_Utenti", "pk; --", &json!(1)).is_err());
        assert!(QueryBuilder::insert("ANS_Utenti", &Map::new()).is_err());
    }
}
