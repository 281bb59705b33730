use serde_json::Value;

use super::error::FilterError;
use super::filter_where::FilterWhere;
use super::types::{FilterMode, FilterWhereOptions, SqlResult};
use crate::database::DatabaseManager;

/// SELECT builder over one table whose columns are known
pub struct Filter {
    table_name: String,
    columns: Vec<String>,
    mode: FilterMode,
    where_data: Value,
    options: FilterWhereOptions,
    order_by: Option<String>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>, columns: Vec<String>, mode: FilterMode) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        if !DatabaseManager::is_valid_identifier(&table_name) {
            return Err(FilterError::InvalidColumn(table_name));
        }
        Ok(Self {
            table_name,
            columns,
            mode,
            where_data: Value::Null,
            options: FilterWhereOptions::default(),
            order_by: None,
        })
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        if let Value::Object(obj) = &conditions {
            for key in obj.keys() {
                self.validate_column(key)?;
            }
        }
        self.where_data = conditions;
        Ok(self)
    }

    /// Restrict to active rows (unless the conditions name the status column)
    pub fn active_only(&mut self, status_column: Option<&str>) -> &mut Self {
        self.options.status_column = status_column.map(str::to_string);
        self
    }

    pub fn order(&mut self, column: &str) -> Result<&mut Self, FilterError> {
        self.validate_column(column)?;
        self.order_by = Some(column.to_string());
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = FilterWhere::generate(&self.where_data, self.mode, &self.options)?;
        let mut query = format!("SELECT * FROM `{}` WHERE {}", self.table_name, where_clause);
        if let Some(order) = &self.order_by {
            query.push_str(&format!(" ORDER BY `{}`", order));
        }
        tracing::debug!("Filter SQL: {} {:?}", query, params);
        Ok(SqlResult { query, params })
    }

    fn validate_column(&self, column: &str) -> Result<(), FilterError> {
        // The description filter of the answer listing refers to the questionnaire table
        if self.mode == FilterMode::Listing && column == super::filter_where::QUESTIONNAIRE_DESCRIPTION {
            return Ok(());
        }
        if self.columns.iter().any(|c| c == column) {
            Ok(())
        } else {
            Err(FilterError::InvalidColumn(column.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns() -> Vec<String> {
        ["UTE_Id_Utenti", "UTE_NomeUtente", "UTE_StatoRecord"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builds_select_over_active_rows() {
        let mut filter = Filter::new("ANS_Utenti", columns(), FilterMode::Crud).unwrap();
        filter.active_only(Some("UTE_StatoRecord"));
        filter.where_clause(json!({"UTE_NomeUtente": "ros"})).unwrap();
        filter.order("UTE_Id_Utenti").unwrap();
        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM `ANS_Utenti` WHERE `UTE_StatoRecord` = ? AND `UTE_NomeUtente` LIKE ? ORDER BY `UTE_Id_Utenti`"
        );
        assert_eq!(sql.params, vec![json!("A"), json!("%ros%")]);
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let mut filter = Filter::new("ANS_Utenti", columns(), FilterMode::Crud).unwrap();
        assert!(matches!(
            filter.where_clause(json!({"UTE_Password": "x"})),
            Err(FilterError::InvalidColumn(c)) if c == "UTE_Password"
        ));
        assert!(filter.order("nope").is_err());
    }

    #[test]
    fn listing_accepts_the_description_key() {
        let mut filter = Filter::new("ANS_RisposteQuestionari", vec!["RQU_StatoRecord".to_string()], FilterMode::Listing).unwrap();
        assert!(filter.where_clause(json!({"QUE_Descrizione": "x"})).is_ok());
        assert!(Filter::new("bad table", vec![], FilterMode::Crud).is_err());
    }
}
