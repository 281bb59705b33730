use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterMode, FilterOp, FilterWhereInfo, FilterWhereOptions};
use crate::database::values::{as_text, format_datetime, is_datetime_field};
use crate::database::DatabaseManager;
use crate::types::RecordStatus;

/// Filter key of the answer listing that matches on the questionnaire description
pub const QUESTIONNAIRE_DESCRIPTION: &str = "QUE_Descrizione";

pub struct FilterWhere {
    mode: FilterMode,
    param_values: Vec<Value>,
    conditions: Vec<FilterWhereInfo>,
}

impl FilterWhere {
    pub fn new(mode: FilterMode) -> Self {
        Self {
            mode,
            param_values: vec![],
            conditions: vec![],
        }
    }

    pub fn generate(
        where_data: &Value,
        mode: FilterMode,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(mode);
        filter_where.build(where_data, options)
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidFormat),
        }
    }

    /// Columns named by the parsed conditions
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.conditions
            .iter()
            .filter(|c| c.operator != FilterOp::QuestionnaireDescription)
            .map(|c| c.column.as_str())
    }

    fn build(&mut self, where_data: &Value, options: &FilterWhereOptions) -> Result<(String, Vec<Value>), FilterError> {
        self.param_values.clear();
        self.conditions.clear();

        Self::validate(where_data)?;
        if let Value::Object(obj) = where_data {
            for (key, value) in obj {
                self.parse_field_condition(key, value)?;
            }
        }

        let mut sql_conditions = vec![];
        if let Some(status) = &options.status_column {
            if !self.columns().any(|c| c == status) {
                let quoted = Self::quote(status)?;
                sql_conditions.push(format!("{} = {}", quoted, self.param(Value::from(RecordStatus::Active.code()))));
            }
        }

        let conditions_snapshot = self.conditions.clone();
        for condition in &conditions_snapshot {
            sql_conditions.push(self.build_sql_condition(condition)?);
        }

        let where_clause = if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") };
        Ok((where_clause, self.param_values.clone()))
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<(), FilterError> {
        let info = match self.mode {
            FilterMode::Crud => Self::parse_crud_condition(field, value)?,
            FilterMode::Listing => match Self::parse_listing_condition(field, value)? {
                Some(info) => info,
                None => return Ok(()),
            },
        };
        self.conditions.push(info);
        Ok(())
    }

    fn parse_crud_condition(field: &str, value: &Value) -> Result<FilterWhereInfo, FilterError> {
        let (operator, data) = match value {
            Value::Object(range) => {
                let from = range.get("from").and_then(as_text).filter(|s| !s.is_empty());
                let to = range.get("to").and_then(as_text).filter(|s| !s.is_empty());
                match (from, to) {
                    (Some(from), Some(to)) => {
                        let from = Self::mysql_date(field, &from)?;
                        let to = Self::mysql_date(field, &to)?;
                        (FilterOp::Between, Value::Array(vec![from.into(), to.into()]))
                    }
                    _ => return Err(Self::invalid(field, "range requires both from and to")),
                }
            }
            Value::String(s) => (FilterOp::Like, Value::String(format!("%{}%", s))),
            Value::Array(_) => return Err(Self::invalid(field, "arrays are not supported")),
            other => (FilterOp::Eq, other.clone()),
        };
        Ok(FilterWhereInfo { column: field.to_string(), operator, data })
    }

    fn parse_listing_condition(field: &str, value: &Value) -> Result<Option<FilterWhereInfo>, FilterError> {
        if field == QUESTIONNAIRE_DESCRIPTION {
            // An empty description means no restriction
            return Ok(as_text(value).filter(|s| !s.is_empty()).map(|d| FilterWhereInfo {
                column: field.to_string(),
                operator: FilterOp::QuestionnaireDescription,
                data: Value::String(format!("%{}%", d)),
            }));
        }

        let (operator, data) = match value {
            Value::Object(obj) => {
                let bounds = obj
                    .get("between")
                    .and_then(Value::as_array)
                    .filter(|b| b.len() == 2)
                    .ok_or_else(|| Self::invalid(field, "between requires exactly 2 values"))?;
                let bounds = bounds
                    .iter()
                    .map(|b| match b {
                        Value::String(s) if is_datetime_field(field) => Self::mysql_date(field, s).map(Value::String),
                        other => Ok(other.clone()),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                (FilterOp::Between, Value::Array(bounds))
            }
            Value::Array(_) => return Err(Self::invalid(field, "arrays are not supported")),
            other => (FilterOp::Eq, other.clone()),
        };
        Ok(Some(FilterWhereInfo { column: field.to_string(), operator, data }))
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        if condition.operator == FilterOp::QuestionnaireDescription {
            return Ok(format!(
                "`RQU_IdRif_Questionari` IN (SELECT `QUE_IdRif_Questionari` FROM `ANS_Questionari` WHERE `QUE_Descrizione` LIKE {})",
                self.param(condition.data.clone())
            ));
        }

        let quoted_column = Self::quote(&condition.column)?;
        match condition.operator {
            FilterOp::Eq => {
                if condition.data.is_null() { Ok(format!("{} IS NULL", quoted_column)) }
                else { Ok(format!("{} = {}", quoted_column, self.param(condition.data.clone()))) }
            }
            FilterOp::Like => Ok(format!("{} LIKE {}", quoted_column, self.param(condition.data.clone()))),
            FilterOp::Between => match &condition.data {
                Value::Array(values) if values.len() == 2 => Ok(format!(
                    "{} BETWEEN {} AND {}",
                    quoted_column,
                    self.param(values[0].clone()),
                    self.param(values[1].clone())
                )),
                _ => Err(Self::invalid(&condition.column, "between requires exactly 2 values")),
            },
            FilterOp::QuestionnaireDescription => unreachable!("handled above"),
        }
    }

    fn mysql_date(field: &str, value: &str) -> Result<String, FilterError> {
        format_datetime(value).ok_or_else(|| Self::invalid(field, "invalid date"))
    }

    fn quote(column: &str) -> Result<String, FilterError> {
        DatabaseManager::quote_identifier(column).map_err(|_| FilterError::InvalidColumn(column.to_string()))
    }

    fn invalid(field: &str, reason: &str) -> FilterError {
        FilterError::InvalidCondition { field: field.to_string(), reason: reason.to_string() }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        "?".to_string()
    }
}
