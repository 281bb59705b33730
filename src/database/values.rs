//! Conversions between MySQL rows and JSON values.
//!
//! Rows are read generically (the CRUD layer never knows its tables at
//! compile time), so every column is mapped by its reported SQL type.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo};

/// MySQL DATETIME text format
pub const MYSQL_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Convert a row into a JSON object keyed by column name.
///
/// Binary columns that are not valid UTF-8 are left out, so copying the
/// object back into an INSERT lets the database keep its default for them.
pub fn row_to_json(row: &MySqlRow) -> Map<String, Value> {
    let mut map = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        if let Some(value) = column_value(row, i, column.type_info().name()) {
            map.insert(column.name().to_string(), value);
        }
    }
    map
}

pub fn rows_to_json(rows: &[MySqlRow]) -> Vec<Value> {
    rows.iter().map(|r| Value::Object(row_to_json(r))).collect()
}

fn column_value(row: &MySqlRow, i: usize, type_name: &str) -> Option<Value> {
    let decoded = match type_name {
        "NULL" => Some(Value::Null),
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<Option<i64>, _>(i)
            .ok()
            .map(|v| v.map_or(Value::Null, Value::from))
            .or_else(|| row.try_get::<Option<bool>, _>(i).ok().map(|v| v.map_or(Value::Null, |b| Value::from(b as i64)))),
        t if t.ends_with("UNSIGNED") => row
            .try_get::<Option<u64>, _>(i)
            .ok()
            .map(|v| v.map_or(Value::Null, Value::from)),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(i)
            .ok()
            .map(|v| v.map_or(Value::Null, |f| float_value(f as f64))),
        "DOUBLE" => row
            .try_get::<Option<f64>, _>(i)
            .ok()
            .map(|v| v.map_or(Value::Null, float_value)),
        // DECIMAL stays text, as the admin frontend receives it
        "DECIMAL" => row
            .try_get::<Option<Decimal>, _>(i)
            .ok()
            .map(|v| v.map_or(Value::Null, |d| Value::String(d.to_string()))),
        "DATETIME" => row
            .try_get::<Option<NaiveDateTime>, _>(i)
            .ok()
            .map(|v| v.map_or(Value::Null, |d| Value::String(d.format(MYSQL_DATETIME).to_string()))),
        "TIMESTAMP" => row.try_get::<Option<DateTime<Utc>>, _>(i).ok().map(|v| {
            v.map_or(Value::Null, |d| {
                Value::String(d.with_timezone(&Local).format(MYSQL_DATETIME).to_string())
            })
        }),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(i)
            .ok()
            .map(|v| v.map_or(Value::Null, |d| Value::String(d.format("%Y-%m-%d").to_string()))),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(i)
            .ok()
            .map(|v| v.map_or(Value::Null, |t| Value::String(t.format("%H:%M:%S").to_string()))),
        "JSON" => row.try_get::<Option<Value>, _>(i).ok().map(|v| v.unwrap_or(Value::Null)),
        _ => None,
    };

    decoded.or_else(|| text_value(row, i))
}

fn text_value(row: &MySqlRow, i: usize) -> Option<Value> {
    if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        return Some(v.map_or(Value::Null, Value::String));
    }
    match row.try_get::<Option<Vec<u8>>, _>(i) {
        Ok(None) => Some(Value::Null),
        Ok(Some(bytes)) => String::from_utf8(bytes).ok().map(Value::String),
        Err(e) => {
            tracing::debug!("Skipping undecodable column {}: {}", i, e);
            None
        }
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Read a text column that MySQL may report as binary (SHOW statements do on some servers)
pub fn get_text(row: &MySqlRow, column: &str) -> Option<String> {
    if let Ok(v) = row.try_get::<Option<String>, _>(column) {
        return v;
    }
    row.try_get::<Option<Vec<u8>>, _>(column)
        .ok()
        .flatten()
        .and_then(|b| String::from_utf8(b).ok())
}

/// Bind a JSON value as a positional parameter
pub fn bind_value<'q>(
    q: Query<'q, MySql, MySqlArguments>,
    v: &'q Value,
) -> Query<'q, MySql, MySqlArguments> {
    match v {
        Value::Null => q.bind(None::<String>),
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                q.bind(u)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => q.bind(v.to_string()),
    }
}

/// Values the CRUD layer is willing to write into a column
pub fn is_primitive(v: &Value) -> bool {
    matches!(v, Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))
}

/// Integer view of a JSON value; numeric strings are accepted
pub fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

/// Text view of a JSON value; numbers are rendered
pub fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A primary key is present when it is neither null, zero nor an empty string
pub fn is_present_key(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::Bool(b)) => *b,
        Some(_) => true,
    }
}

/// Current local time in MySQL DATETIME format
pub fn now_mysql() -> String {
    Local::now().format(MYSQL_DATETIME).to_string()
}

/// Normalize a client date into MySQL DATETIME text.
///
/// - ISO 8601 strings (containing `T`) are converted to local time
/// - a bare date gets `00:00:00`
/// - anything already containing a space is passed through
pub fn format_datetime(input: &str) -> Option<String> {
    if input.is_empty() {
        return None;
    }
    if input.contains('T') {
        return parse_datetime(input).map(|d| d.format(MYSQL_DATETIME).to_string());
    }
    if input.contains(' ') {
        return Some(input.to_string());
    }
    Some(format!("{} 00:00:00", input))
}

/// Parse the datetime shapes clients send back: RFC 3339 (converted to local
/// time), `YYYY-MM-DDTHH:MM:SS[.fff]`, MySQL text, or a bare date.
pub fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(input) {
        return Some(d.with_timezone(&Local).naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(d) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(d);
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Column names that conventionally hold dates or times
pub fn is_datetime_field(name: &str) -> bool {
    ["Data", "Validita", "Timestamp", "Ora"].iter().any(|k| name.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formats_bare_dates_and_passthrough() {
        assert_eq!(format_datetime("2024-03-01").as_deref(), Some("2024-03-01 00:00:00"));
        assert_eq!(format_datetime("2024-03-01 10:20:30").as_deref(), Some("2024-03-01 10:20:30"));
        assert_eq!(format_datetime(""), None);
    }

    #[test]
    fn formats_naive_iso_strings() {
        assert_eq!(format_datetime("2024-03-01T10:20:30").as_deref(), Some("2024-03-01 10:20:30"));
        assert_eq!(format_datetime("2024-03-01T10:20:30.123").as_deref(), Some("2024-03-01 10:20:30"));
    }

    #[test]
    fn rfc3339_is_converted_to_local_time() {
        let expected = DateTime::parse_from_rfc3339("2024-03-01T10:20:30Z")
            .unwrap()
            .with_timezone(&Local)
            .format(MYSQL_DATETIME)
            .to_string();
        assert_eq!(format_datetime("2024-03-01T10:20:30Z"), Some(expected));
        assert_eq!(format_datetime("not-a-dateT"), None);
    }

    #[test]
    fn parses_mysql_and_date_forms() {
        let d = parse_datetime("2024-03-01 10:20:30").unwrap();
        assert_eq!(d.format(MYSQL_DATETIME).to_string(), "2024-03-01 10:20:30");
        let d = parse_datetime("2024-03-01").unwrap();
        assert_eq!(d.format(MYSQL_DATETIME).to_string(), "2024-03-01 00:00:00");
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn datetime_field_names() {
        assert!(is_datetime_field("UTE_DataOraModifica"));
        assert!(is_datetime_field("QUE_InizioValidita"));
        assert!(!is_datetime_field("QUE_Descrizione"));
    }

    #[test]
    fn primitive_and_key_checks() {
        assert!(is_primitive(&json!("x")));
        assert!(is_primitive(&Value::Null));
        assert!(!is_primitive(&json!({"a": 1})));
        assert!(!is_primitive(&json!([1])));

        assert!(is_present_key(Some(&json!(3))));
        assert!(is_present_key(Some(&json!("3"))));
        assert!(!is_present_key(Some(&json!(0))));
        assert!(!is_present_key(Some(&json!(""))));
        assert!(!is_present_key(None));
    }

    #[test]
    fn numeric_views() {
        assert_eq!(as_i64(&json!(7)), Some(7));
        assert_eq!(as_i64(&json!(" 12 ")), Some(12));
        assert_eq!(as_i64(&json!(true)), Some(1));
        assert_eq!(as_i64(&json!("abc")), None);
        assert_eq!(as_text(&json!(5)).as_deref(), Some("5"));
    }
}
