use serde_json::{json, Map, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&success_body(message, data))?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(Value::Object(fields)) = data {
                for (key, value) in fields {
                    match value {
                        Value::String(s) => println!("  {}: {}", key, s),
                        other => println!("  {}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: OutputFormat, message: &str, status: Option<u16>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({"success": false, "error": message});
            if let Some(status) = status {
                response["status"] = json!(status);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => match status {
            Some(status) => eprintln!("Error ({}): {}", status, message),
            None => eprintln!("Error: {}", message),
        },
    }
    Ok(())
}

fn success_body(message: &str, data: Option<Value>) -> Value {
    let mut response = Map::new();
    response.insert("success".to_string(), Value::Bool(true));
    response.insert("message".to_string(), Value::from(message));
    match data {
        Some(Value::Object(fields)) => response.extend(fields),
        Some(other) => {
            response.insert("data".to_string(), other);
        }
        None => {}
    }
    Value::Object(response)
}

/// `message` field of a server error body, else the raw text
pub fn server_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_body_flattens_objects() {
        let body = success_body("ok", Some(json!({"token": "abc"})));
        assert_eq!(body, json!({"success": true, "message": "ok", "token": "abc"}));

        let body = success_body("ok", Some(json!(3)));
        assert_eq!(body["data"], 3);
    }

    #[test]
    fn extracts_server_messages() {
        assert_eq!(server_message(r#"{"message":"Utente non attivo"}"#), "Utente non attivo");
        assert_eq!(server_message("Bad Gateway\n"), "Bad Gateway");
    }
}
