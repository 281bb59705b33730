use serde_json::json;

use crate::auth::hash_password;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

/// Print the Argon2 PHC string to store in `UTE_Password`
pub fn hash(password: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let hashed = hash_password(password).map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    match output_format {
        OutputFormat::Json => output_success(output_format, "Password hashed", Some(json!({"hash": hashed}))),
        OutputFormat::Text => {
            println!("{}", hashed);
            Ok(())
        }
    }
}
