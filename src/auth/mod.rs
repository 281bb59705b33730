pub mod password;

use sha2::{Digest, Sha256};
use uuid::Uuid;

pub use password::{hash_password, is_password_hash, needs_rehash, verify_password, PasswordError};

/// New session token: hex SHA-256 over the login context and a random UUID
pub fn generate_session_token(username: &str, terminal: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update(b"|");
    hasher.update(terminal.as_bytes());
    hasher.update(b"|");
    hasher.update(chrono::Utc::now().timestamp_millis().to_be_bytes());
    hasher.update(b"|");
    hasher.update(Uuid::new_v4().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Token from an `Authorization` header value, with or without the `Bearer ` scheme
pub fn token_from_header(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
