//! Password hashing for `UTE_Password`.
//!
//! New hashes are Argon2id PHC strings, so salt and parameters travel with
//! them. Accounts created by the earlier backend carry bcrypt hashes
//! (`$2a$`, `$2b$`, `$2y$`); those still verify and are flagged for rehashing.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("argon2: {0}")]
    Argon2(argon2::password_hash::Error),

    #[error(transparent)]
    Bcrypt(#[from] bcrypt::BcryptError),
}

impl From<argon2::password_hash::Error> for PasswordError {
    fn from(err: argon2::password_hash::Error) -> Self {
        PasswordError::Argon2(err)
    }
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// `Ok(false)` on a wrong password; `Err` only when the stored hash is unreadable
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    if is_bcrypt_hash(hash) {
        return Ok(bcrypt::verify(password, hash)?);
    }
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub fn is_bcrypt_hash(value: &str) -> bool {
    BCRYPT_PREFIXES.iter().any(|p| value.starts_with(p))
}

/// Stored hash that should be replaced by an Argon2id one after a successful login
pub fn needs_rehash(hash: &str) -> bool {
    is_bcrypt_hash(hash)
}

/// Already a stored hash of either kind, so it must not be hashed again
pub fn is_password_hash(value: &str) -> bool {
    is_bcrypt_hash(value) || (value.starts_with("$argon2") && PasswordHash::new(value).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("Questionari2024!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Questionari2024!", &hash).unwrap());
        assert!(!verify_password("questionari2024!", &hash).unwrap());
        assert!(!needs_rehash(&hash));
    }

    #[test]
    fn bcrypt_hashes_from_existing_accounts_verify() {
        let known = "$2y$07$BCryptRequires22Chrcte/VlQH0piJtjXl.0t1XkA8pw9dMXTpOq";
        assert_eq!(verify_password("rasmuslerdorf", known).ok(), Some(true));
        assert_eq!(verify_password("rasmusler", known).ok(), Some(false));
        assert!(needs_rehash(known));
        assert!(is_password_hash(known));

        let generated = bcrypt::hash("turno-notte", 4).unwrap();
        assert!(generated.starts_with("$2b$"));
        assert!(verify_password("turno-notte", &generated).unwrap());
    }

    #[test]
    fn garbage_hashes_are_errors() {
        assert!(verify_password("x", "not-a-hash").is_err());
        assert!(verify_password("x", "$2b$10$short").is_err());
        assert!(!is_password_hash("plain-text"));
        assert!(is_password_hash(&hash_password("x").unwrap()));
    }
}
