use std::collections::HashMap;

use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::{generate_session_token, hash_password, needs_rehash, verify_password};
use crate::database::values::get_text;
use crate::database::DatabaseError;
use crate::types::RecordStatus;

/// Parameter enabling the first-administrator setup when set to `1`
pub const PARAM_CONFIG: &str = "CONFIG";
/// Session length of the first administrator, in minutes
pub const PARAM_SESSION_DURATION: &str = "DURATASESSIONE";
/// When `S`, a new login closes every earlier session of the user
pub const PARAM_MULTI_SESSION: &str = "MULTISESSIONE";

/// Group assigned to self-registered users and to the first administrator
pub const DEFAULT_GROUP: i64 = 1;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Nome utente o password errati")]
    InvalidCredentials,

    #[error("Utente non attivo")]
    Inactive,

    #[error("Nome utente già esistente")]
    UsernameTaken,

    #[error("CONFIG non è impostato a 1")]
    ConfigDisabled,

    #[error("Durata sessione non trovata nei parametri")]
    MissingSessionDuration,

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Database(DatabaseError::Sqlx(err))
    }
}

/// Row of `ANS_Sessioni` joined to its user
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: i64,
    pub username: Option<String>,
    pub group_id: Option<i64>,
    pub expired: bool,
}

#[derive(Debug, Clone)]
struct LoginUser {
    id: i64,
    password_hash: String,
    session_minutes: Option<i64>,
    status: String,
}

/// New account data shared by registration and the first-administrator setup
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub email: &'a str,
    pub session_minutes: i64,
    pub terminal: &'a str,
}

pub struct AuthService {
    pool: MySqlPool,
}

impl AuthService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Verify credentials and open a session; returns the token
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        terminal: &str,
        default_minutes: i64,
    ) -> Result<String, AuthError> {
        let user = self.find_login_user(username).await?.ok_or(AuthError::InvalidCredentials)?;
        authenticate(&user, password)?;

        if needs_rehash(&user.password_hash) {
            self.upgrade_password_hash(user.id, password).await;
        }

        if self.parameter(PARAM_MULTI_SESSION).await?.as_deref() == Some("S") {
            let closed = sqlx::query("DELETE FROM ANS_Sessioni WHERE SSN_Utente = ?")
                .bind(user.id)
                .execute(&self.pool)
                .await?;
            info!("Closed {} earlier sessions of user {}", closed.rows_affected(), user.id);
        }

        let minutes = user.session_minutes.filter(|m| *m > 0).unwrap_or(default_minutes);
        let token = generate_session_token(username, terminal);
        sqlx::query(
            "INSERT INTO ANS_Sessioni (SSN_Sessione, SSN_InizioValidita, SSN_FineValidita, SSN_Utente, SSN_Terminale, SSN_StatoRecord) \
             VALUES (?, NOW(), DATE_ADD(NOW(), INTERVAL ? MINUTE), ?, ?, ?)",
        )
        .bind(&token)
        .bind(minutes)
        .bind(user.id)
        .bind(terminal)
        .bind(RecordStatus::Active.code())
        .execute(&self.pool)
        .await?;

        info!("User {} logged in from {} for {} minutes", user.id, terminal, minutes);
        Ok(token)
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.delete_session(token).await?;
        Ok(())
    }

    /// Self-registration: active user in the default group
    pub async fn register(&self, user: NewUser<'_>) -> Result<(), AuthError> {
        if self.username_exists(user.username).await? {
            return Err(AuthError::UsernameTaken);
        }
        let mut tx = self.pool.begin().await?;
        Self::insert_user(&mut tx, &user).await?;
        tx.commit().await?;
        info!("Registered user {}", user.username);
        Ok(())
    }

    /// First administrator, allowed once while `CONFIG` is `1`
    pub async fn create_first_admin(&self, username: &str, password: &str, email: &str, terminal: &str) -> Result<(), AuthError> {
        let params = self.parameters(&[PARAM_CONFIG, PARAM_SESSION_DURATION]).await?;
        if params.get(PARAM_CONFIG).map(|v| v.trim()) != Some("1") {
            return Err(AuthError::ConfigDisabled);
        }
        if self.username_exists(username).await? {
            return Err(AuthError::UsernameTaken);
        }
        let session_minutes = params
            .get(PARAM_SESSION_DURATION)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or(AuthError::MissingSessionDuration)?;

        let user = NewUser { username, password, email, session_minutes, terminal };
        let mut tx = self.pool.begin().await?;
        Self::insert_user(&mut tx, &user).await?;
        sqlx::query("UPDATE ANS_Parametri SET PAR_Descrizione = '0' WHERE PAR_Codice = ?")
            .bind(PARAM_CONFIG)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("First administrator {} created, setup disabled", username);
        Ok(())
    }

    pub async fn config_enabled(&self) -> Result<bool, AuthError> {
        Ok(self.parameter(PARAM_CONFIG).await?.as_deref().map(str::trim) == Some("1"))
    }

    pub async fn parameter(&self, code: &str) -> Result<Option<String>, AuthError> {
        let row = sqlx::query("SELECT PAR_Descrizione FROM ANS_Parametri WHERE PAR_Codice = ? LIMIT 1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| get_text(&r, "PAR_Descrizione")))
    }

    pub async fn parameters(&self, codes: &[&str]) -> Result<HashMap<String, String>, AuthError> {
        let mut params = HashMap::new();
        for code in codes {
            if let Some(value) = self.parameter(code).await? {
                params.insert(code.to_string(), value);
            }
        }
        Ok(params)
    }

    pub async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, AuthError> {
        let row = sqlx::query(
            "SELECT s.SSN_Sessione AS token, CAST(s.SSN_Utente AS SIGNED) AS user_id, u.UTE_NomeUtente AS username, \
                    CAST(u.UTE_Id_GruppiAbilitazioni AS SIGNED) AS group_id, \
                    CAST(s.SSN_FineValidita < NOW() AS SIGNED) AS expired \
             FROM ANS_Sessioni s \
             LEFT JOIN ANS_Utenti u ON u.UTE_Id_Utenti = s.SSN_Utente \
             WHERE s.SSN_Sessione = ? \
             LIMIT 1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| SessionRecord {
            token: get_text(&r, "token").unwrap_or_else(|| token.to_string()),
            user_id: opt_i64(&r, "user_id").unwrap_or(0),
            username: get_text(&r, "username"),
            group_id: opt_i64(&r, "group_id"),
            expired: opt_i64(&r, "expired") == Some(1),
        }))
    }

    pub async fn delete_session(&self, token: &str) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM ANS_Sessioni WHERE SSN_Sessione = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Remove every expired session
    pub async fn cleanup_expired(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM ANS_Sessioni WHERE SSN_FineValidita < NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        let row = sqlx::query("SELECT 1 FROM ANS_Utenti WHERE UTE_NomeUtente = ? LIMIT 1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn find_login_user(&self, username: &str) -> Result<Option<LoginUser>, AuthError> {
        // Older versions of the same account share the username; the active one wins
        let row = sqlx::query(
            "SELECT CAST(UTE_Id_Utenti AS SIGNED) AS id, UTE_Password, \
                    CAST(UTE_DurataSessione AS SIGNED) AS session_minutes, UTE_StatoRecord \
             FROM ANS_Utenti \
             WHERE UTE_NomeUtente = ? \
             ORDER BY (UTE_StatoRecord = 'A') DESC, UTE_Id_Utenti DESC \
             LIMIT 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| LoginUser {
            id: opt_i64(&r, "id").unwrap_or(0),
            password_hash: get_text(&r, "UTE_Password").unwrap_or_default(),
            session_minutes: opt_i64(&r, "session_minutes"),
            status: get_text(&r, "UTE_StatoRecord").unwrap_or_default(),
        }))
    }

    /// Replace a bcrypt hash with an Argon2id one; the login goes on if this fails
    async fn upgrade_password_hash(&self, user_id: i64, password: &str) {
        let hashed = match hash_password(password) {
            Ok(hashed) => hashed,
            Err(e) => {
                warn!("Could not rehash password of user {}: {}", user_id, e);
                return;
            }
        };
        match sqlx::query("UPDATE ANS_Utenti SET UTE_Password = ? WHERE UTE_Id_Utenti = ?")
            .bind(hashed)
            .bind(user_id)
            .execute(&self.pool)
            .await
        {
            Ok(_) => info!("Upgraded password hash of user {} to argon2id", user_id),
            Err(e) => warn!("Could not store rehashed password of user {}: {}", user_id, e),
        }
    }

    async fn insert_user(conn: &mut sqlx::MySqlConnection, user: &NewUser<'_>) -> Result<(), AuthError> {
        let hashed = hash_password(user.password).map_err(|e| AuthError::Hash(e.to_string()))?;
        sqlx::query(
            "INSERT INTO ANS_Utenti (UTE_NomeUtente, UTE_Password, UTE_Email, UTE_Id_GruppiAbilitazioni, UTE_DurataSessione, \
                                     UTE_InizioValidita, UTE_DataOraInserimento, UTE_StatoRecord, UTE_Utente, UTE_Terminale) \
             VALUES (?, ?, ?, ?, ?, NOW(), NOW(), ?, 0, ?)",
        )
        .bind(user.username)
        .bind(hashed)
        .bind(user.email)
        .bind(DEFAULT_GROUP)
        .bind(user.session_minutes)
        .bind(RecordStatus::Active.code())
        .bind(user.terminal)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

/// Password first, then status: an inactive account is only reported to a
/// caller who knows its password.
fn authenticate(user: &LoginUser, password: &str) -> Result<(), AuthError> {
    let matches = verify_password(password, &user.password_hash).unwrap_or_else(|e| {
        warn!("Unreadable password hash for user {}: {}", user.id, e);
        false
    });
    if !matches {
        return Err(AuthError::InvalidCredentials);
    }
    if user.status != RecordStatus::Active.code() {
        warn!("Login attempt by user {} with status {}", user.id, user.status);
        return Err(AuthError::Inactive);
    }
    Ok(())
}

fn opt_i64(row: &MySqlRow, column: &str) -> Option<i64> {
    row.try_get::<Option<i64>, _>(column).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(password: &str, status: &str) -> LoginUser {
        LoginUser {
            id: 7,
            password_hash: bcrypt::hash(password, 4).unwrap(),
            session_minutes: Some(30),
            status: status.to_string(),
        }
    }

    #[test]
    fn active_account_with_bcrypt_hash_logs_in() {
        assert!(authenticate(&account("reparto3", "A"), "reparto3").is_ok());
    }

    #[test]
    fn wrong_password_wins_over_inactive_status() {
        let user = account("reparto3", "C");
        assert!(matches!(authenticate(&user, "sbagliata"), Err(AuthError::InvalidCredentials)));
        assert!(matches!(authenticate(&user, "reparto3"), Err(AuthError::Inactive)));
    }

    #[test]
    fn unreadable_hash_is_a_wrong_password() {
        let user = LoginUser { password_hash: "plain".to_string(), ..account("x", "A") };
        assert!(matches!(authenticate(&user, "plain"), Err(AuthError::InvalidCredentials)));
    }
}
