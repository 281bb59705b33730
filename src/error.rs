// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict, carrying the row as it is now stored
    Conflict {
        message: String,
        current_record: Value,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict { .. } => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict { .. } => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            // The admin frontend reads `conflict.currentRecord` to offer a reload
            ApiError::Conflict { message, current_record } => json!({
                "error": true,
                "message": message,
                "code": self.error_code(),
                "conflict": {
                    "message": message,
                    "currentRecord": current_record,
                }
            }),
            _ => json!({
                "error": true,
                "message": self.message(),
                "code": self.error_code()
            }),
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>, current_record: Value) -> Self {
        ApiError::Conflict {
            message: message.into(),
            current_record,
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<crate::database::DatabaseError> for ApiError {
    fn from(err: crate::database::DatabaseError) -> Self {
        use crate::database::DatabaseError;
        match err {
            DatabaseError::InvalidIdentifier(name) => {
                ApiError::bad_request(format!("Nome non valido: {}", name))
            }
            DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Database configuration error: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) | DatabaseError::Sqlx(sqlx::Error::Io(_)) => {
                tracing::error!("Database unavailable: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::MissingPrimaryKey(_) | DatabaseError::Sqlx(_) => {
                // Log the real error but return generic message
                tracing::error!("Database error: {}", err);
                ApiError::internal_server_error("Errore interno del server")
            }
        }
    }
}

impl From<crate::filter::FilterError> for ApiError {
    fn from(err: crate::filter::FilterError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<crate::database::crud::CrudError> for ApiError {
    fn from(err: crate::database::crud::CrudError) -> Self {
        use crate::database::crud::CrudError;
        match err {
            CrudError::InvalidChange(msg) => ApiError::bad_request(msg),
            CrudError::NotFound(msg) => ApiError::not_found(msg),
            CrudError::Conflict { current_record, .. } => {
                ApiError::conflict("Il record è stato modificato da un altro utente", current_record)
            }
            CrudError::Filter(e) => e.into(),
            CrudError::Database(e) => e.into(),
        }
    }
}

impl From<crate::services::permission_service::PermissionError> for ApiError {
    fn from(err: crate::services::permission_service::PermissionError) -> Self {
        use crate::services::permission_service::PermissionError;
        match err {
            PermissionError::NoGroup | PermissionError::NotFound(_) | PermissionError::Denied(_) => {
                tracing::warn!("Permission denied: {}", err);
                ApiError::forbidden(err.to_string())
            }
            PermissionError::Database(e) => e.into(),
        }
    }
}

impl From<crate::services::permission_service::PayloadError> for ApiError {
    fn from(err: crate::services::permission_service::PayloadError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<crate::services::AuthError> for ApiError {
    fn from(err: crate::services::AuthError) -> Self {
        use crate::services::AuthError;
        match err {
            AuthError::InvalidCredentials | AuthError::Inactive => ApiError::unauthorized(err.to_string()),
            AuthError::UsernameTaken | AuthError::ConfigDisabled => ApiError::bad_request(err.to_string()),
            AuthError::MissingSessionDuration => ApiError::not_found(err.to_string()),
            AuthError::Hash(_) => {
                tracing::error!("{}", err);
                ApiError::internal_server_error("Errore interno del server")
            }
            AuthError::Database(e) => e.into(),
        }
    }
}

impl From<crate::services::QuestionnaireError> for ApiError {
    fn from(err: crate::services::QuestionnaireError) -> Self {
        use crate::services::QuestionnaireError;
        match err {
            QuestionnaireError::NotFound | QuestionnaireError::DescriptionNotFound | QuestionnaireError::NoQuestions => {
                ApiError::not_found(err.to_string())
            }
            QuestionnaireError::InvalidAnswers(msg) => ApiError::bad_request(msg),
            QuestionnaireError::Database(e) => e.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_body_carries_current_record() {
        let err = ApiError::conflict("changed", json!({"UTE_Id_Utenti": 4}));
        assert_eq!(err.status_code(), 409);
        let body = err.to_json();
        assert_eq!(body["message"], "changed");
        assert_eq!(body["conflict"]["currentRecord"]["UTE_Id_Utenti"], 4);
    }

    #[test]
    fn plain_errors_expose_message_and_code() {
        let body = ApiError::unauthorized("Sessione scaduta").to_json();
        assert_eq!(body["message"], "Sessione scaduta");
        assert_eq!(body["code"], "UNAUTHORIZED");
        assert_eq!(body["error"], true);
    }

    #[test]
    fn sql_errors_are_not_leaked() {
        let err: ApiError = crate::database::DatabaseError::Sqlx(sqlx::Error::RowNotFound).into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.message(), "Errore interno del server");
    }
}
