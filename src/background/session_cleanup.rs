//! Periodic removal of expired rows from `ANS_Sessioni`.
//!
//! The session middleware already deletes an expired token when it is
//! presented; this job catches the ones that never come back.

use std::time::Duration;

use sqlx::MySqlPool;
use tokio_util::sync::CancellationToken;

use crate::services::AuthService;

/// Run the cleanup loop every `every` until `cancel` is triggered.
pub async fn run(pool: MySqlPool, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Session cleanup job started");

    let auth = AuthService::new(pool);
    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session cleanup job stopping");
                break;
            }
            _ = interval.tick() => {
                match auth.cleanup_expired().await {
                    Ok(0) => tracing::debug!("Session cleanup: nothing expired"),
                    Ok(deleted) => tracing::info!(deleted, "Session cleanup: removed expired sessions"),
                    Err(e) => tracing::error!(error = %e, "Session cleanup failed"),
                }
            }
        }
    }
}
