use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::services::AuthService;

#[derive(Subcommand)]
pub enum SessionCommands {
    #[command(about = "Delete every expired session")]
    Cleanup,
}

pub async fn handle(cmd: SessionCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SessionCommands::Cleanup => {
            let config = AppConfig::from_env();
            let pool = DatabaseManager::connect(&config).await?;
            let deleted = AuthService::new(pool.clone()).cleanup_expired().await?;
            pool.close().await;
            output_success(
                output_format,
                &format!("Removed {} expired sessions", deleted),
                Some(json!({"deleted": deleted})),
            )
        }
    }
}
