pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5002";

#[derive(Parser)]
#[command(name = "siquest")]
#[command(about = "SiQuest CLI - administration of the questionnaire backend")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Check server health status from the /health endpoint")]
    Health {
        #[arg(long, env = "SIQUEST_URL", default_value = DEFAULT_SERVER_URL, help = "Server base URL")]
        url: String,
    },

    #[command(about = "Log in and print the session token")]
    Login {
        #[arg(help = "Username")]
        username: String,
        #[arg(long, env = "SIQUEST_PASSWORD", help = "Password")]
        password: String,
        #[arg(long, env = "SIQUEST_URL", default_value = DEFAULT_SERVER_URL, help = "Server base URL")]
        url: String,
    },

    #[command(about = "Session maintenance against the database")]
    Sessions {
        #[command(subcommand)]
        cmd: commands::sessions::SessionCommands,
    },

    #[command(about = "Print the stored form of a password")]
    HashPassword {
        #[arg(help = "Plain password")]
        password: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Health { url } => commands::server::health(&url, output_format).await,
        Commands::Login { username, password, url } => {
            commands::server::login(&url, &username, &password, output_format).await
        }
        Commands::Sessions { cmd } => commands::sessions::handle(cmd, output_format).await,
        Commands::HashPassword { password } => commands::password::hash(&password, output_format),
    }
}
