use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub sessions: SessionConfig,
    pub crud: CrudConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL; when absent it is composed from the DB_* parts
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub require_on_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Allowed browser origins; `*` matches any run of characters except `/` and `:`
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub default_duration_minutes: i64,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrudConfig {
    pub allowed_tables: Vec<String>,
    /// Function checked when a table has no entry in the function catalogue
    pub default_function_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
}

const DEFAULT_ALLOWED_TABLES: &[&str] = &[
    "ANS_Utenti",
    "ANS_Questionari",
    "ANS_DomandeQuestionari",
    "ANS_RisposteQuestionari",
    "CNF_RisposteProposte",
    "ANS_TipiDomande",
    "DOM_TipiDomande",
];

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("SIQUEST_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SIQUEST_API_HOST") {
            self.server.host = v;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DB_HOST") {
            self.database.host = v;
        }
        if let Ok(v) = env::var("DB_PORT") {
            self.database.port = v.parse().unwrap_or(self.database.port);
        }
        if let Ok(v) = env::var("DB_USER") {
            self.database.user = v;
        }
        if let Ok(v) = env::var("DB_PASSWORD") {
            self.database.password = v;
        }
        if let Ok(v) = env::var("DB_NAME") {
            self.database.name = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_REQUIRE_ON_STARTUP") {
            self.database.require_on_startup = v.parse().unwrap_or(self.database.require_on_startup);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_DEFAULT_DURATION_MINUTES") {
            self.sessions.default_duration_minutes =
                v.parse().unwrap_or(self.sessions.default_duration_minutes);
        }
        if let Ok(v) = env::var("SESSION_CLEANUP_INTERVAL_SECS") {
            self.sessions.cleanup_interval_secs = v.parse().unwrap_or(self.sessions.cleanup_interval_secs);
        }

        // CRUD overrides
        if let Ok(v) = env::var("CRUD_ALLOWED_TABLES") {
            self.crud.allowed_tables = split_list(&v);
        }
        if let Ok(v) = env::var("CRUD_DEFAULT_FUNCTION_ID") {
            self.crud.default_function_id = v.parse().unwrap_or(self.crud.default_function_id);
        }

        if let Ok(v) = env::var("LOG_FILTER") {
            self.logging.filter = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { host: "0.0.0.0".to_string(), port: 5002 },
            database: DatabaseConfig {
                url: None,
                host: "localhost".to_string(),
                port: 3306,
                user: "siquest".to_string(),
                password: String::new(),
                name: "ANSSIQUEST".to_string(),
                max_connections: 10,
                connection_timeout: 30,
                require_on_startup: true,
            },
            security: SecurityConfig {
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:3001".to_string(),
                    "http://192.168.5.*:3000".to_string(),
                ],
            },
            sessions: SessionConfig {
                default_duration_minutes: 30,
                cleanup_interval_secs: 60,
            },
            crud: CrudConfig {
                allowed_tables: default_tables(),
                default_function_id: 10,
            },
            logging: LoggingConfig { filter: "siquest_api=debug,tower_http=debug,info".to_string() },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.connection_timeout = 10;
        config.security.cors_origins = vec!["http://10.10.100.50:3000".to_string()];
        config.logging.filter = "siquest_api=info,tower_http=info,warn".to_string();
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.connection_timeout = 5;
        config.security.cors_origins = vec![
            "http://10.10.100.50:3000".to_string(),
            "http://10.10.100.50:4000".to_string(),
            "http://questionari.centrochirurgicotoscano.it:3000".to_string(),
            "http://questionari.centrochirurgicotoscano.it:4000".to_string(),
        ];
        config.logging.filter = "siquest_api=info,warn".to_string();
        config
    }

    /// Connection URL for the pool, composed from the DB_* parts unless DATABASE_URL is set
    pub fn database_url(&self) -> Result<String, url::ParseError> {
        if let Some(url) = &self.database.url {
            return Ok(url.clone());
        }

        let db = &self.database;
        let mut url = url::Url::parse(&format!("mysql://{}:{}", db.host, db.port))?;
        // set_username/set_password only fail for cannot-be-a-base URLs
        let _ = url.set_username(&db.user);
        if !db.password.is_empty() {
            let _ = url.set_password(Some(&db.password));
        }
        url.set_path(&format!("/{}", db.name));
        Ok(url.into())
    }

    pub fn is_allowed_table(&self, table: &str) -> bool {
        self.crud.allowed_tables.iter().any(|t| t == table)
    }
}

fn default_tables() -> Vec<String> {
    DEFAULT_ALLOWED_TABLES.iter().map(|s| s.to_string()).collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults_match_legacy_deployment() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 5002);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.sessions.default_duration_minutes, 30);
        assert_eq!(config.sessions.cleanup_interval_secs, 60);
        assert_eq!(config.crud.default_function_id, 10);
        assert!(config.is_allowed_table("ANS_Utenti"));
        assert!(config.is_allowed_table("CNF_RisposteProposte"));
        assert!(!config.is_allowed_table("ANS_Sessioni"));
    }

    #[test]
    fn production_restricts_origins() {
        let config = AppConfig::production();
        assert!(config
            .security
            .cors_origins
            .iter()
            .all(|o| !o.contains("localhost")));
    }

    #[test]
    fn composes_database_url_from_parts() {
        let mut config = AppConfig::development();
        config.database.user = "simeds".to_string();
        config.database.password = "p@ss".to_string();
        config.database.host = "db.local".to_string();
        let url = config.database_url().unwrap();
        assert!(url.starts_with("mysql://simeds:"), "{url}");
        assert!(url.ends_with("@db.local:3306/ANSSIQUEST"), "{url}");
        assert!(!url.contains("p@ss@"), "password must be percent-encoded: {url}");
    }

    #[test]
    fn explicit_database_url_wins() {
        let mut config = AppConfig::development();
        config.database.url = Some("mysql://root@127.0.0.1/test".to_string());
        assert_eq!(config.database_url().unwrap(), "mysql://root@127.0.0.1/test");
    }

    #[test]
    fn splits_comma_lists() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
    }
}
