use std::sync::Arc;

use sqlx::MySqlPool;

use crate::config::AppConfig;
use crate::services::{AuthService, MenuService, PermissionService, QuestionnaireService};

/// Shared application state passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub pool: MySqlPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: MySqlPool, config: AppConfig) -> Self {
        Self { pool, config: Arc::new(config) }
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.pool.clone())
    }

    pub fn permissions(&self) -> PermissionService {
        PermissionService::new(self.pool.clone())
    }

    pub fn menus(&self) -> MenuService {
        MenuService::new(self.pool.clone())
    }

    pub fn questionnaires(&self) -> QuestionnaireService {
        QuestionnaireService::new(self.pool.clone())
    }
}
