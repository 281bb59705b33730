pub mod auth_service;
pub mod menu_service;
pub mod permission_service;
pub mod questionnaire_service;

pub use auth_service::{AuthError, AuthService};
pub use menu_service::MenuService;
pub use permission_service::{PermissionError, PermissionService};
pub use questionnaire_service::{QuestionnaireError, QuestionnaireService};
