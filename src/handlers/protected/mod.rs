// handlers/protected/mod.rs - endpoints behind `validate_session_middleware`
//
// Every handler here can rely on a `SessionUser` extension.
pub mod auth;
pub mod crud;
pub mod listing;
pub mod menu;
pub mod questionnaire;
pub mod utils;
