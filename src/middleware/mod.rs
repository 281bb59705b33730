pub mod client_ip;
pub mod cors;
pub mod permission;
pub mod response;
pub mod validate_session;

pub use client_ip::ClientIp;
pub use cors::cors_layer;
pub use permission::{require_permission, PermissionGuard};
pub use response::{ApiResponse, ApiResult};
pub use validate_session::{validate_session_middleware, SessionUser};
