pub mod manager;
pub mod schema;
pub mod values;
pub mod query_builder;
pub mod crud;

pub use manager::{DatabaseManager, DatabaseError};
pub use schema::TableSchema;
pub use crud::{Change, CrudError, RequestInfo, WriteResult};
