pub mod column_service;
pub mod inventory_service;
pub mod module_service;
pub mod public_service;
pub mod row_service;
pub mod table_service;
pub mod token_service;
pub mod transfer_service;
pub mod user_service;

pub use column_service::ColumnService;
pub use inventory_service::InventoryService;
pub use module_service::ModuleService;
pub use public_service::PublicService;
pub use row_service::RowService;
pub use table_service::TableService;
pub use token_service::TokenService;
pub use transfer_service::TransferService;
pub use user_service::UserService;

use thiserror::Error;

use crate::auth::TokenError;
use crate::columns::ValidationError;
use crate::database::DatabaseError;
use crate::filter::FilterError;
use crate::modules::ModuleError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ServiceError {
    pub fn not_found(what: &str, id: &str) -> Self {
        ServiceError::NotFound(format!("{} not found: {}", what, id))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
