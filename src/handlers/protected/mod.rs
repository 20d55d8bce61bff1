pub mod columns;
pub mod rows;
pub mod tables;
pub mod transfer;

pub use columns::{column_create, column_delete, column_list, column_types, column_update};
pub use rows::{row_create, row_delete, row_delete_all, row_get, row_list, row_update};
pub use tables::{table_create, table_delete, table_get, table_list, table_update};
pub use transfer::{table_export, table_generate, table_import};

use crate::auth::{AuthToken, Permission};
use crate::database::models::UserTable;
use crate::error::ApiError;
use crate::server::AppState;
use crate::services::ServiceError;

/// Resolve a table for the admin API after checking `permission`. Tables of
/// other users are reported as missing; own tables outside the token's scope
/// are forbidden.
pub(crate) async fn managed_table(
    state: &AppState,
    token: &AuthToken,
    table_id: &str,
    permission: Permission,
) -> Result<UserTable, ApiError> {
    token.require(permission)?;

    let table = state.tables().get(table_id).await?;
    if table.user_id != token.user_id {
        return Err(ServiceError::not_found("Table", table_id).into());
    }
    if !token.can_manage(&table) {
        return Err(ApiError::forbidden("Table is not accessible with this token"));
    }
    Ok(table)
}
