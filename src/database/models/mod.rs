pub mod column;
pub mod module;
pub mod row;
pub mod table;
pub mod token;
pub mod user;

pub use column::{Column, ColumnRecord, ColumnUpdate, ColumnValidation, NewColumn};
pub use module::ModuleRecord;
pub use row::{DataRow, DataRowRecord};
pub use table::{NewTable, PublicTable, TableUpdate, UserTable, UserTableRecord};
pub use token::{ApiTokenRecord, ApiTokenView, NewToken, TokenUpdate};
pub use user::User;
