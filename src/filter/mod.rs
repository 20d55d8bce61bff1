pub mod error;
pub mod filter;
pub mod filter_where;
pub mod types;

pub use error::FilterError;
pub use filter::Filter;
pub use filter_where::FilterWhere;
pub use types::{Page, PaginationInfo};
