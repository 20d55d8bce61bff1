pub mod catalogue;
pub mod health;
pub mod inventory;

pub use catalogue::{item_get, items_list, records_list, tables_list, tables_search, values_list};
pub use health::{health, root};
pub use inventory::{buy, item_availability, release, rent};
