pub mod cache;
pub mod modules;
pub mod tokens;

pub use cache::cache_invalidate;
pub use modules::{module_disable, module_enable, module_install, module_list, module_uninstall};
pub use tokens::{token_create, token_delete, token_get, token_list, token_regenerate, token_update};
