// Handler tiers, all but health behind API token auth:
// public    -> /api/public/* read-only catalogue plus inventory actions (raw JSON bodies)
// protected -> /api/tables/*, /api/column-types (read/write/delete permissions, envelope)
// elevated  -> /api/tokens/*, /api/modules/*, /api/cache/* (admin permission, envelope)
pub mod elevated;
pub mod protected;
pub mod public;
