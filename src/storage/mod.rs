pub mod db;
pub mod ledger;

pub use db::{Database, SiteRecord};
pub use ledger::{ClaimLedger, SqliteLedger};
