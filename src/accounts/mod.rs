pub mod types;
pub mod store;

pub use types::Account;
pub use store::{AccountStore, SqliteAccountStore};
