pub mod accounts;
pub mod claim;
pub mod config;
pub mod credentials;
pub mod error;
pub mod sites;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Result, ClaimError};
pub use config::Config;
