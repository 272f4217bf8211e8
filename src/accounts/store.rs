use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    accounts::Account,
    error::{ClaimError, Result},
    storage::Database,
};

/// Read-only source of claimable accounts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<Account>>;

    async fn get_account(&self, id: i64) -> Result<Option<Account>>;
}

/// Account store backed by the bot's SQLite database
pub struct SqliteAccountStore {
    db: Arc<Database>,
}

impl SqliteAccountStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        self.db
            .list_accounts()
            .map_err(|e| ClaimError::AccountStoreUnavailable(e.to_string()))
    }

    async fn get_account(&self, id: i64) -> Result<Option<Account>> {
        self.db.get_account(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_accounts_with_site_urls() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.upsert_site("chumba", "https://www.chumbacasino.com").unwrap();
        let id = db.add_account("chumba", "testuser1", "env:CHUMBA_PASSWORD").unwrap();
        db.add_account("luckyland", "testuser2", "LUCKYLAND_PASSWORD").unwrap();

        let store = SqliteAccountStore::new(db);
        let accounts = store.list_accounts().await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(
            accounts[0].site_base_url.as_deref(),
            Some("https://www.chumbacasino.com")
        );
        assert_eq!(accounts[1].site_base_url, None);

        let account = store.get_account(id).await.unwrap().unwrap();
        assert_eq!(account.username, "testuser1");
        assert!(store.get_account(9_999).await.unwrap().is_none());
    }
}
