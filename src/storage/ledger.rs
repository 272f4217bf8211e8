use async_trait::async_trait;
use rusqlite::ErrorCode;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    claim::{
        outcome::ClaimResult,
        retry::{Disposition, RetryPolicy},
    },
    error::{ClaimError, Result},
    storage::Database,
};

/// Append-only record of claim results
#[async_trait]
pub trait ClaimLedger: Send + Sync {
    async fn append(&self, result: &ClaimResult) -> Result<()>;

    /// Newest first, at most `limit` rows
    async fn history(&self, account_id: i64, limit: usize) -> Result<Vec<ClaimResult>>;
}

pub struct SqliteLedger {
    db: Arc<Database>,
    policy: RetryPolicy,
}

impl SqliteLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            policy: RetryPolicy::new(4, Duration::from_millis(50), Duration::from_secs(1)),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

fn is_contention(error: &ClaimError) -> bool {
    matches!(
        error,
        ClaimError::Database(rusqlite::Error::SqliteFailure(failure, _))
            if matches!(failure.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

#[async_trait]
impl ClaimLedger for SqliteLedger {
    async fn append(&self, result: &ClaimResult) -> Result<()> {
        let retried = self
            .policy
            .run(
                |_| async move { self.db.append_claim_result(result).map(|_| ()) },
                |_, written: &Result<()>| match written {
                    Ok(_) => Disposition::Done,
                    Err(e) if is_contention(e) => Disposition::Retry,
                    Err(_) => Disposition::Stop,
                },
            )
            .await;

        retried.last
    }

    async fn history(&self, account_id: i64, limit: usize) -> Result<Vec<ClaimResult>> {
        self.db.claim_history(account_id, limit)
    }
}
