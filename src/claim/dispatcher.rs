use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    accounts::Account,
    claim::{
        busy::BusyAccounts,
        executor::ClaimExecutor,
        outcome::{ClaimResult, ErrorKind},
    },
};

/// Fans accounts out to at most `pool_size` concurrent executor runs.
///
/// Every input account yields exactly one result. An account that already
/// has a claim in flight, from this dispatch or any other trigger sharing the
/// same [`BusyAccounts`], yields a `Skipped` placeholder instead.
#[derive(Clone)]
pub struct Dispatcher {
    executor: Arc<ClaimExecutor>,
    pool_size: usize,
    busy: BusyAccounts,
}

impl Dispatcher {
    pub fn new(executor: Arc<ClaimExecutor>, pool_size: usize) -> Self {
        Self {
            executor,
            pool_size: pool_size.max(1),
            busy: BusyAccounts::new(),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn busy_accounts(&self) -> &BusyAccounts {
        &self.busy
    }

    /// Claim for every account; results arrive in completion order
    pub async fn dispatch(&self, accounts: Vec<Account>) -> Vec<ClaimResult> {
        let total = accounts.len();
        info!(
            "Dispatching {} accounts across {} workers",
            total, self.pool_size
        );

        let results: Vec<ClaimResult> = stream::iter(accounts)
            .map(|account| self.dispatch_one(account))
            .buffer_unordered(self.pool_size)
            .collect()
            .await;

        debug!("Dispatch finished: {}/{} results collected", results.len(), total);
        results
    }

    /// Claim for a single account, subject to the same busy check
    pub async fn dispatch_one(&self, account: Account) -> ClaimResult {
        let account_id = account.id;

        let guard = match self.busy.try_acquire(account_id) {
            Some(guard) => guard,
            None => {
                warn!("Account {} already has a claim in flight, skipping", account_id);
                return ClaimResult::skipped(account_id);
            }
        };

        let executor = self.executor.clone();
        let handle = tokio::spawn(async move {
            // Moved in so the marker is released however the task ends
            let _guard = guard;
            executor.run(&account).await
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Claim task for account {} crashed: {}", account_id, e);
                let reason = if e.is_panic() {
                    "claim task panicked"
                } else {
                    "claim task was cancelled"
                };
                let result = ClaimResult::failed(account_id, ErrorKind::Internal, reason, 0);
                self.executor.record(result).await
            }
        }
    }
}
