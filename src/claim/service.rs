use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    accounts::AccountStore,
    claim::{
        batch::{BatchRun, BatchSummary},
        dispatcher::Dispatcher,
        outcome::ClaimResult,
    },
    error::{ClaimError, Result},
};

/// Entry point for scheduled and manual claims
pub struct ClaimService {
    store: Arc<dyn AccountStore>,
    dispatcher: Dispatcher,
}

impl ClaimService {
    pub fn new(store: Arc<dyn AccountStore>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Claim for every known account.
    ///
    /// Fails only when the account store cannot be read at all; per-account
    /// problems are reported inside the run.
    pub async fn run_batch(&self) -> Result<BatchRun> {
        let started_at = Utc::now();

        let accounts = self.store.list_accounts().await.map_err(|e| {
            error!("Could not load accounts for batch: {}", e);
            match e {
                ClaimError::AccountStoreUnavailable(_) => e,
                other => ClaimError::AccountStoreUnavailable(other.to_string()),
            }
        })?;

        if accounts.is_empty() {
            info!("No accounts to claim for");
        }

        let results = self.dispatcher.dispatch(accounts).await;
        let run = BatchRun::new(started_at, results);

        let summary = run.summary();
        info!(
            "Batch {} complete: {} claimed, {} failed, {} skipped, {:.2} total",
            run.run_id, summary.succeeded, summary.failed, summary.skipped, summary.total_claimed
        );
        if summary.unpersisted > 0 {
            error!(
                "Batch {}: {} results were not written to the ledger",
                run.run_id, summary.unpersisted
            );
        }

        Ok(run)
    }

    pub async fn dispatch_all(&self) -> Result<BatchSummary> {
        Ok(self.run_batch().await?.summary())
    }

    pub async fn dispatch_one(&self, account_id: i64) -> Result<ClaimResult> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(ClaimError::AccountNotFound(account_id))?;

        Ok(self.dispatcher.dispatch_one(account).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::store::MockAccountStore;
    use crate::claim::{
        executor::ClaimExecutor, outcome::Outcome, retry::RetryPolicy, strategy::StrategyRegistry,
    };
    use crate::test_support::{account, MemoryLedger, ScriptedStrategy};
    use std::time::Duration;

    fn service(store: MockAccountStore) -> (ClaimService, Arc<MemoryLedger>) {
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(ScriptedStrategy::always("chumba", Outcome::success(4.0))));
        let ledger = Arc::new(MemoryLedger::default());
        let executor = ClaimExecutor::new(
            Arc::new(registry),
            ledger.clone(),
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
        );
        let dispatcher = Dispatcher::new(Arc::new(executor), 2);
        (ClaimService::new(Arc::new(store), dispatcher), ledger)
    }

    #[tokio::test]
    async fn test_dispatch_all_summarises() {
        let mut store = MockAccountStore::new();
        store
            .expect_list_accounts()
            .times(1)
            .returning(|| Ok(vec![account(1, "chumba"), account(2, "chumba"), account(3, "nowhere")]));
        let (service, ledger) = service(store);

        let summary = service.dispatch_all().await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(ledger.results().len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_the_batch() {
        let mut store = MockAccountStore::new();
        store
            .expect_list_accounts()
            .returning(|| Err(ClaimError::Config("database locked".to_string())));
        let (service, ledger) = service(store);

        let err = service.dispatch_all().await.unwrap_err();
        assert!(matches!(err, ClaimError::AccountStoreUnavailable(_)));
        assert!(ledger.results().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_one() {
        let mut store = MockAccountStore::new();
        store
            .expect_get_account()
            .withf(|id| *id == 1)
            .returning(|_| Ok(Some(account(1, "chumba"))));
        store
            .expect_get_account()
            .withf(|id| *id != 1)
            .returning(|_| Ok(None));
        let (service, _) = service(store);

        let result = service.dispatch_one(1).await.unwrap();
        assert!(result.is_success());

        let err = service.dispatch_one(77).await.unwrap_err();
        assert!(matches!(err, ClaimError::AccountNotFound(77)));
    }
}
