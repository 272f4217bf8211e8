use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    accounts::Account,
    claim::{
        outcome::{ClaimAttempt, ClaimResult, ErrorKind, Outcome},
        retry::{Disposition, RetryPolicy},
        strategy::{ClaimStrategy, StrategyRegistry},
    },
    storage::ClaimLedger,
};

/// Everything one executor run produced
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub result: ClaimResult,
    pub attempts: Vec<ClaimAttempt>,
}

/// Runs one account's claim: strategy lookup, retries with backoff and a
/// single ledger append per invocation.
pub struct ClaimExecutor {
    registry: Arc<StrategyRegistry>,
    ledger: Arc<dyn ClaimLedger>,
    policy: RetryPolicy,
}

impl ClaimExecutor {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        ledger: Arc<dyn ClaimLedger>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            ledger,
            policy,
        }
    }

    pub async fn run(&self, account: &Account) -> ClaimResult {
        self.execute(account).await.result
    }

    /// Claim for `account`, keeping the per-attempt trail
    pub async fn execute(&self, account: &Account) -> ExecutionReport {
        info!(
            "Claiming for account {} ({} @ {})",
            account.id, account.username, account.site_name
        );

        let (result, attempts) = match self.registry.resolve(&account.site_name) {
            Ok(strategy) => self.attempt_with_retries(account, strategy).await,
            Err(e) => {
                error!("Configuration error for account {}: {}", account.id, e);
                let result = ClaimResult::failed(account.id, ErrorKind::Configuration, e.to_string(), 0);
                (result, Vec::new())
            }
        };

        let result = self.record(result).await;
        ExecutionReport { result, attempts }
    }

    async fn attempt_with_retries(
        &self,
        account: &Account,
        strategy: Arc<dyn ClaimStrategy>,
    ) -> (ClaimResult, Vec<ClaimAttempt>) {
        let mut attempts = Vec::new();
        let max_attempts = self.policy.max_attempts();

        let retried = self
            .policy
            .run(
                |_| {
                    let strategy = strategy.clone();
                    async move {
                        let started_at = Utc::now();
                        (started_at, strategy.attempt(account).await)
                    }
                },
                |attempt_number, last: &(DateTime<Utc>, Outcome)| {
                    let (started_at, outcome) = last;
                    let disposition = match outcome {
                        Outcome::Success { amount } => {
                            info!(
                                account_id = account.id,
                                attempt = attempt_number,
                                "Claimed {:.2}",
                                amount
                            );
                            Disposition::Done
                        }
                        Outcome::TransientFailure { reason } => {
                            warn!(
                                account_id = account.id,
                                attempt = attempt_number,
                                max_attempts,
                                "Transient claim failure: {}",
                                reason
                            );
                            Disposition::Retry
                        }
                        Outcome::PermanentFailure { kind, reason } => {
                            warn!(
                                account_id = account.id,
                                attempt = attempt_number,
                                %kind,
                                "Permanent claim failure: {}",
                                reason
                            );
                            Disposition::Stop
                        }
                    };

                    attempts.push(ClaimAttempt {
                        account_id: account.id,
                        started_at: *started_at,
                        attempt_number,
                        outcome: outcome.clone(),
                    });
                    disposition
                },
            )
            .await;

        let (_, outcome) = retried.last;
        let result = match outcome {
            Outcome::Success { amount } => ClaimResult::claimed(account.id, amount, retried.attempts),
            Outcome::TransientFailure { reason } => {
                warn!(
                    "Giving up on account {} after {} attempts: {}",
                    account.id, retried.attempts, reason
                );
                ClaimResult::failed(account.id, ErrorKind::ExhaustedRetries, reason, retried.attempts)
            }
            Outcome::PermanentFailure { kind, reason } => {
                ClaimResult::failed(account.id, kind, reason, retried.attempts)
            }
        };

        (result, attempts)
    }

    /// Append the terminal result. A lost write is flagged on the result but
    /// never changes the claim outcome.
    pub async fn record(&self, mut result: ClaimResult) -> ClaimResult {
        if let Err(e) = self.ledger.append(&result).await {
            error!(
                account_id = result.account_id,
                status = %result.status,
                kind = %ErrorKind::LedgerWrite,
                "Claim result not persisted, reconcile manually: {}",
                e
            );
            result.ledger_error = Some(e.to_string());
        }
        result
    }
}
