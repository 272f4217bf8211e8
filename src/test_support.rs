//! Fakes shared by the unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::{
    accounts::{Account, AccountStore},
    claim::{ClaimResult, ClaimStrategy, Outcome},
    credentials::{Credential, CredentialResolver},
    error::{ClaimError, Result},
    storage::ClaimLedger,
};

pub fn account(id: i64, site: &str) -> Account {
    Account::new(id, site, &format!("user{}", id), &format!("env:PASSWORD_{}", id))
}

/// Observations of every call made to a [`ScriptedStrategy`]
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    instants: Arc<Mutex<Vec<Instant>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl CallLog {
    pub fn count(&self) -> usize {
        self.instants.lock().unwrap().len()
    }

    pub fn instants(&self) -> Vec<Instant> {
        self.instants.lock().unwrap().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

/// Replays a fixed list of outcomes; the last one repeats forever
pub struct ScriptedStrategy {
    site: String,
    script: Mutex<VecDeque<Outcome>>,
    last: Mutex<Outcome>,
    delay: Duration,
    calls: CallLog,
}

impl ScriptedStrategy {
    pub fn new(site: &str, outcomes: Vec<Outcome>) -> Self {
        let last = outcomes
            .last()
            .cloned()
            .unwrap_or_else(|| Outcome::success(0.0));
        Self {
            site: site.to_string(),
            script: Mutex::new(outcomes.into()),
            last: Mutex::new(last),
            delay: Duration::ZERO,
            calls: CallLog::default(),
        }
    }

    pub fn always(site: &str, outcome: Outcome) -> Self {
        Self::new(site, vec![outcome])
    }

    /// Simulate a slow site
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

#[async_trait]
impl ClaimStrategy for ScriptedStrategy {
    fn site(&self) -> &str {
        &self.site
    }

    async fn attempt(&self, _account: &Account) -> Outcome {
        self.calls.instants.lock().unwrap().push(Instant::now());
        let active = self.calls.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.max_active.fetch_max(active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        let outcome = match next {
            Some(outcome) => {
                *self.last.lock().unwrap() = outcome.clone();
                outcome
            }
            None => self.last.lock().unwrap().clone(),
        };

        self.calls.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// A strategy with a bug in it
pub struct PanicStrategy {
    site: String,
}

impl PanicStrategy {
    pub fn new(site: &str) -> Self {
        Self {
            site: site.to_string(),
        }
    }
}

#[async_trait]
impl ClaimStrategy for PanicStrategy {
    fn site(&self) -> &str {
        &self.site
    }

    async fn attempt(&self, account: &Account) -> Outcome {
        panic!("selector missing for account {}", account.id);
    }
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    rows: Mutex<Vec<ClaimResult>>,
}

impl MemoryLedger {
    pub fn results(&self) -> Vec<ClaimResult> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClaimLedger for MemoryLedger {
    async fn append(&self, result: &ClaimResult) -> Result<()> {
        self.rows.lock().unwrap().push(result.clone());
        Ok(())
    }

    async fn history(&self, account_id: i64, limit: usize) -> Result<Vec<ClaimResult>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| r.account_id == account_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Ledger whose storage is gone
pub struct FailingLedger;

#[async_trait]
impl ClaimLedger for FailingLedger {
    async fn append(&self, _result: &ClaimResult) -> Result<()> {
        Err(ClaimError::Other(anyhow::anyhow!("disk I/O error")))
    }

    async fn history(&self, _account_id: i64, _limit: usize) -> Result<Vec<ClaimResult>> {
        Ok(Vec::new())
    }
}

pub struct MemoryAccountStore {
    accounts: Vec<Account>,
}

impl MemoryAccountStore {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.clone())
    }

    async fn get_account(&self, id: i64) -> Result<Option<Account>> {
        Ok(self.accounts.iter().find(|a| a.id == id).cloned())
    }
}

/// Hands out one fixed password for every account
pub struct StaticCredentials(pub &'static str);

#[async_trait]
impl CredentialResolver for StaticCredentials {
    async fn resolve(&self, _account: &Account) -> Result<Credential> {
        Ok(Credential::new(self.0))
    }
}
