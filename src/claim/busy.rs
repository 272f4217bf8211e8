use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Accounts that currently have a claim in flight.
///
/// Shared by every dispatch path so overlapping triggers never run two
/// executors for the same account.
#[derive(Debug, Default, Clone)]
pub struct BusyAccounts {
    inner: Arc<Mutex<HashSet<i64>>>,
}

impl BusyAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<i64>> {
        // The set stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark `account_id` busy, or return `None` if it already is
    pub fn try_acquire(&self, account_id: i64) -> Option<BusyGuard> {
        if !self.lock().insert(account_id) {
            return None;
        }

        Some(BusyGuard {
            accounts: self.clone(),
            account_id,
        })
    }

    pub fn is_busy(&self, account_id: i64) -> bool {
        self.lock().contains(&account_id)
    }

    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }
}

/// Clears the busy marker when dropped, including during unwinding
#[derive(Debug)]
pub struct BusyGuard {
    accounts: BusyAccounts,
    account_id: i64,
}

impl BusyGuard {
    pub fn account_id(&self) -> i64 {
        self.account_id
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.accounts.lock().remove(&self.account_id);
        debug!("Released busy marker for account {}", self.account_id);
    }
}
