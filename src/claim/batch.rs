use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::claim::outcome::{ClaimResult, ClaimStatus};

/// One full pass over the account set
#[derive(Debug, Clone, Serialize)]
pub struct BatchRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ClaimResult>,
}

impl BatchRun {
    pub fn new(started_at: DateTime<Utc>, results: Vec<ClaimResult>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            results,
        }
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_results(self.results.clone())
    }
}

/// Summary of batch processing results
#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_claimed: f64,
    /// Results whose ledger append failed
    pub unpersisted: usize,
    pub results: Vec<ClaimResult>,
}

impl BatchSummary {
    pub fn from_results(results: Vec<ClaimResult>) -> Self {
        let mut summary = BatchSummary {
            total: results.len(),
            ..Default::default()
        };

        for result in &results {
            match result.status {
                ClaimStatus::Claimed => {
                    summary.succeeded += 1;
                    summary.total_claimed += result.amount_claimed;
                }
                ClaimStatus::Failed => summary.failed += 1,
                ClaimStatus::Skipped => summary.skipped += 1,
            }
            if result.ledger_error.is_some() {
                summary.unpersisted += 1;
            }
        }

        summary.results = results;
        summary
    }

    /// Print a formatted summary to console
    pub fn print_summary(&self) {
        println!("\n=== Claim Batch Summary ===");
        println!("Total Accounts:  {}", self.total);
        println!("Succeeded:       {} ✓", self.succeeded);
        println!("Failed:          {} ✗", self.failed);
        println!("Skipped (busy):  {}", self.skipped);
        println!("Total Claimed:   {:.2}", self.total_claimed);
        if self.unpersisted > 0 {
            println!("NOT PERSISTED:   {} (ledger writes failed)", self.unpersisted);
        }
        println!("===========================");
    }

    /// Get success rate as percentage of attempted (non-skipped) accounts
    pub fn success_rate(&self) -> f64 {
        let attempted = self.total - self.skipped;
        if attempted == 0 {
            0.0
        } else {
            (self.succeeded as f64 / attempted as f64) * 100.0
        }
    }
}
