use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classified failure kinds surfaced to operators instead of raw errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown site or broken site setup; never retried
    Configuration,
    TransientNetwork,
    /// Login rejected or credential missing; permanent for this cycle
    Authentication,
    /// Claim action absent or already claimed; permanent for this cycle
    ClaimUnavailable,
    /// Another claim for the account was already in flight
    AlreadyBusy,
    ExhaustedRetries,
    LedgerWrite,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::Authentication => "authentication",
            ErrorKind::ClaimUnavailable => "claim_unavailable",
            ErrorKind::AlreadyBusy => "already_busy",
            ErrorKind::ExhaustedRetries => "exhausted_retries",
            ErrorKind::LedgerWrite => "ledger_write",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "configuration" => Ok(ErrorKind::Configuration),
            "transient_network" => Ok(ErrorKind::TransientNetwork),
            "authentication" => Ok(ErrorKind::Authentication),
            "claim_unavailable" => Ok(ErrorKind::ClaimUnavailable),
            "already_busy" => Ok(ErrorKind::AlreadyBusy),
            "exhausted_retries" => Ok(ErrorKind::ExhaustedRetries),
            "ledger_write" => Ok(ErrorKind::LedgerWrite),
            "internal" => Ok(ErrorKind::Internal),
            other => Err(format!("unknown error kind: {}", other)),
        }
    }
}

/// Result of a single login+claim attempt against a site
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { amount: f64 },
    TransientFailure { reason: String },
    PermanentFailure { kind: ErrorKind, reason: String },
}

impl Outcome {
    pub fn success(amount: f64) -> Self {
        Outcome::Success { amount }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Outcome::TransientFailure {
            reason: reason.into(),
        }
    }

    pub fn permanent(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Outcome::PermanentFailure {
            kind,
            reason: reason.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::TransientFailure { .. } => "transient_failure",
            Outcome::PermanentFailure { .. } => "permanent_failure",
        }
    }
}

/// Record of one attempt; created once by the executor and never changed
#[derive(Debug, Clone)]
pub struct ClaimAttempt {
    pub account_id: i64,
    pub started_at: DateTime<Utc>,
    /// 1-based
    pub attempt_number: u32,
    pub outcome: Outcome,
}

impl ClaimAttempt {
    pub fn amount_claimed(&self) -> Option<f64> {
        match &self.outcome {
            Outcome::Success { amount } => Some(*amount),
            _ => None,
        }
    }

    pub fn error_detail(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::TransientFailure { reason } | Outcome::PermanentFailure { reason, .. } => {
                Some(reason)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Claimed,
    Failed,
    Skipped,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Claimed => "claimed",
            ClaimStatus::Failed => "failed",
            ClaimStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "claimed" => Ok(ClaimStatus::Claimed),
            "failed" => Ok(ClaimStatus::Failed),
            "skipped" => Ok(ClaimStatus::Skipped),
            other => Err(format!("unknown claim status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimFailure {
    pub kind: ErrorKind,
    pub reason: String,
}

/// Terminal summary of one account in one dispatch cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimResult {
    pub account_id: i64,
    pub status: ClaimStatus,
    pub amount_claimed: f64,
    pub completed_at: DateTime<Utc>,
    pub attempts: u32,
    pub error: Option<ClaimFailure>,
    /// Set when the ledger append failed; the claim outcome itself stands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_error: Option<String>,
}

impl ClaimResult {
    pub fn claimed(account_id: i64, amount: f64, attempts: u32) -> Self {
        Self {
            account_id,
            status: ClaimStatus::Claimed,
            amount_claimed: amount,
            completed_at: Utc::now(),
            attempts,
            error: None,
            ledger_error: None,
        }
    }

    pub fn failed(account_id: i64, kind: ErrorKind, reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            account_id,
            status: ClaimStatus::Failed,
            amount_claimed: 0.0,
            completed_at: Utc::now(),
            attempts,
            error: Some(ClaimFailure {
                kind,
                reason: reason.into(),
            }),
            ledger_error: None,
        }
    }

    /// Placeholder for an account whose claim was already in flight
    pub fn skipped(account_id: i64) -> Self {
        Self {
            account_id,
            status: ClaimStatus::Skipped,
            amount_claimed: 0.0,
            completed_at: Utc::now(),
            attempts: 0,
            error: Some(ClaimFailure {
                kind: ErrorKind::AlreadyBusy,
                reason: "a claim for this account is already in progress".to_string(),
            }),
            ledger_error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ClaimStatus::Claimed
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn reason(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.reason.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_round_trips_through_strings() {
        for kind in [
            ErrorKind::Configuration,
            ErrorKind::TransientNetwork,
            ErrorKind::Authentication,
            ErrorKind::ClaimUnavailable,
            ErrorKind::AlreadyBusy,
            ErrorKind::ExhaustedRetries,
            ErrorKind::LedgerWrite,
            ErrorKind::Internal,
        ] {
            assert_eq!(kind.as_str().parse::<ErrorKind>(), Ok(kind));
        }
        assert!("bogus".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn test_skipped_result_is_not_a_failure_of_the_claim() {
        let result = ClaimResult::skipped(7);
        assert_eq!(result.status, ClaimStatus::Skipped);
        assert_eq!(result.error_kind(), Some(ErrorKind::AlreadyBusy));
        assert_eq!(result.attempts, 0);
        assert!(!result.is_success());
    }

    #[test]
    fn test_attempt_accessors() {
        let attempt = ClaimAttempt {
            account_id: 1,
            started_at: Utc::now(),
            attempt_number: 2,
            outcome: Outcome::transient("connection reset"),
        };
        assert_eq!(attempt.amount_claimed(), None);
        assert_eq!(attempt.error_detail(), Some("connection reset"));
    }
}
