use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    #[error("No claim strategy registered for site: {0}")]
    StrategyNotFound(String),

    #[error("Credential unavailable: {0}")]
    Credential(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Account store unavailable: {0}")]
    AccountStoreUnavailable(String),

    #[error("Scheduler is already running")]
    SchedulerAlreadyRunning,

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ClaimError>;
