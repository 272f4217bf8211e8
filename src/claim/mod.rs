pub mod outcome;
pub mod retry;
pub mod strategy;
pub mod executor;
pub mod busy;
pub mod dispatcher;
pub mod batch;
pub mod service;
pub mod scheduler;

pub use outcome::{ClaimAttempt, ClaimFailure, ClaimResult, ClaimStatus, ErrorKind, Outcome};
pub use retry::{Disposition, RetryPolicy};
pub use strategy::{ClaimStrategy, StrategyRegistry};
pub use executor::{ClaimExecutor, ExecutionReport};
pub use busy::{BusyAccounts, BusyGuard};
pub use dispatcher::Dispatcher;
pub use batch::{BatchRun, BatchSummary};
pub use service::ClaimService;
pub use scheduler::{ManualTrigger, Scheduler, SchedulerState};
