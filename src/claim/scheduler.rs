use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::{
    claim::{batch::BatchSummary, outcome::ClaimResult, service::ClaimService},
    error::{ClaimError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// What a manual trigger produced
#[derive(Debug, Clone)]
pub enum ManualTrigger {
    Batch(BatchSummary),
    Single(ClaimResult),
}

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs a full batch on a fixed cadence, one tick at a time
pub struct Scheduler {
    service: Arc<ClaimService>,
    interval: Duration,
    running: Mutex<Option<RunningLoop>>,
}

impl Scheduler {
    pub fn new(service: Arc<ClaimService>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            running: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn state(&self) -> SchedulerState {
        match self.running.lock().await.as_ref() {
            Some(running) if !running.handle.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    /// Begin ticking. The first batch runs one interval from now.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if let Some(existing) = running.as_ref() {
            if !existing.handle.is_finished() {
                return Err(ClaimError::SchedulerAlreadyRunning);
            }
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(self.service.clone(), self.interval, shutdown_rx));

        info!("Scheduler started (interval: {:?})", self.interval);
        *running = Some(RunningLoop { shutdown, handle });
        Ok(())
    }

    /// Ask the loop to exit and wait for it. A batch already in progress is
    /// allowed to finish; no further ticks are scheduled.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            error!("Scheduler loop ended abnormally: {}", e);
        }
        info!("Scheduler stopped");
    }

    /// Run immediately, outside the timer, for one account or for all of them
    pub async fn trigger_now(&self, account_id: Option<i64>) -> Result<ManualTrigger> {
        match account_id {
            Some(id) => {
                info!("Manual claim triggered for account {}", id);
                Ok(ManualTrigger::Single(self.service.dispatch_one(id).await?))
            }
            None => {
                info!("Manual batch triggered");
                Ok(ManualTrigger::Batch(self.service.dispatch_all().await?))
            }
        }
    }
}

async fn run_loop(service: Arc<ClaimService>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        tick += 1;
        info!("Scheduled tick {} starting", tick);

        // Not raced against shutdown: an in-flight batch always completes
        match service.run_batch().await {
            Ok(run) => {
                let summary = run.summary();
                info!(
                    "Scheduled tick {} done: {}/{} claimed",
                    tick, summary.succeeded, summary.total
                );
            }
            Err(e) => {
                warn!("Scheduled tick {} failed: {}", tick, e);
            }
        }

        if *shutdown.borrow() {
            break;
        }
    }

    info!("Scheduler loop exited after {} ticks", tick);
}
