use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// What the retry loop should do with the result of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Finished successfully
    Done,
    /// Failed in a way worth trying again
    Retry,
    /// Failed in a way that retrying cannot fix
    Stop,
}

/// Final result of a retried operation
#[derive(Debug)]
pub struct Retried<R> {
    pub last: R,
    pub attempts: u32,
    /// The last attempt still asked for a retry but the budget ran out
    pub exhausted: bool,
}

/// Exponential backoff policy shared by the claim path and ledger writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the attempt with 0-based index `attempt_index`:
    /// `base * 2^index`, capped at the ceiling.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt_index).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Run `operation` until `classify` accepts or rejects its result, or the
    /// attempt budget is spent. Attempts are strictly sequential; only the
    /// calling task sleeps between them.
    pub async fn run<R, F, Fut, C>(&self, mut operation: F, mut classify: C) -> Retried<R>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = R>,
        C: FnMut(u32, &R) -> Disposition,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = operation(attempt).await;

            match classify(attempt, &result) {
                Disposition::Done | Disposition::Stop => {
                    return Retried {
                        last: result,
                        attempts: attempt,
                        exhausted: false,
                    };
                }
                Disposition::Retry if attempt >= self.max_attempts => {
                    return Retried {
                        last: result,
                        attempts: attempt,
                        exhausted: true,
                    };
                }
                Disposition::Retry => {
                    let delay = self.delay_for(attempt - 1);
                    debug!(
                        "Attempt {}/{} failed, backing off for {:?}",
                        attempt, self.max_attempts, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(200), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1), Duration::from_millis(1));
        assert_eq!(policy.max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_done() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(5));
        let started = Instant::now();

        let retried = policy
            .run(
                |attempt| async move { attempt },
                |_, attempt: &u32| {
                    if *attempt < 3 {
                        Disposition::Retry
                    } else {
                        Disposition::Done
                    }
                },
            )
            .await;

        assert_eq!(retried.last, 3);
        assert_eq!(retried.attempts, 3);
        assert!(!retried.exhausted);
        // 100ms after the first failure, 200ms after the second
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_short_circuits() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(5));
        let retried = policy
            .run(|attempt| async move { attempt }, |_, _| Disposition::Stop)
            .await;

        assert_eq!(retried.attempts, 1);
        assert!(!retried.exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_last_result() {
        let policy = RetryPolicy::new(4, Duration::from_millis(10), Duration::from_secs(1));
        let retried = policy
            .run(
                |attempt| async move { format!("failure {}", attempt) },
                |_, _| Disposition::Retry,
            )
            .await;

        assert_eq!(retried.attempts, 4);
        assert!(retried.exhausted);
        assert_eq!(retried.last, "failure 4");
    }
}
