//! Periodic pass runner.
//!
//! One sync pass per interval, never overlapping: the next sleep only starts
//! once the previous pass has finished applying mutations. Failed passes are
//! retried with exponential backoff up to a cap, and a long enough failure
//! streak aborts the process so the scheduler sees a misconfigured sidecar
//! instead of a silently idle one.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Pause between successful passes.
    pub interval: Duration,
    /// Consecutive failed passes tolerated before giving up.
    pub max_consecutive_failures: u32,
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

/// Run `pass_fn` forever, one invocation per interval.
///
/// # Panics
/// Panics once `max_consecutive_failures` passes have failed back to back; a
/// pass that keeps failing (for example a revoked credential) must surface to
/// the scheduler instead of spinning unnoticed.
pub async fn run_periodic<F, Fut>(task: &str, config: RunnerConfig, mut pass_fn: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), String>>,
{
    let mut failures: u32 = 0;
    let mut delay = config.initial_retry_delay;

    loop {
        match pass_fn().await {
            Ok(()) => {
                if failures > 0 {
                    warn!(task, failures, "pass recovered");
                }
                failures = 0;
                delay = config.initial_retry_delay;
                sleep(config.interval).await;
            }
            Err(e) => {
                failures += 1;
                error!(
                    task,
                    failures,
                    limit = config.max_consecutive_failures,
                    %e,
                    "pass failed"
                );

                if failures >= config.max_consecutive_failures {
                    panic!(
                        "sync runner '{}' gave up after {} consecutive failed passes; last error: {}",
                        task, failures, e
                    );
                }

                warn!(task, retry_in = ?delay, "pass will be retried");
                sleep(delay).await;
                delay = std::cmp::min(delay * 2, config.max_retry_delay);
            }
        }
    }
}
