//! Bounded polling

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::trace;

use crate::BootstrapError;

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Outcome of a bounded poll
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    /// The deadline passed; carries the time spent waiting
    Elapsed(Duration),
}

/// Call `probe` until it yields a value or `policy.timeout` elapses
///
/// The probe runs once more at the deadline, so a condition that becomes true
/// during the last sleep is still seen. Probe errors abort immediately.
pub async fn poll_until<T, F, Fut>(
    policy: PollPolicy,
    mut probe: F,
) -> Result<PollOutcome<T>, BootstrapError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, BootstrapError>>,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if let Some(value) = probe().await? {
            trace!("Poll ready after {} attempts", attempt);
            return Ok(PollOutcome::Ready(value));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(PollOutcome::Elapsed(now - start));
        }

        sleep(policy.interval.min(deadline - now)).await;
    }
}
