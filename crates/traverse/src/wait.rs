//! Bounded waiting on observable page conditions.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Stand-in for deadlines too far away to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Polls `sample` every `poll` until it returns `true` or `timeout` elapses.
///
/// Returns whether the condition was met. The condition is always evaluated at
/// least once, even with a zero timeout, so an already-satisfied condition
/// never costs a sleep.
pub async fn wait_until<F, Fut>(timeout: Duration, poll: Duration, mut sample: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = deadline(timeout);
    loop {
        if sample().await {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        sleep(poll.min(deadline - now)).await;
    }
}

/// Polls `sample` every `poll` until its value has not changed for `quiet`, or
/// `timeout` elapses.
///
/// Returns whether the value settled. A sample that fails (`None`) never
/// counts as settled and restarts the quiet period.
pub async fn wait_until_stable<F, Fut, T>(timeout: Duration, poll: Duration, quiet: Duration, mut sample: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
    T: PartialEq,
{
    let deadline = deadline(timeout);
    let mut last: Option<(T, Instant)> = None;
    loop {
        let now = Instant::now();
        match sample().await {
            Some(value) => match last.take() {
                Some((previous, since)) if previous == value => {
                    if now.duration_since(since) >= quiet {
                        return true;
                    }
                    last = Some((value, since));
                },
                _ if quiet.is_zero() => return true,
                _ => last = Some((value, now)),
            },
            None => last = None,
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        sleep(poll.min(deadline - now)).await;
    }
}

/// Sleep for a settle delay, skipping the timer entirely for zero delays.
pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}
