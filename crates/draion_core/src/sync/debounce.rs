//! Single-deadline debounce timer.
//!
//! A debouncer holds at most one pending deadline. Restarting it replaces the
//! deadline instead of stacking another one, so a burst of edits produces one
//! firing `delay` after the last edit.

use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// Upper bound on a debounce delay, whatever the caller asks for.
const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: delay.min(MAX_DELAY),
            deadline: None,
        }
    }

    /// Arm (or re-arm) the timer `delay` from now.
    pub fn reset(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    /// Disarm without firing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolve once the current deadline passes, disarming the timer.
    ///
    /// Never resolves while disarmed. Cancel-safe: dropping the future before
    /// it completes leaves the deadline in place.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let mut debouncer = Debouncer::new(Duration::from_millis(800));
        debouncer.reset();
        let started = Instant::now();

        debouncer.fired().await;
        assert!(started.elapsed() >= Duration::from_millis(800));
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_pushes_deadline() {
        let mut debouncer = Debouncer::new(Duration::from_millis(800));
        debouncer.reset();
        advance(Duration::from_millis(500)).await;
        debouncer.reset();

        // The first deadline would have passed at 800ms.
        assert!(
            timeout(Duration::from_millis(700), debouncer.fired())
                .await
                .is_err()
        );
        assert!(debouncer.is_pending());
        assert!(
            timeout(Duration::from_millis(200), debouncer.fired())
                .await
                .is_ok()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_delay_is_capped() {
        let mut debouncer = Debouncer::new(Duration::from_millis(u64::MAX));
        debouncer.reset();
        assert!(debouncer.is_pending());
        assert!(
            timeout(MAX_DELAY + Duration::from_secs(1), debouncer.fired())
                .await
                .is_ok()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_never_fires() {
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        debouncer.reset();
        debouncer.cancel();
        assert!(
            timeout(Duration::from_secs(10), debouncer.fired())
                .await
                .is_err()
        );
    }
}
