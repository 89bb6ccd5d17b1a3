use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Backstop timer armed next to every pending enhancement.
///
/// Runs `on_expiry` once `limit` elapses unless cancelled first. Dropping the
/// deadline cancels it, so whoever owns the pending state owns the timer.
#[derive(Debug)]
pub struct SafetyDeadline {
    token: CancellationToken,
    generation: u64,
}

impl SafetyDeadline {
    pub fn arm<F>(generation: u64, limit: Duration, on_expiry: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        // Measured from arming, not from when the task is first polled.
        let expires_at = Instant::now() + limit;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep_until(expires_at) => on_expiry(),
            }
        });
        Self { token, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for SafetyDeadline {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
