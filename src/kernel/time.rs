use std::time::Duration;

/// Monotonic poll counter. Advanced once per observer iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick {
    pub frame: u64,
}

pub const TICK_MS: u64 = 200;

/// Upper bound on how long an enhancement may stay pending, whatever the configured delay.
pub const SAFETY_LIMIT_MS: u64 = 30_000;

/// Backward playback jump (seconds) treated as a video swap.
pub const REWIND_THRESHOLD_SECS: f64 = 3.0;

impl Tick {
    pub fn new() -> Self {
        Tick { frame: 0 }
    }

    pub fn next(&self) -> Self {
        Tick { frame: self.frame + 1 }
    }
}

/// Whole seconds left until `deadline`, rounded down and never negative.
pub fn remaining_whole_secs(deadline: tokio::time::Instant, now: tokio::time::Instant) -> u64 {
    deadline.saturating_duration_since(now).as_secs()
}

pub fn secs(delay: i64) -> Duration {
    Duration::from_secs(delay.max(0) as u64)
}
