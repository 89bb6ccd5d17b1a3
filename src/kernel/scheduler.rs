use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::cancel::SafetyDeadline;
use super::classifier;
use super::time::{remaining_whole_secs, secs, SAFETY_LIMIT_MS};
use crate::page::{PageActuator, PageSensor};
use crate::settings::PreferenceSource;

/// Public view of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleStatus {
    Idle,
    Scheduled { firing_at: Instant },
}

/// Result of a scheduling attempt on `PromotionStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleAttempt {
    Armed { firing_at: Instant },
    NotPromotional,
    Disabled,
    InvalidDelay,
    PreferencesUnavailable,
}

/// What a tick did to the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Counting { remaining_secs: u64 },
    /// The promotion disappeared mid-wait.
    Aborted,
    Fired { activated: usize },
    /// Still a promotion at fire time but no skip control to activate.
    NoControls,
    /// Not a promotion any more at fire time.
    Stale,
}

/// Why a pending enhancement was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    Replaced,
    GateFailed,
    Cancelled,
    PromotionEnded,
    StateFlipped,
    Fired,
    SafetyDeadline,
    VideoChanged,
}

#[derive(Debug)]
struct PendingEnhancement {
    firing_at: Instant,
    last_verdict: Option<bool>,
    deadline: SafetyDeadline,
}

struct SchedulerCore {
    sensor: Arc<dyn PageSensor>,
    page: Arc<dyn PageActuator>,
    preferences: Arc<dyn PreferenceSource>,
    safety_limit: Duration,
    pending: Option<PendingEnhancement>,
    generation: u64,
}

impl SchedulerCore {
    /// Drops `firing_at`, cancels the deadline and removes the countdown, together.
    /// Returns whether anything was pending.
    fn clear(&mut self, reason: ClearReason) -> bool {
        // Dropping the pending value cancels its deadline.
        let was_pending = self.pending.take().is_some();
        self.page.remove_countdown();
        if was_pending {
            debug!("Enhancement cleared: {:?}", reason);
        }
        was_pending
    }

    fn is_promotional(&self) -> bool {
        classifier::is_promotional(&self.sensor.ad_markers())
    }

    fn expire(&mut self, generation: u64) {
        let current = self
            .pending
            .as_ref()
            .is_some_and(|p| p.deadline.generation() == generation);
        if current {
            warn!("Safety deadline reached, forcing cleanup");
            self.clear(ClearReason::SafetyDeadline);
        }
    }
}

/// Final verification and activation. Runs without the core lock held, so an
/// actuator may call back into the scheduler.
fn fire(sensor: &dyn PageSensor, page: &dyn PageActuator) -> TickOutcome {
    if !classifier::is_promotional(&sensor.ad_markers()) {
        info!("Not a promotion at enhancement time, aborting");
        return TickOutcome::Stale;
    }

    let controls = sensor.skip_controls();
    if controls.is_empty() {
        warn!("No skip controls found even though a promotion is showing");
        return TickOutcome::NoControls;
    }

    let mut activated = 0;
    for control in &controls {
        match page.activate(control) {
            Ok(()) => activated += 1,
            Err(e) => warn!("Failed to activate {}: {}", control.id, e),
        }
    }
    info!("Enhancement fired on {}/{} controls", activated, controls.len());
    TickOutcome::Fired { activated }
}

/// Idle/Scheduled state machine deciding when to activate skip controls.
///
/// A schedule is only armed after the promotion is confirmed, re-checked on
/// every tick while waiting, and confirmed once more at fire time. The
/// safety deadline bounds how long anything can stay pending.
///
/// Preference lookups and countdown rendering run under the scheduler lock;
/// implementations of those traits must not call back into the scheduler.
/// Skip-control activation is the exception and runs unlocked.
#[derive(Clone)]
pub struct EnhancementScheduler {
    core: Arc<Mutex<SchedulerCore>>,
}

fn lock(core: &Mutex<SchedulerCore>) -> MutexGuard<'_, SchedulerCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EnhancementScheduler {
    pub fn new(
        sensor: Arc<dyn PageSensor>,
        page: Arc<dyn PageActuator>,
        preferences: Arc<dyn PreferenceSource>,
    ) -> Self {
        Self::with_safety_limit(sensor, page, preferences, Duration::from_millis(SAFETY_LIMIT_MS))
    }

    pub fn with_safety_limit(
        sensor: Arc<dyn PageSensor>,
        page: Arc<dyn PageActuator>,
        preferences: Arc<dyn PreferenceSource>,
        safety_limit: Duration,
    ) -> Self {
        Self {
            core: Arc::new(Mutex::new(SchedulerCore {
                sensor,
                page,
                preferences,
                safety_limit,
                pending: None,
                generation: 0,
            })),
        }
    }

    pub fn status(&self) -> ScheduleStatus {
        match &lock(&self.core).pending {
            Some(p) => ScheduleStatus::Scheduled { firing_at: p.firing_at },
            None => ScheduleStatus::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status() == ScheduleStatus::Idle
    }

    pub fn on_promotion_started(&self) -> ScheduleAttempt {
        let weak: Weak<Mutex<SchedulerCore>> = Arc::downgrade(&self.core);
        let mut core = lock(&self.core);

        if !core.is_promotional() {
            core.clear(ClearReason::GateFailed);
            return ScheduleAttempt::NotPromotional;
        }

        let identity = core.sensor.creator_identity();
        let preference = match core.preferences.preferences(&identity.creator_id) {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not read preferences for '{}': {}", identity.creator_id, e);
                core.clear(ClearReason::GateFailed);
                return ScheduleAttempt::PreferencesUnavailable;
            }
        };

        if !preference.active {
            debug!("Enhancement disabled for '{}'", identity.creator_id);
            core.clear(ClearReason::GateFailed);
            return ScheduleAttempt::Disabled;
        }

        if preference.enhance_delay_seconds < 0 {
            core.clear(ClearReason::GateFailed);
            return ScheduleAttempt::InvalidDelay;
        }

        // The page may have moved on while preferences were read.
        if !core.is_promotional() {
            core.clear(ClearReason::GateFailed);
            return ScheduleAttempt::NotPromotional;
        }

        core.clear(ClearReason::Replaced);
        core.generation += 1;
        let generation = core.generation;

        // A delay past the clock's range lands beyond the safety deadline, which clears it first.
        let now = Instant::now();
        let firing_at = now
            .checked_add(secs(preference.enhance_delay_seconds))
            .unwrap_or(now + core.safety_limit.saturating_mul(2));
        let deadline = SafetyDeadline::arm(generation, core.safety_limit, move || {
            if let Some(core) = weak.upgrade() {
                lock(&core).expire(generation);
            }
        });

        core.pending = Some(PendingEnhancement {
            firing_at,
            last_verdict: None,
            deadline,
        });
        core.page
            .render_countdown(preference.enhance_delay_seconds as u64);

        info!(
            "Enhancement scheduled in {}s (creator '{}')",
            preference.enhance_delay_seconds, identity.creator_id
        );
        ScheduleAttempt::Armed { firing_at }
    }

    pub fn on_tick(&self) -> TickOutcome {
        let mut core = lock(&self.core);
        let now = Instant::now();

        let Some(firing_at) = core.pending.as_ref().map(|p| p.firing_at) else {
            return TickOutcome::Idle;
        };

        let remaining_secs = remaining_whole_secs(firing_at, now);
        core.page.render_countdown(remaining_secs);

        let current = core.is_promotional();
        let flipped = core
            .pending
            .as_ref()
            .is_some_and(|p| p.last_verdict == Some(true) && !current);
        if flipped {
            info!("Promotion state changed mid-wait, aborting enhancement");
            core.clear(ClearReason::StateFlipped);
            return TickOutcome::Aborted;
        }

        if let Some(pending) = core.pending.as_mut() {
            pending.last_verdict = Some(current);
        }

        if now >= firing_at {
            core.clear(ClearReason::Fired);
            let sensor = Arc::clone(&core.sensor);
            let page = Arc::clone(&core.page);
            drop(core);
            return fire(sensor.as_ref(), page.as_ref());
        }

        TickOutcome::Counting { remaining_secs }
    }

    pub fn on_promotion_ended(&self) {
        lock(&self.core).clear(ClearReason::PromotionEnded);
    }

    /// Cancel action behind the countdown.
    pub fn cancel(&self) -> bool {
        let cleared = lock(&self.core).clear(ClearReason::Cancelled);
        if cleared {
            info!("Enhancement cancelled by user");
        }
        cleared
    }

    /// Unconditional cleanup, used when the video changes underneath the schedule.
    pub fn force_cleanup(&self) -> bool {
        lock(&self.core).clear(ClearReason::VideoChanged)
    }
}
