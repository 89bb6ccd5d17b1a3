use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::kernel::bus::{EventBus, Subscription};
use crate::kernel::creator_config::CreatorConfigPrompt;
use crate::kernel::event::{EventEnvelope, EventKind};
use crate::kernel::observer::{ObserverHandle, PollingObserver};
use crate::kernel::overlay::OverlayDismisser;
use crate::kernel::scheduler::{EnhancementScheduler, ScheduleStatus};
use crate::kernel::video_change::VideoChangeDetector;
use crate::kernel::volume::VolumeCoordinator;
use crate::page::{PageActuator, PageSensor};
use crate::settings::{ConfigurationRequests, IntegrityCheck, PreferenceSource};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("refusing to run inside an embedded frame")]
    EmbeddedFrame,
    #[error("settings integrity check rejected startup")]
    IntegrityRejected,
}

/// Context object owning every component of one page session.
///
/// Nothing is global: two engines on two pages share no state.
pub struct Engine {
    sensor: Arc<dyn PageSensor>,
    requests: Arc<dyn ConfigurationRequests>,
    bus: Arc<EventBus>,
    observer: Arc<PollingObserver>,
    scheduler: EnhancementScheduler,
    volume: Arc<VolumeCoordinator>,
    video_change: Arc<VideoChangeDetector>,
    overlay: Arc<OverlayDismisser>,
    config_prompt: Arc<CreatorConfigPrompt>,
    wired: AtomicBool,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        sensor: Arc<dyn PageSensor>,
        page: Arc<dyn PageActuator>,
        preferences: Arc<dyn PreferenceSource>,
        requests: Arc<dyn ConfigurationRequests>,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let observer = Arc::new(PollingObserver::new(
            Arc::clone(&sensor),
            Arc::clone(&bus),
            config.poll_interval(),
        ));
        let scheduler = EnhancementScheduler::with_safety_limit(
            Arc::clone(&sensor),
            Arc::clone(&page),
            Arc::clone(&preferences),
            config.safety_limit(),
        );
        let volume = Arc::new(VolumeCoordinator::new(
            Arc::clone(&sensor),
            Arc::clone(&page),
            preferences,
        ));
        let video_change = Arc::new(VideoChangeDetector::with_threshold(
            Arc::clone(&sensor),
            config.rewind_threshold_secs,
        ));
        let overlay = Arc::new(OverlayDismisser::new(Arc::clone(&sensor), Arc::clone(&page)));
        let config_prompt = Arc::new(CreatorConfigPrompt::new(Arc::clone(&sensor), page));

        Self {
            sensor,
            requests,
            bus,
            observer,
            scheduler,
            volume,
            video_change,
            overlay,
            config_prompt,
            wired: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Gate startup, wire the components, then start observing.
    ///
    /// Embedded frames and a failed integrity check refuse to start; no loop
    /// is spawned in either case.
    pub fn launch(&self, integrity: &dyn IntegrityCheck) -> Result<ObserverHandle, EngineError> {
        if self.sensor.is_embedded() {
            debug!("Embedded frame, engine not started");
            return Err(EngineError::EmbeddedFrame);
        }

        if !integrity.verify_integrity() {
            warn!("Integrity check failed, engine not started");
            return Err(EngineError::IntegrityRejected);
        }

        if !self.wired.swap(true, Ordering::SeqCst) {
            self.wire();
        }

        Ok(self.observer.start())
    }

    fn wire(&self) {
        let mut subs = Vec::new();

        let scheduler = self.scheduler.clone();
        subs.push(self.bus.subscribe(EventKind::PromotionStarted, move |_| {
            let attempt = scheduler.on_promotion_started();
            debug!("Schedule attempt: {:?}", attempt);
            Ok(())
        }));
        let scheduler = self.scheduler.clone();
        subs.push(self.bus.subscribe(EventKind::PromotionEnded, move |_| {
            scheduler.on_promotion_ended();
            Ok(())
        }));
        let scheduler = self.scheduler.clone();
        subs.push(self.bus.subscribe(EventKind::Tick, move |_| {
            scheduler.on_tick();
            Ok(())
        }));

        let volume = Arc::clone(&self.volume);
        subs.push(self.bus.subscribe(EventKind::PromotionStarted, move |_| {
            volume.on_promotion_started();
            Ok(())
        }));
        let volume = Arc::clone(&self.volume);
        subs.push(self.bus.subscribe(EventKind::PromotionEnded, move |_| {
            volume.on_promotion_ended();
            Ok(())
        }));

        let prompt = Arc::clone(&self.config_prompt);
        subs.push(self.bus.subscribe(EventKind::PageChanged, move |_| {
            prompt.on_page_changed();
            Ok(())
        }));
        let prompt = Arc::clone(&self.config_prompt);
        subs.push(self.bus.subscribe(EventKind::Tick, move |_| {
            prompt.on_tick();
            Ok(())
        }));

        let overlay = Arc::clone(&self.overlay);
        subs.push(self.bus.subscribe(EventKind::Tick, move |_| {
            overlay.on_tick();
            Ok(())
        }));

        let detector = Arc::clone(&self.video_change);
        let scheduler = self.scheduler.clone();
        subs.push(self.bus.subscribe(EventKind::Tick, move |_| {
            if detector.observe() && scheduler.force_cleanup() {
                info!("Video changed, pending enhancement dropped");
            }
            Ok(())
        }));

        info!("Engine wired with {} subscriptions", subs.len());
        *self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = subs;
    }

    /// Stop observing. A pending enhancement is dropped with its countdown, and
    /// a mute applied for the promotion on screen is restored.
    pub fn stop(&self, handle: &ObserverHandle) {
        let in_promotion = self
            .observer
            .state()
            .is_some_and(|s| s.last_promotion.is_some());
        self.observer.stop(handle);
        if self.observer.is_running() {
            return;
        }

        if self.scheduler.force_cleanup() {
            info!("Pending enhancement dropped on stop");
        }
        if in_promotion {
            self.volume.on_promotion_ended();
        }
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, handler)
    }

    /// Cancel action attached to the countdown.
    pub fn cancel_pending(&self) -> bool {
        self.scheduler.cancel()
    }

    /// Activation of the creator configuration affordance.
    pub fn configure_current_creator(&self) -> bool {
        let identity = self.sensor.creator_identity();
        if !identity.is_known() {
            warn!("Creator unknown, configuration request ignored");
            return false;
        }
        self.requests.configure_creator(&identity);
        info!("Configuration requested for '{}'", identity.creator_name);
        true
    }

    pub fn is_running(&self) -> bool {
        self.observer.is_running()
    }

    pub fn schedule_status(&self) -> ScheduleStatus {
        self.scheduler.status()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn observer(&self) -> &Arc<PollingObserver> {
        &self.observer
    }

    pub fn scheduler(&self) -> &EnhancementScheduler {
        &self.scheduler
    }
}
