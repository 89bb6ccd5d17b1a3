use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::bus::EventBus;
use super::classifier;
use super::event::{EventEnvelope, EventKind, Frame};
use super::time::Tick;
use crate::page::PageSensor;

/// State retained between iterations. Created at loop start, dropped on stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverState {
    pub tick: Tick,
    pub last_promotion: Option<String>,
    pub last_url: String,
}

impl ObserverState {
    pub fn new(url: String) -> Self {
        Self {
            tick: Tick::new(),
            last_promotion: None,
            last_url: url,
        }
    }

    fn frame(&self) -> Frame {
        Frame {
            promotion: self.last_promotion.clone(),
            page: self.last_url.clone(),
        }
    }

    /// Diff one reading against the retained state, then retain it.
    ///
    /// Returns the events to emit (in emission order) with the pre-tick frame.
    /// A label change between two present labels yields both
    /// `PromotionStarted` and `PromotionChanged`.
    pub fn advance(&mut self, url: String, promotion: Option<String>) -> (Vec<EventKind>, Frame) {
        let previous = self.frame();
        self.tick = self.tick.next();

        let mut kinds = Vec::new();
        if url != self.last_url {
            kinds.push(EventKind::PageChanged);
        }

        if promotion != self.last_promotion {
            if promotion.is_some() {
                kinds.push(EventKind::PromotionStarted);
            }
            if self.last_promotion.is_some() && promotion.is_some() {
                kinds.push(EventKind::PromotionChanged);
            }
            if self.last_promotion.is_some() && promotion.is_none() {
                kinds.push(EventKind::PromotionEnded);
            }
        }

        kinds.push(EventKind::Tick);

        self.last_url = url;
        self.last_promotion = promotion;
        (kinds, previous)
    }
}

/// Returned by [`PollingObserver::start`]; pass to [`PollingObserver::stop`].
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    token: CancellationToken,
}

impl ObserverHandle {
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Fixed-interval polling loop feeding the event bus.
///
/// Each iteration runs to completion before the next one is scheduled, so
/// iterations never overlap.
pub struct PollingObserver {
    sensor: Arc<dyn PageSensor>,
    bus: Arc<EventBus>,
    interval: Duration,
    running: AtomicBool,
    state: Mutex<Option<ObserverState>>,
    handle: Mutex<Option<ObserverHandle>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PollingObserver {
    pub fn new(sensor: Arc<dyn PageSensor>, bus: Arc<EventBus>, interval: Duration) -> Self {
        Self {
            sensor,
            bus,
            interval,
            running: AtomicBool::new(false),
            state: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> Option<ObserverState> {
        lock(&self.state).clone()
    }

    /// Spawn the loop. While already running this is a no-op that hands back the live handle.
    pub fn start(self: &Arc<Self>) -> ObserverHandle {
        let mut slot = lock(&self.handle);
        if self.running.swap(true, Ordering::SeqCst) {
            if let Some(handle) = slot.as_ref() {
                return handle.clone();
            }
        }

        *lock(&self.state) = Some(ObserverState::new(self.sensor.current_url()));
        let handle = ObserverHandle {
            token: CancellationToken::new(),
        };
        *slot = Some(handle.clone());

        let observer = Arc::clone(self);
        let token = handle.token.clone();
        tokio::spawn(async move { observer.run(token).await });

        info!("Observer started. Interval: {}ms", self.interval.as_millis());
        handle
    }

    pub fn stop(&self, handle: &ObserverHandle) {
        handle.token.cancel();

        let mut slot = lock(&self.handle);
        let is_live = slot
            .as_ref()
            .is_some_and(|live| live.token.is_cancelled());
        if is_live {
            *slot = None;
            *lock(&self.state) = None;
            self.running.store(false, Ordering::SeqCst);
            info!("Observer stopped");
        }
    }

    async fn run(&self, token: CancellationToken) {
        while !token.is_cancelled() {
            if panic::catch_unwind(AssertUnwindSafe(|| self.poll_once())).is_err() {
                error!("Observer iteration panicked; rescheduling");
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("Observer loop exited");
    }

    /// One iteration: read, diff, publish. Returns the emitted kinds in order.
    pub fn poll_once(&self) -> Vec<EventKind> {
        let url = self.sensor.current_url();
        let verdict = classifier::classify(&self.sensor.ad_markers());

        let (kinds, previous, tick) = {
            let mut state = lock(&self.state);
            let state = state.get_or_insert_with(|| ObserverState::new(url.clone()));
            let (kinds, previous) = state.advance(url.clone(), verdict.label.clone());
            (kinds, previous, state.tick)
        };

        let current = Frame {
            promotion: verdict.label,
            page: url,
        };

        if kinds.len() > 1 {
            debug!("Tick {}: emitting {:?}", tick.frame, kinds);
        }

        for kind in &kinds {
            let envelope = EventEnvelope::new(*kind, previous.clone(), current.clone());
            self.bus.publish(&envelope);
        }
        kinds
    }
}
