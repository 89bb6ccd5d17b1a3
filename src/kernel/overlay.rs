use std::sync::Arc;

use tracing::{debug, warn};

use crate::page::{PageActuator, PageSensor};

/// Closes banner overlays drawn over the player. Runs on every tick.
pub struct OverlayDismisser {
    sensor: Arc<dyn PageSensor>,
    page: Arc<dyn PageActuator>,
}

impl OverlayDismisser {
    pub fn new(sensor: Arc<dyn PageSensor>, page: Arc<dyn PageActuator>) -> Self {
        Self { sensor, page }
    }

    /// Returns how many overlays were closed.
    pub fn on_tick(&self) -> usize {
        let mut closed = 0;
        for control in self.sensor.overlay_close_controls() {
            match self.page.activate(&control) {
                Ok(()) => closed += 1,
                Err(e) => warn!("Failed to close overlay {}: {}", control.id, e),
            }
        }
        if closed > 0 {
            debug!("Closed {} overlay(s)", closed);
        }
        closed
    }
}
