use std::sync::Arc;

use tracing::{debug, info, warn};

use super::classifier;
use crate::page::{PageActuator, PageSensor};
use crate::settings::PreferenceSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeAction {
    Muted,
    Restored,
    Unchanged,
}

/// Mutes the player while a promotion plays. Keeps no state: every decision
/// is taken from the current page and the current preferences.
pub struct VolumeCoordinator {
    sensor: Arc<dyn PageSensor>,
    page: Arc<dyn PageActuator>,
    preferences: Arc<dyn PreferenceSource>,
}

impl VolumeCoordinator {
    pub fn new(
        sensor: Arc<dyn PageSensor>,
        page: Arc<dyn PageActuator>,
        preferences: Arc<dyn PreferenceSource>,
    ) -> Self {
        Self { sensor, page, preferences }
    }

    pub fn on_promotion_started(&self) -> VolumeAction {
        if !classifier::is_promotional(&self.sensor.ad_markers()) || self.sensor.is_muted() {
            return VolumeAction::Unchanged;
        }

        let creator = self.sensor.creator_identity();
        let preference = match self.preferences.preferences(&creator.creator_id) {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not read volume preference: {}", e);
                return VolumeAction::Unchanged;
            }
        };

        if !preference.active || !preference.reduce_volume {
            debug!("Volume reduction off for '{}'", creator.creator_id);
            return VolumeAction::Unchanged;
        }

        // Re-check after the lookup; the promotion may be gone or the user may have muted.
        if !classifier::is_promotional(&self.sensor.ad_markers()) || self.sensor.is_muted() {
            return VolumeAction::Unchanged;
        }

        match self.page.toggle_mute() {
            Ok(()) => {
                info!("Muted for promotion");
                VolumeAction::Muted
            }
            Err(e) => {
                warn!("Failed to mute: {}", e);
                VolumeAction::Unchanged
            }
        }
    }

    pub fn on_promotion_ended(&self) -> VolumeAction {
        if !self.sensor.is_muted() {
            return VolumeAction::Unchanged;
        }
        match self.page.toggle_mute() {
            Ok(()) => {
                info!("Volume restored");
                VolumeAction::Restored
            }
            Err(e) => {
                warn!("Failed to restore volume: {}", e);
                VolumeAction::Unchanged
            }
        }
    }
}
