use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::time::REWIND_THRESHOLD_SECS;
use crate::page::PageSensor;

#[derive(Debug, Clone, Default, PartialEq)]
struct LastSeen {
    url: String,
    position: f64,
}

/// Infers a new video from URL changes or large backward playback jumps.
pub struct VideoChangeDetector {
    sensor: Arc<dyn PageSensor>,
    rewind_threshold: f64,
    last: Mutex<Option<LastSeen>>,
}

impl VideoChangeDetector {
    pub fn new(sensor: Arc<dyn PageSensor>) -> Self {
        Self::with_threshold(sensor, REWIND_THRESHOLD_SECS)
    }

    pub fn with_threshold(sensor: Arc<dyn PageSensor>, rewind_threshold: f64) -> Self {
        Self {
            sensor,
            rewind_threshold,
            last: Mutex::new(None),
        }
    }

    /// Sample the page. Returns true when the video appears to have changed
    /// since the previous sample. Without a video element nothing is sampled.
    pub fn observe(&self) -> bool {
        let Some(position) = self.sensor.playback_position() else {
            return false;
        };
        let url = self.sensor.current_url();

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let changed = match last.as_ref() {
            // First sample only establishes the baseline.
            None => false,
            Some(prev) => {
                let url_changed = prev.url != url;
                let rewound = prev.position > 0.0
                    && position < prev.position
                    && prev.position - position > self.rewind_threshold;
                if url_changed || rewound {
                    debug!(
                        "Video change: url_changed={} rewound={} ({:.1}s -> {:.1}s)",
                        url_changed, rewound, prev.position, position
                    );
                }
                url_changed || rewound
            }
        };

        *last = Some(LastSeen { url, position });
        changed
    }
}
