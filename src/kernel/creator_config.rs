use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::page::{PageActuator, PageKind, PageSensor};

/// Keeps the "configure this creator" affordance present next to the video.
///
/// One insertion attempt is made per navigation; a tick that finds the
/// affordance missing (the page re-rendered) re-arms the attempt.
pub struct CreatorConfigPrompt {
    sensor: Arc<dyn PageSensor>,
    page: Arc<dyn PageActuator>,
    attempted: AtomicBool,
}

impl CreatorConfigPrompt {
    pub fn new(sensor: Arc<dyn PageSensor>, page: Arc<dyn PageActuator>) -> Self {
        Self {
            sensor,
            page,
            attempted: AtomicBool::new(false),
        }
    }

    pub fn on_page_changed(&self) -> bool {
        if PageKind::from_url(&self.sensor.current_url()) != PageKind::Video {
            return false;
        }
        self.attempted.store(false, Ordering::SeqCst);
        self.ensure()
    }

    pub fn on_tick(&self) -> bool {
        if self.page.has_config_affordance() {
            return false;
        }
        self.attempted.store(false, Ordering::SeqCst);
        self.ensure()
    }

    /// Try to insert the affordance. Returns true when it was inserted now.
    pub fn ensure(&self) -> bool {
        if self.page.has_config_affordance() || self.attempted.swap(true, Ordering::SeqCst) {
            return false;
        }
        let inserted = self.page.insert_config_affordance();
        if inserted {
            debug!("Creator configuration affordance inserted");
        }
        inserted
    }
}
