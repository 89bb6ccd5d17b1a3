use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::{AdMarkers, Control, CreatorIdentity, PageActuator, PageError, PageSensor};

/// Everything the sensor can read from the page at one moment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageFrame {
    pub url: String,
    pub markers: AdMarkers,
    pub muted: bool,
    pub playback_position: Option<f64>,
    pub creator: CreatorIdentity,
    pub skip_controls: Vec<String>,
    pub overlay_controls: Vec<String>,
    /// Whether the page has the related-content column that hosts the config affordance.
    pub config_container: bool,
    pub embedded: bool,
}

/// Writes the engine performed against the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    Activated(String),
    MuteToggled,
    CountdownInserted,
    CountdownRemoved,
    ConfigAffordanceInserted,
}

#[derive(Debug, Default)]
struct Injected {
    countdown: Option<u64>,
    config_affordance: bool,
}

/// In-memory page driven by a script. Used by the replay binary and the tests.
#[derive(Debug, Default)]
pub struct ScriptedPage {
    frame: Mutex<PageFrame>,
    injected: Mutex<Injected>,
    actions: Mutex<Vec<PageAction>>,
    detached: Mutex<HashSet<String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedPage {
    pub fn new(frame: PageFrame) -> Self {
        Self {
            frame: Mutex::new(frame),
            ..Self::default()
        }
    }

    /// Replace what the sensor reads. Injected elements survive.
    pub fn set_frame(&self, frame: PageFrame) {
        *lock(&self.frame) = frame;
    }

    pub fn update(&self, f: impl FnOnce(&mut PageFrame)) {
        f(&mut lock(&self.frame));
    }

    /// Load a new document: changes the URL and drops everything the engine injected.
    pub fn navigate(&self, url: &str) {
        lock(&self.frame).url = url.to_string();
        *lock(&self.injected) = Injected::default();
    }

    /// Make activation of `control` fail as if the element had been removed.
    pub fn detach_control(&self, control: &str) {
        lock(&self.detached).insert(control.to_string());
    }

    pub fn frame(&self) -> PageFrame {
        lock(&self.frame).clone()
    }

    pub fn actions(&self) -> Vec<PageAction> {
        lock(&self.actions).clone()
    }

    pub fn activations(&self) -> Vec<String> {
        lock(&self.actions)
            .iter()
            .filter_map(|a| match a {
                PageAction::Activated(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn countdown(&self) -> Option<u64> {
        lock(&self.injected).countdown
    }

    pub fn clear_actions(&self) {
        lock(&self.actions).clear();
    }

    fn record(&self, action: PageAction) {
        lock(&self.actions).push(action);
    }
}

impl PageSensor for ScriptedPage {
    fn current_url(&self) -> String {
        lock(&self.frame).url.clone()
    }

    fn ad_markers(&self) -> AdMarkers {
        lock(&self.frame).markers.clone()
    }

    fn playback_position(&self) -> Option<f64> {
        lock(&self.frame).playback_position
    }

    fn is_muted(&self) -> bool {
        lock(&self.frame).muted
    }

    fn creator_identity(&self) -> CreatorIdentity {
        lock(&self.frame).creator.clone()
    }

    fn skip_controls(&self) -> Vec<Control> {
        lock(&self.frame).skip_controls.iter().map(Control::new).collect()
    }

    fn overlay_close_controls(&self) -> Vec<Control> {
        lock(&self.frame).overlay_controls.iter().map(Control::new).collect()
    }

    fn is_embedded(&self) -> bool {
        lock(&self.frame).embedded
    }
}

impl PageActuator for ScriptedPage {
    fn activate(&self, control: &Control) -> Result<(), PageError> {
        if lock(&self.detached).contains(&control.id) {
            return Err(PageError::Detached(control.id.clone()));
        }
        self.record(PageAction::Activated(control.id.clone()));
        Ok(())
    }

    fn toggle_mute(&self) -> Result<(), PageError> {
        {
            let mut frame = lock(&self.frame);
            frame.muted = !frame.muted;
        }
        self.record(PageAction::MuteToggled);
        Ok(())
    }

    fn render_countdown(&self, remaining_secs: u64) {
        let inserted = {
            let mut injected = lock(&self.injected);
            let fresh = injected.countdown.is_none();
            injected.countdown = Some(remaining_secs);
            fresh
        };
        if inserted {
            self.record(PageAction::CountdownInserted);
        }
    }

    fn remove_countdown(&self) {
        let removed = lock(&self.injected).countdown.take().is_some();
        if removed {
            self.record(PageAction::CountdownRemoved);
        }
    }

    fn has_config_affordance(&self) -> bool {
        lock(&self.injected).config_affordance
    }

    fn insert_config_affordance(&self) -> bool {
        if !lock(&self.frame).config_container {
            return false;
        }
        lock(&self.injected).config_affordance = true;
        self.record(PageAction::ConfigAffordanceInserted);
        true
    }
}
