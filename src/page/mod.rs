//! Narrow view onto the streaming page.
//!
//! The engine never queries markup itself. Everything it reads goes through
//! [`PageSensor`] and everything it changes goes through [`PageActuator`].
//! A missing element is always reported as an absent feature (`None`,
//! `false`, an empty list), never as an error.

pub mod scripted;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::kernel::classifier;

pub use scripted::{PageAction, PageFrame, ScriptedPage};

/// Path of the watch page. Anything else is [`PageKind::Other`].
pub const WATCH_PATH: &str = "/watch";

/// Raw ad indicators present in the page right now.
///
/// `Option<String>` fields carry the element's text or aria-label when the
/// element exists; `Some("")` is a present element with no usable text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdMarkers {
    pub badge: Option<String>,
    /// Player carries an `ad-showing` or `ad-interrupting` marker.
    pub ad_showing: bool,
    pub info_dialog_button: bool,
    pub visit_advertiser: Option<String>,
    pub visitor_link: Option<String>,
    /// Any skip-button variant (standard, modern, legacy).
    pub skip_button: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageKind {
    Video,
    Other,
}

impl PageKind {
    pub fn from_url(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if url.path() == WATCH_PATH => PageKind::Video,
            _ => PageKind::Other,
        }
    }
}

/// Per-tick classified view of the page. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub is_promotion_active: bool,
    pub promotion_label: Option<String>,
    pub current_url: String,
    pub page_kind: PageKind,
}

/// Publisher of the video being watched. Empty strings when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreatorIdentity {
    pub creator_id: String,
    pub creator_name: String,
    pub avatar_url: String,
}

impl CreatorIdentity {
    pub fn is_known(&self) -> bool {
        !self.creator_id.is_empty()
    }
}

/// Handle to an interactive element located by the sensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Control {
    pub id: String,
}

impl Control {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("control {0} is no longer attached to the page")]
    Detached(String),
    #[error("interaction rejected: {0}")]
    Rejected(String),
}

pub trait PageSensor: Send + Sync {
    fn current_url(&self) -> String;

    fn ad_markers(&self) -> AdMarkers;

    /// Playback position of the main video element in seconds, `None` without a video element.
    fn playback_position(&self) -> Option<f64>;

    fn is_muted(&self) -> bool;

    fn creator_identity(&self) -> CreatorIdentity;

    fn skip_controls(&self) -> Vec<Control>;

    fn overlay_close_controls(&self) -> Vec<Control>;

    /// True when running inside an embedded frame rather than the top-level page.
    fn is_embedded(&self) -> bool {
        false
    }

    fn snapshot(&self) -> PageSnapshot {
        let verdict = classifier::classify(&self.ad_markers());
        let current_url = self.current_url();
        PageSnapshot {
            is_promotion_active: verdict.active,
            promotion_label: verdict.label,
            page_kind: PageKind::from_url(&current_url),
            current_url,
        }
    }
}

/// Writes against the page.
///
/// Countdown methods are called with the scheduler locked and must not call
/// back into the engine. `activate` runs unlocked and may.
pub trait PageActuator: Send + Sync {
    /// Dispatch a synthetic click on `control`.
    fn activate(&self, control: &Control) -> Result<(), PageError>;

    /// Click the player's mute button. A missing button is a no-op.
    fn toggle_mute(&self) -> Result<(), PageError>;

    /// Show the countdown with its cancel action. Inserted on first call,
    /// updated in place afterwards, recreated if the page dropped it.
    fn render_countdown(&self, remaining_secs: u64);

    fn remove_countdown(&self);

    fn has_config_affordance(&self) -> bool;

    /// Returns false when the page has no container to host the affordance.
    fn insert_config_affordance(&self) -> bool;
}
