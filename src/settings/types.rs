use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::page::CreatorIdentity;

pub const DEFAULT_DELAY_SECONDS: i64 = 5;
pub const MAX_DELAY_SECONDS: i64 = 30;

/// What the engine does on one creator's videos (or globally).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preference {
    /// Seconds the promotion plays before the skip control is activated.
    #[serde(rename = "enhanceDelay")]
    pub enhance_delay_seconds: i64,
    pub reduce_volume: bool,
    pub active: bool,
}

impl Default for Preference {
    fn default() -> Self {
        Self {
            enhance_delay_seconds: DEFAULT_DELAY_SECONDS,
            reduce_volume: true,
            active: true,
        }
    }
}

impl Preference {
    /// Set the delay, clamped to the bounds the options page allows (0..=30).
    pub fn with_delay(mut self, seconds: i64) -> Self {
        self.enhance_delay_seconds = seconds.clamp(0, MAX_DELAY_SECONDS);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorPreference {
    pub creator_id: String,
    pub creator_name: String,
    pub avatar_url: String,
    #[serde(flatten)]
    pub preference: Preference,
}

impl CreatorPreference {
    pub fn new(identity: &CreatorIdentity, preference: Preference) -> Self {
        Self {
            creator_id: identity.creator_id.clone(),
            creator_name: identity.creator_name.clone(),
            avatar_url: identity.avatar_url.clone(),
            preference,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerSettings {
    pub global: Preference,
    #[serde(default)]
    pub creators: BTreeMap<String, CreatorPreference>,
}

impl ViewerSettings {
    /// Creator override when one exists, global otherwise. An empty id always means global.
    pub fn resolve(&self, creator_id: &str) -> Preference {
        if creator_id.is_empty() {
            return self.global;
        }
        self.creators
            .get(creator_id)
            .map_or(self.global, |c| c.preference)
    }

    /// Entry for `identity`, created from the current global values when missing.
    pub fn ensure_creator(&mut self, identity: &CreatorIdentity) -> &mut CreatorPreference {
        let global = self.global;
        self.creators
            .entry(identity.creator_id.clone())
            .or_insert_with(|| CreatorPreference::new(identity, global))
    }

    pub fn remove_creator(&mut self, creator_id: &str) -> Option<CreatorPreference> {
        self.creators.remove(creator_id)
    }
}
