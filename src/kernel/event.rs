use std::fmt;
use std::str::FromStr;

/// The fixed set of semantic events the observer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Tick,
    PromotionStarted,
    PromotionChanged,
    PromotionEnded,
    PageChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Tick,
        EventKind::PromotionStarted,
        EventKind::PromotionChanged,
        EventKind::PromotionEnded,
        EventKind::PageChanged,
    ];

    /// Wire name used by subscribers that register by string.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Tick => "observer_tick",
            EventKind::PromotionStarted => "promotion_started",
            EventKind::PromotionChanged => "promotion_changed",
            EventKind::PromotionEnded => "promotion_ended",
            EventKind::PageChanged => "page_changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Observed page state on one side of a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Label of the promotion on screen, `None` when no promotion is showing.
    pub promotion: Option<String>,
    pub page: String,
}

impl Frame {
    pub fn is_promotion_active(&self) -> bool {
        self.promotion.is_some()
    }
}

/// One delivered event. Immutable once built; subscribers get a shared reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    pub kind: EventKind,
    pub previous: Frame,
    pub current: Frame,
}

impl EventEnvelope {
    pub fn new(kind: EventKind, previous: Frame, current: Frame) -> Self {
        Self { kind, previous, current }
    }
}
