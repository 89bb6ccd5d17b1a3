use crate::page::AdMarkers;

/// Minimum number of independent signals before a promotion is reported.
/// A single signal is often a badge left behind in a cached player.
pub const MIN_SIGNALS: usize = 2;

pub const FALLBACK_LABEL: &str = "Promotional content detected";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub active: bool,
    pub label: Option<String>,
}

impl Verdict {
    pub fn inactive() -> Self {
        Self { active: false, label: None }
    }
}

/// Independent presence signals, in evaluation order.
pub fn signals(markers: &AdMarkers) -> [bool; 6] {
    [
        markers.badge.is_some(),
        markers.ad_showing,
        markers.info_dialog_button,
        markers.visit_advertiser.is_some(),
        markers.visitor_link.is_some(),
        markers.skip_button,
    ]
}

pub fn signal_count(markers: &AdMarkers) -> usize {
    signals(markers).iter().filter(|present| **present).count()
}

/// Pure vote over the current markers. No state is kept between calls.
pub fn classify(markers: &AdMarkers) -> Verdict {
    if signal_count(markers) < MIN_SIGNALS {
        return Verdict::inactive();
    }

    let label = [&markers.visit_advertiser, &markers.visitor_link, &markers.badge]
        .into_iter()
        .flatten()
        .find(|text| !text.is_empty())
        .cloned()
        .unwrap_or_else(|| FALLBACK_LABEL.to_string());

    Verdict {
        active: true,
        label: Some(label),
    }
}

pub fn is_promotional(markers: &AdMarkers) -> bool {
    classify(markers).active
}
