//! Classifying the instrument's analog input channels.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

/// What an analog input channel measures, as told by its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    ProbePixel,
    ReferencePixel,
    Chopper,
    /// Ratio-to-reference ("R2R").
    RatioToReference,
    Pyro,
    Wobbler,
    Unclassified,
}

/// Label substrings and the roles they select. Earlier entries take priority,
/// e.g. "probe pixel (Chopper synced)" is a probe pixel. Matching is
/// case-sensitive.
const ROLE_PATTERNS: [(&str, ChannelRole); 6] = [
    ("probe pixel", ChannelRole::ProbePixel),
    ("reference pixel", ChannelRole::ReferencePixel),
    ("Chopper", ChannelRole::Chopper),
    ("R2R", ChannelRole::RatioToReference),
    ("pyro", ChannelRole::Pyro),
    ("wobbler", ChannelRole::Wobbler),
];

impl ChannelRole {
    pub fn classify(label: &str) -> ChannelRole {
        ROLE_PATTERNS
            .iter()
            .find(|(pattern, _)| label.contains(pattern))
            .map(|&(_, role)| role)
            .unwrap_or(ChannelRole::Unclassified)
    }
}

/// The analog input channel labels, in the order they were authored in the
/// hardware configuration. A label's position is its channel index in the raw
/// data.
///
/// The order is taken as given. A configuration written out of order yields
/// indices that don't match the physical channels, and nothing here can tell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct ChannelLayout {
    labels: Vec<String>,
}

impl From<Map<String, Value>> for ChannelLayout {
    /// Only the keys matter; their values are ignored.
    fn from(map: Map<String, Value>) -> ChannelLayout {
        ChannelLayout {
            labels: map.into_iter().map(|(label, _)| label).collect(),
        }
    }
}

impl ChannelLayout {
    pub fn new(labels: Vec<String>) -> ChannelLayout {
        ChannelLayout { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Classify every channel and group the indices by role. Each channel
    /// lands in at most one group.
    pub fn get_indices(&self) -> ChannelIndices {
        let mut indices = ChannelIndices::default();
        for (idx, label) in self.labels.iter().enumerate() {
            match ChannelRole::classify(label) {
                ChannelRole::ProbePixel => indices.probe_pixels.push(idx),
                ChannelRole::ReferencePixel => indices.reference_pixels.push(idx),
                ChannelRole::Chopper => {
                    indices.choppers.insert(label.clone(), idx);
                }
                ChannelRole::RatioToReference => indices.r2r.push(idx),
                ChannelRole::Pyro => indices.pyro_detector = Some(idx),
                ChannelRole::Wobbler => indices.wobbler = Some(idx),
                ChannelRole::Unclassified => (),
            }
        }
        indices
    }
}

/// Channel indices grouped by [`ChannelRole`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelIndices {
    /// Probe pixel channels, in layout order.
    pub probe_pixels: Vec<usize>,

    /// Reference pixel channels, in layout order.
    pub reference_pixels: Vec<usize>,

    /// Chopper channels, keyed by their label.
    pub choppers: BTreeMap<String, usize>,

    /// Ratio-to-reference channels, in layout order.
    pub r2r: Vec<usize>,

    /// The pyro detector channel. If several labels qualify, the last wins.
    pub pyro_detector: Option<usize>,

    /// The wobbler channel. If several labels qualify, the last wins.
    pub wobbler: Option<usize>,
}
