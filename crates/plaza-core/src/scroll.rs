use serde::{Deserialize, Serialize};

/// Which layout the feed is drawn in. Desktop scrolls the window, mobile
/// scrolls an inner container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Viewport {
    #[default]
    Desktop,
    Mobile,
}

/// Last scroll offset of the feed, kept in memory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub viewport: Viewport,
    pub offset: f64,
}

impl ScrollPosition {
    pub fn new(viewport: Viewport, offset: f64) -> Self {
        Self {
            viewport,
            offset: offset.max(0.0),
        }
    }
}

/// Sentinel check used on desktop: the sentinel sits after the last entry,
/// so it is visible once the last rendered entry is the final one.
pub fn sentinel_visible(last_visible_entry: usize, entries_len: usize) -> bool {
    entries_len > 0 && last_visible_entry + 1 >= entries_len
}

/// Scroll distance check used on mobile.
pub fn near_bottom(offset: f64, content_height: f64, viewport_height: f64, threshold: f64) -> bool {
    content_height - (offset + viewport_height) <= threshold
}
