//! Decides which images to warm, and when.
//!
//! Issue order is fixed: the critical prefix on mount, then one follow-up
//! batch after a delay, then windows around the scroll position. A scroll
//! flush that arrives before the follow-up timer forces the follow-up batch
//! out first so that order holds.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::queue::{PreloadRequest, PreloadSink, PreloadStage};
use crate::models::Artwork;
use crate::timing::{FrameThrottle, Timeout};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreloadSettings {
    /// Images requested immediately on mount.
    pub critical_count: usize,
    /// Images requested once the follow-up timer fires.
    pub next_batch_size: usize,
    pub next_batch_delay_ms: u64,
    /// Items requested before the approximate visible index.
    pub scroll_window_before: usize,
    /// Items requested from the approximate visible index onward.
    pub scroll_window_after: usize,
    /// Row height used to turn a scroll offset into an item index.
    pub estimated_row_height: f32,
}

impl Default for PreloadSettings {
    fn default() -> Self {
        Self {
            critical_count: 6,
            next_batch_size: 6,
            next_batch_delay_ms: 1000,
            scroll_window_before: 3,
            scroll_window_after: 9,
            estimated_row_height: 400.0,
        }
    }
}

impl PreloadSettings {
    pub fn next_batch_delay(&self) -> Duration {
        Duration::from_millis(self.next_batch_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadStats {
    pub critical: usize,
    pub next_batch: usize,
    pub scroll: usize,
    /// Requests the sink declined (duplicate, cached, or queue full).
    /// Declined indices stay eligible for later windows.
    pub declined: usize,
}

impl PreloadStats {
    pub fn issued(&self) -> usize {
        self.critical + self.next_batch + self.scroll
    }
}

pub struct ImagePreloader {
    settings: PreloadSettings,
    /// Image URL per artwork index; `None` for records without an image.
    urls: Vec<Option<String>>,
    columns: usize,
    next_batch: Timeout,
    next_batch_issued: bool,
    scroll: FrameThrottle<f32>,
    requested: HashSet<usize>,
    stats: PreloadStats,
}

impl ImagePreloader {
    pub fn new(settings: PreloadSettings, artworks: &[Artwork], columns: usize) -> Self {
        Self {
            settings,
            urls: urls_of(artworks),
            columns: columns.max(1),
            next_batch: Timeout::default(),
            next_batch_issued: false,
            scroll: FrameThrottle::new(),
            requested: HashSet::new(),
            stats: PreloadStats::default(),
        }
    }

    /// Issue the critical prefix and arm the follow-up timer.
    pub fn mount(&mut self, now: Instant, sink: &dyn PreloadSink) {
        let end = self.settings.critical_count.min(self.urls.len());
        let issued = self.issue(0..end, PreloadStage::Critical, sink);
        debug!(issued, "Critical images requested");
        self.next_batch.start(now, self.settings.next_batch_delay());
    }

    /// Advance timers. Issues the follow-up batch once its delay has elapsed.
    pub fn tick(&mut self, now: Instant, sink: &dyn PreloadSink) {
        if self.next_batch.poll(now) {
            self.issue_next_batch(sink);
        }
    }

    /// Record a scroll position. Returns true when the caller must request an animation frame.
    pub fn on_scroll(&mut self, scroll_top: f32) -> bool {
        self.scroll.request(scroll_top.max(0.0))
    }

    /// Frame callback: handle the latest scroll position, if any.
    pub fn on_animation_frame(&mut self, sink: &dyn PreloadSink) {
        let Some(scroll_top) = self.scroll.take() else {
            return;
        };
        if !self.next_batch_issued {
            self.next_batch.cancel();
            self.issue_next_batch(sink);
        }

        let center = self.approximate_index(scroll_top);
        let start = center.saturating_sub(self.settings.scroll_window_before);
        let end = center
            .saturating_add(self.settings.scroll_window_after)
            .min(self.urls.len());
        let issued = self.issue(start..end, PreloadStage::Scroll, sink);
        trace!(scroll_top, center, issued, "Scroll preload window");
    }

    /// First item index on the row at `scroll_top`, assuming uniform rows.
    pub fn approximate_index(&self, scroll_top: f32) -> usize {
        if self.settings.estimated_row_height <= 0.0 {
            return 0;
        }
        let row = (scroll_top.max(0.0) / self.settings.estimated_row_height).floor() as usize;
        row.saturating_mul(self.columns).min(self.urls.len())
    }

    /// Column count after a relayout; only the scroll index depends on it.
    pub fn set_columns(&mut self, columns: usize) {
        self.columns = columns.max(1);
    }

    /// Swap in a new artwork list. A list with different images starts over:
    /// its critical prefix goes out at once and the follow-up timer is re-armed.
    /// Returns false when the image URLs are unchanged.
    pub fn replace(&mut self, artworks: &[Artwork], now: Instant, sink: &dyn PreloadSink) -> bool {
        let urls = urls_of(artworks);
        if urls == self.urls {
            return false;
        }
        self.urls = urls;
        self.requested.clear();
        self.next_batch.cancel();
        self.next_batch_issued = false;
        self.mount(now, sink);
        true
    }

    pub fn stats(&self) -> PreloadStats {
        self.stats
    }

    pub fn frame_requested(&self) -> bool {
        self.scroll.is_requested()
    }

    /// Cancel pending timers and any unflushed scroll.
    pub fn dispose(&mut self) {
        self.next_batch.cancel();
        self.scroll.cancel();
    }

    fn issue_next_batch(&mut self, sink: &dyn PreloadSink) {
        self.next_batch_issued = true;
        let start = self.settings.critical_count.min(self.urls.len());
        let end = start
            .saturating_add(self.settings.next_batch_size)
            .min(self.urls.len());
        let issued = self.issue(start..end, PreloadStage::NextBatch, sink);
        debug!(issued, "Next image batch requested");
    }

    fn issue(&mut self, range: std::ops::Range<usize>, stage: PreloadStage, sink: &dyn PreloadSink) -> usize {
        let mut issued = 0;
        for index in range {
            let Some(url) = self.urls.get(index).cloned().flatten() else {
                continue;
            };
            if self.requested.contains(&index) {
                continue;
            }
            if sink.submit(PreloadRequest::new(url, index, stage)) {
                self.requested.insert(index);
                issued += 1;
                match stage {
                    PreloadStage::Critical => self.stats.critical += 1,
                    PreloadStage::NextBatch => self.stats.next_batch += 1,
                    PreloadStage::Scroll => self.stats.scroll += 1,
                }
            } else {
                self.stats.declined += 1;
            }
        }
        issued
    }
}

fn urls_of(artworks: &[Artwork]) -> Vec<Option<String>> {
    artworks
        .iter()
        .map(|a| a.has_image().then(|| a.thumbnail_url().to_string()))
        .collect()
}
