//! Vertical strip layout
//!
//! Every page gets a slot whose height is derived from its natural size (or a
//! fallback when the size is not known yet), so the strip can be laid out
//! before any page has been decoded and does not shift when one finishes.

use crate::config::LayoutConfig;

/// How pages are scaled into the strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Natural size, capped at the configured maximum width
    #[default]
    Natural,

    /// Whole page fits the viewport height
    FitHeight,
}

impl FitMode {
    pub fn toggled(self) -> Self {
        match self {
            FitMode::Natural => FitMode::FitHeight,
            FitMode::FitHeight => FitMode::Natural,
        }
    }
}

/// Scroll container geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Content box width
    pub content_width: f64,

    /// Content box height
    pub content_height: f64,

    /// Current scroll offset
    pub scroll_top: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { content_width: 1280.0, content_height: 800.0, scroll_top: 0.0 }
    }
}

impl Viewport {
    pub fn new(content_width: f64, content_height: f64) -> Self {
        Self { content_width, content_height, scroll_top: 0.0 }
    }
}

/// Position of one page slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMetric {
    pub top: f64,
    pub height: f64,
}

impl PageMetric {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Slot height for a page with known natural size
pub fn slot_height(natural_width: u32, natural_height: u32, viewport: &Viewport, fit: FitMode, config: &LayoutConfig) -> f64 {
    let (width, height) = (f64::from(natural_width), f64::from(natural_height));
    if width <= 0.0 || height <= 0.0 || viewport.content_width <= 0.0 || viewport.content_height <= 0.0 {
        return 0.0;
    }

    let scale = match fit {
        FitMode::FitHeight => {
            let max_height = (viewport.content_height - config.fit_height_padding_px).max(0.0);
            1f64.min(viewport.content_width / width).min(max_height / height)
        }
        FitMode::Natural => {
            let max_width = viewport.content_width.min(config.max_page_width_px);
            1f64.min(max_width / width)
        }
    };
    (height * scale).round()
}

/// Slot height for a page whose size is not known
pub fn fallback_height(viewport: &Viewport, fit: FitMode, config: &LayoutConfig) -> f64 {
    let height = match fit {
        FitMode::FitHeight => (viewport.content_height - config.fit_height_padding_px).max(0.0),
        FitMode::Natural => {
            let width = if viewport.content_width > 0.0 { viewport.content_width } else { config.max_page_width_px };
            width.min(config.max_page_width_px) * config.fallback_aspect_ratio
        }
    };
    height.round().max(config.min_fallback_height_px)
}

/// Slot positions for the whole strip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    metrics: Vec<PageMetric>,
    padding_top: f64,
}

impl PageLayout {
    /// Lay out pages top to bottom
    ///
    /// Pages without a size take the average of the known slot heights, or the
    /// fallback height when nothing is known.
    pub fn build(sizes: &[Option<(u32, u32)>], viewport: &Viewport, fit: FitMode, config: &LayoutConfig) -> Self {
        let known: Vec<f64> = sizes
            .iter()
            .flatten()
            .map(|&(width, height)| slot_height(width, height, viewport, fit, config))
            .filter(|height| *height > 1.0)
            .collect();
        let unknown_height = if known.is_empty() {
            fallback_height(viewport, fit, config)
        } else {
            (known.iter().sum::<f64>() / known.len() as f64).round()
        };

        let mut top = config.padding_top_px;
        let metrics = sizes
            .iter()
            .map(|size| {
                let height = size
                    .map(|(width, height)| slot_height(width, height, viewport, fit, config))
                    .filter(|height| *height > 1.0)
                    .unwrap_or(unknown_height);
                let metric = PageMetric { top, height };
                top += height + config.page_gap_px;
                metric
            })
            .collect();

        Self { metrics, padding_top: config.padding_top_px }
    }

    pub fn metrics(&self) -> &[PageMetric] {
        &self.metrics
    }

    pub fn metric(&self, index: usize) -> Option<&PageMetric> {
        self.metrics.get(index)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Height of the whole strip
    pub fn total_height(&self) -> f64 {
        self.metrics.last().map_or(0.0, PageMetric::bottom)
    }

    /// Page with the largest overlap with the viewport; ties go to the lower index
    ///
    /// A viewport that overlaps nothing (zero height, or scrolled past the
    /// strip) resolves to the page under its top edge.
    pub fn most_visible(&self, viewport: &Viewport) -> Option<usize> {
        let view_top = viewport.scroll_top;
        let view_bottom = view_top + viewport.content_height.max(0.0);

        let mut best: Option<(usize, f64)> = None;
        for (index, metric) in self.metrics.iter().enumerate() {
            if metric.top > view_bottom {
                break;
            }
            let overlap = (metric.bottom().min(view_bottom) - metric.top.max(view_top)).max(0.0);
            if best.map_or(true, |(_, current)| overlap > current) {
                best = Some((index, overlap));
            }
        }
        match best {
            Some((index, overlap)) if overlap > 0.0 => Some(index),
            _ => self.page_at_top(view_top),
        }
    }

    /// Largest scroll offset that still fills the viewport
    pub fn max_scroll_top(&self, viewport: &Viewport) -> f64 {
        (self.total_height() - viewport.content_height.max(0.0)).max(0.0)
    }

    /// Page under the top edge of the viewport
    pub fn page_at_top(&self, scroll_top: f64) -> Option<usize> {
        if self.metrics.is_empty() {
            return None;
        }
        if scroll_top <= self.padding_top + 1.0 {
            return Some(0);
        }
        let view_top = scroll_top + self.padding_top + 1.0;
        let index = self.metrics.partition_point(|metric| metric.bottom() < view_top);
        Some(index.min(self.metrics.len() - 1))
    }

    /// Distance from the top of `index` to the viewport top
    pub fn offset_within(&self, index: usize, scroll_top: f64) -> f64 {
        self.metric(index).map_or(0.0, |metric| (scroll_top + self.padding_top - metric.top).round().max(0.0))
    }

    /// Scroll offset that puts `index` at the top of the viewport
    pub fn scroll_target(&self, index: usize) -> Option<f64> {
        self.scroll_target_with_offset(index, 0.0)
    }

    /// Scroll offset that puts `offset_px` into `index` at the top
    ///
    /// The offset is clamped to two pixels short of the slot bottom.
    pub fn scroll_target_with_offset(&self, index: usize, offset_px: f64) -> Option<f64> {
        let clamped = index.min(self.metrics.len().checked_sub(1)?);
        let metric = self.metrics[clamped];
        let offset = if offset_px.is_finite() { offset_px.max(0.0) } else { 0.0 };
        let max_offset = (metric.height.round() - 2.0).max(0.0);
        Some((metric.top + offset.min(max_offset) - self.padding_top).max(0.0))
    }
}
