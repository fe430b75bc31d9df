//! Viewport width → layout configuration.
//!
//! Brackets are inclusive on their lower bound:
//!
//! ```text
//! [0, tablet)        mobile
//! [tablet, desktop)  tablet
//! [desktop, large)   desktop, 3 columns
//! [large, ∞)         desktop, 4 columns
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::CardVariant;

pub const TABLET_THRESHOLD: u32 = 768;
pub const DESKTOP_THRESHOLD: u32 = 1024;
pub const LARGE_DESKTOP_THRESHOLD: u32 = 1280;

const LARGE_DESKTOP_COLUMNS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    Mobile,
    Tablet,
    Desktop,
}

impl Breakpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Desktop => "desktop",
        }
    }
}

impl std::fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Width thresholds separating the breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    pub tablet: u32,
    pub desktop: u32,
    /// Desktop widths at or above this get the extra column.
    pub large: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            tablet: TABLET_THRESHOLD,
            desktop: DESKTOP_THRESHOLD,
            large: LARGE_DESKTOP_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn breakpoint(&self, width: u32) -> Breakpoint {
        if width < self.tablet {
            Breakpoint::Mobile
        } else if width < self.desktop {
            Breakpoint::Tablet
        } else {
            Breakpoint::Desktop
        }
    }

    pub fn is_large(&self, width: u32) -> bool {
        width >= self.large && self.breakpoint(width) == Breakpoint::Desktop
    }
}

/// Target card heights in pixels, one per variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariantHeights {
    pub small: f32,
    pub medium: f32,
    pub large: f32,
}

impl Default for VariantHeights {
    fn default() -> Self {
        Self {
            small: 250.0,
            medium: 350.0,
            large: 450.0,
        }
    }
}

impl VariantHeights {
    pub fn get(&self, variant: CardVariant) -> f32 {
        match variant {
            CardVariant::Small => self.small,
            CardVariant::Medium => self.medium,
            CardVariant::Large => self.large,
        }
    }
}

/// Advisory share of each variant, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariantDistribution {
    pub small: u8,
    pub medium: u8,
    pub large: u8,
}

impl VariantDistribution {
    pub fn new(small: u8, medium: u8, large: u8) -> Self {
        Self { small, medium, large }
    }

    pub fn get(&self, variant: CardVariant) -> u8 {
        match variant {
            CardVariant::Small => self.small,
            CardVariant::Medium => self.medium,
            CardVariant::Large => self.large,
        }
    }

    pub fn total(&self) -> u32 {
        u32::from(self.small) + u32::from(self.medium) + u32::from(self.large)
    }
}

/// Layout configuration for one breakpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub breakpoint: Breakpoint,
    pub columns: u32,
    pub gap: f32,
    /// Variants cycled through by index. Never empty.
    pub card_variants: Vec<CardVariant>,
    /// Advisory percentages. Placement does not honour them.
    pub distribution: VariantDistribution,
    pub animation_delay: Duration,
    pub heights: VariantHeights,
}

impl LayoutConfig {
    /// Hard-coded base configuration of a breakpoint.
    pub fn base(breakpoint: Breakpoint) -> Self {
        use CardVariant::*;
        let (columns, gap, variants, distribution, delay_ms) = match breakpoint {
            Breakpoint::Mobile => (
                1,
                16.0,
                vec![Small, Medium],
                VariantDistribution::new(60, 40, 0),
                50,
            ),
            Breakpoint::Tablet => (
                2,
                20.0,
                vec![Small, Medium, Large],
                VariantDistribution::new(40, 40, 20),
                75,
            ),
            Breakpoint::Desktop => (
                3,
                20.0,
                vec![Small, Medium, Large],
                VariantDistribution::new(30, 50, 20),
                100,
            ),
        };
        Self {
            breakpoint,
            columns,
            gap,
            card_variants: variants,
            distribution,
            animation_delay: Duration::from_millis(delay_ms),
            heights: VariantHeights::default(),
        }
    }

    /// Variant at position `index`, cycling through the configured list.
    pub fn variant_for(&self, index: usize) -> CardVariant {
        if self.card_variants.is_empty() {
            return CardVariant::Medium;
        }
        self.card_variants[index % self.card_variants.len()]
    }

    pub fn height_for(&self, variant: CardVariant) -> f32 {
        self.heights.get(variant).max(0.0)
    }

    /// Column count clamped to at least one.
    pub fn column_count(&self) -> usize {
        self.columns.max(1) as usize
    }

    /// Width of a single column inside a container of `container_width` pixels.
    pub fn column_width(&self, container_width: f32) -> f32 {
        let columns = self.column_count() as f32;
        ((container_width - self.gap * (columns - 1.0)) / columns).max(0.0)
    }

    fn apply(&mut self, ov: &LayoutOverride) {
        if let Some(columns) = ov.columns {
            self.columns = columns.max(1);
        }
        if let Some(gap) = ov.gap {
            self.gap = gap.max(0.0);
        }
        if let Some(variants) = &ov.card_variants {
            if !variants.is_empty() {
                self.card_variants = variants.clone();
            }
        }
        if let Some(distribution) = ov.distribution {
            self.distribution = distribution;
        }
        if let Some(delay_ms) = ov.animation_delay_ms {
            self.animation_delay = Duration::from_millis(delay_ms);
        }
        if let Some(heights) = ov.heights {
            self.heights = heights;
        }
    }
}

/// Caller-supplied shallow override for one breakpoint. Unset fields keep the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutOverride {
    pub columns: Option<u32>,
    pub gap: Option<f32>,
    pub card_variants: Option<Vec<CardVariant>>,
    pub distribution: Option<VariantDistribution>,
    pub animation_delay_ms: Option<u64>,
    pub heights: Option<VariantHeights>,
}

/// Per-breakpoint overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Overrides {
    pub mobile: Option<LayoutOverride>,
    pub tablet: Option<LayoutOverride>,
    pub desktop: Option<LayoutOverride>,
}

impl Overrides {
    pub fn get(&self, breakpoint: Breakpoint) -> Option<&LayoutOverride> {
        match breakpoint {
            Breakpoint::Mobile => self.mobile.as_ref(),
            Breakpoint::Tablet => self.tablet.as_ref(),
            Breakpoint::Desktop => self.desktop.as_ref(),
        }
    }
}

/// Pure resolver from viewport width and motion flags to a [`LayoutConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsiveConfig {
    pub thresholds: Thresholds,
    pub overrides: Overrides,
    /// Whether the platform's reduced-motion preference is honoured at all.
    pub respect_reduced_motion: bool,
}

impl ResponsiveConfig {
    pub fn new(thresholds: Thresholds, overrides: Overrides) -> Self {
        Self {
            thresholds,
            overrides,
            respect_reduced_motion: true,
        }
    }

    pub fn breakpoint(&self, width: u32) -> Breakpoint {
        self.thresholds.breakpoint(width)
    }

    /// Resolve the configuration for `width`.
    ///
    /// The large-desktop column bump is applied before overrides, so a desktop
    /// override that sets `columns` wins at every desktop width.
    pub fn resolve(&self, width: u32, reduced_motion: bool) -> LayoutConfig {
        let breakpoint = self.breakpoint(width);
        let mut config = LayoutConfig::base(breakpoint);
        if self.thresholds.is_large(width) {
            config.columns = LARGE_DESKTOP_COLUMNS;
        }
        if let Some(ov) = self.overrides.get(breakpoint) {
            config.apply(ov);
        }
        if reduced_motion && self.respect_reduced_motion {
            config.animation_delay = Duration::ZERO;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolver() -> ResponsiveConfig {
        ResponsiveConfig::new(Thresholds::default(), Overrides::default())
    }

    #[test]
    fn test_desktop_and_large_desktop() {
        let config = resolver().resolve(1200, false);
        assert_eq!(config.breakpoint, Breakpoint::Desktop);
        assert_eq!(config.columns, 3);
        assert_eq!(config.gap, 20.0);

        let config = resolver().resolve(1300, false);
        assert_eq!(config.columns, 4);
    }

    #[test]
    fn test_mobile_has_no_large_variant() {
        let config = resolver().resolve(400, false);
        assert_eq!(config.columns, 1);
        assert_eq!(
            config.card_variants,
            vec![CardVariant::Small, CardVariant::Medium]
        );
    }

    #[test]
    fn test_threshold_boundaries_are_lower_inclusive() {
        let r = resolver();
        assert_eq!(r.breakpoint(0), Breakpoint::Mobile);
        assert_eq!(r.breakpoint(767), Breakpoint::Mobile);
        assert_eq!(r.breakpoint(768), Breakpoint::Tablet);
        assert_eq!(r.breakpoint(1023), Breakpoint::Tablet);
        assert_eq!(r.breakpoint(1024), Breakpoint::Desktop);
        assert_eq!(r.resolve(1279, false).columns, 3);
        assert_eq!(r.resolve(1280, false).columns, 4);
    }

    #[test]
    fn test_reduced_motion_zeroes_delay_everywhere() {
        let r = resolver();
        for width in [320, 800, 1100, 1920] {
            assert_eq!(r.resolve(width, true).animation_delay, Duration::ZERO);
            assert!(r.resolve(width, false).animation_delay > Duration::ZERO);
        }
    }

    #[test]
    fn test_reduced_motion_ignored_when_not_respected() {
        let mut r = resolver();
        r.respect_reduced_motion = false;
        assert_eq!(r.resolve(1100, true).animation_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_override_is_shallow_and_per_breakpoint() {
        let overrides = Overrides {
            tablet: Some(LayoutOverride {
                gap: Some(8.0),
                card_variants: Some(vec![CardVariant::Large]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let r = ResponsiveConfig::new(Thresholds::default(), overrides);

        let tablet = r.resolve(900, false);
        assert_eq!(tablet.gap, 8.0);
        assert_eq!(tablet.card_variants, vec![CardVariant::Large]);
        assert_eq!(tablet.columns, 2);
        assert_eq!(tablet.animation_delay, Duration::from_millis(75));

        assert_eq!(r.resolve(1100, false).gap, 20.0);
    }

    #[test]
    fn test_desktop_column_override_beats_large_bump() {
        let overrides = Overrides {
            desktop: Some(LayoutOverride {
                columns: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let r = ResponsiveConfig::new(Thresholds::default(), overrides);
        assert_eq!(r.resolve(1100, false).columns, 5);
        assert_eq!(r.resolve(1600, false).columns, 5);
    }

    #[test]
    fn test_variant_cycle() {
        let config = LayoutConfig::base(Breakpoint::Desktop);
        let variants: Vec<_> = (0..5).map(|i| config.variant_for(i)).collect();
        assert_eq!(
            variants,
            vec![
                CardVariant::Small,
                CardVariant::Medium,
                CardVariant::Large,
                CardVariant::Small,
                CardVariant::Medium
            ]
        );
    }

    #[test]
    fn test_base_distributions_sum_to_100() {
        for bp in [Breakpoint::Mobile, Breakpoint::Tablet, Breakpoint::Desktop] {
            assert_eq!(LayoutConfig::base(bp).distribution.total(), 100);
        }
    }

    #[test]
    fn test_column_width() {
        let config = LayoutConfig::base(Breakpoint::Desktop);
        assert!((config.column_width(1000.0) - 320.0).abs() < 0.01);
    }

    proptest! {
        #[test]
        fn prop_resolution_is_pure(width in 0u32..5000, reduced in any::<bool>()) {
            let r = resolver();
            prop_assert_eq!(r.resolve(width, reduced), r.resolve(width, reduced));
        }

        #[test]
        fn prop_breakpoint_is_monotonic(a in 0u32..5000, b in 0u32..5000) {
            let r = resolver();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(r.breakpoint(lo) <= r.breakpoint(hi));
        }
    }
}
