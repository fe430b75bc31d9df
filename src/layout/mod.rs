pub mod layout_cache;
pub mod masonry;
pub mod responsive;

pub use layout_cache::CachedLayoutComputer;
pub use masonry::{BalanceStats, MasonryLayout, PlacementStrategy};
pub use responsive::{
    Breakpoint, LayoutConfig, LayoutOverride, Overrides, ResponsiveConfig, Thresholds,
    VariantDistribution, VariantHeights,
};
