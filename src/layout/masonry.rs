use serde::{Deserialize, Serialize};

use crate::layout::LayoutConfig;
use crate::models::{Artwork, CardRect, CardVariant, ColumnModel};

/// How artworks are distributed across columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementStrategy {
    /// Artwork `i` goes to column `i mod C`.
    #[default]
    RoundRobin,
    /// Artwork goes to the currently shortest column (lowest index on ties).
    ShortestColumn,
}

impl std::str::FromStr for PlacementStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round-robin" => Ok(Self::RoundRobin),
            "shortest-column" | "greedy" => Ok(Self::ShortestColumn),
            other => Err(format!("unknown placement strategy: {other}")),
        }
    }
}

/// Column and variant chosen for one artwork. Enough to rebuild the columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Assignment {
    pub column: u32,
    pub variant: CardVariant,
}

/// Column-balancing masonry layout.
///
/// Heights are fixed per variant and never measured, so the result is a pure
/// function of the artwork order, the configuration and the strategy.
#[derive(Debug, Clone, Default)]
pub struct MasonryLayout {
    pub strategy: PlacementStrategy,
}

impl MasonryLayout {
    pub fn new(strategy: PlacementStrategy) -> Self {
        Self { strategy }
    }

    /// Computes the column set for a list of artworks.
    ///
    /// # Algorithm
    /// 1. Pick the variant by cycling the configured list at `i mod len`.
    /// 2. Pick the column by strategy: round-robin or shortest-first.
    /// 3. Add the variant's target height plus the gap to the column total.
    ///
    /// Always returns `config.columns` columns; some stay empty when there
    /// are fewer artworks than columns.
    pub fn compute(&self, artworks: &[Artwork], config: &LayoutConfig) -> Vec<ColumnModel> {
        let assignments = self.compute_assignments(artworks.len(), config);
        self.columns_from_assignments(artworks, &assignments, config)
    }

    /// Computes only the (column, variant) choice per artwork index.
    pub fn compute_assignments(&self, count: usize, config: &LayoutConfig) -> Vec<Assignment> {
        let column_count = config.column_count();
        let mut heights = vec![0.0f32; column_count];
        let mut out = Vec::with_capacity(count);

        for index in 0..count {
            let variant = config.variant_for(index);
            let column = match self.strategy {
                PlacementStrategy::RoundRobin => index % column_count,
                PlacementStrategy::ShortestColumn => shortest(&heights),
            };
            heights[column] += config.height_for(variant) + config.gap;
            out.push(Assignment {
                column: column as u32,
                variant,
            });
        }

        out
    }

    /// Rebuilds columns from cached assignments without re-running placement.
    pub fn columns_from_assignments(
        &self,
        artworks: &[Artwork],
        assignments: &[Assignment],
        config: &LayoutConfig,
    ) -> Vec<ColumnModel> {
        let column_count = config.column_count();
        let mut columns: Vec<ColumnModel> = (0..column_count as u32).map(ColumnModel::new).collect();

        for (index, (artwork, assignment)) in artworks.iter().zip(assignments).enumerate() {
            let column = (assignment.column as usize).min(column_count - 1);
            columns[column].push(
                index,
                artwork.id.clone(),
                assignment.variant,
                config.height_for(assignment.variant),
                config.gap,
            );
        }

        columns
    }
}

fn shortest(heights: &[f32]) -> usize {
    let mut best = 0;
    for (i, h) in heights.iter().enumerate().skip(1) {
        if *h < heights[best] {
            best = i;
        }
    }
    best
}

/// Height spread across columns, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BalanceStats {
    pub max_height: f32,
    pub min_height: f32,
    pub avg_height: f32,
    /// `(max - min) / max`, 0 when every column is empty.
    pub imbalance_ratio: f32,
}

impl BalanceStats {
    pub fn of(columns: &[ColumnModel]) -> Self {
        if columns.is_empty() {
            return Self::default();
        }
        let max_height = columns.iter().map(|c| c.height_px).fold(f32::MIN, f32::max);
        let min_height = columns.iter().map(|c| c.height_px).fold(f32::MAX, f32::min);
        let avg_height = columns.iter().map(|c| c.height_px).sum::<f32>() / columns.len() as f32;
        let imbalance_ratio = if max_height > 0.0 {
            (max_height - min_height) / max_height
        } else {
            0.0
        };
        Self {
            max_height,
            min_height,
            avg_height,
            imbalance_ratio,
        }
    }
}

/// Absolute rectangles for every card, ordered by artwork index.
pub fn card_rects(columns: &[ColumnModel], config: &LayoutConfig, container_width: f32) -> Vec<CardRect> {
    let width = config.column_width(container_width);
    let total: usize = columns.iter().map(ColumnModel::len).sum();
    let mut rects = vec![
        CardRect {
            x: 0.0,
            y: 0.0,
            width,
            height: 0.0
        };
        total
    ];

    for (col_idx, column) in columns.iter().enumerate() {
        let x = col_idx as f32 * (width + config.gap);
        for card in &column.items {
            if let Some(rect) = rects.get_mut(card.index) {
                *rect = CardRect {
                    x,
                    y: card.offset_top,
                    width,
                    height: card.display_h,
                };
            }
        }
    }

    rects
}

/// Total content height: the tallest column minus its trailing gap.
pub fn content_height(columns: &[ColumnModel], gap: f32) -> f32 {
    columns
        .iter()
        .filter(|c| !c.is_empty())
        .map(|c| c.height_px - gap)
        .fold(0.0, f32::max)
}
