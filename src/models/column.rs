use serde::{Deserialize, Serialize};

/// Card size variant. Each variant maps to a fixed target height per breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardVariant {
    Small,
    Medium,
    Large,
}

impl CardVariant {
    pub const ALL: [CardVariant; 3] = [CardVariant::Small, CardVariant::Medium, CardVariant::Large];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl std::fmt::Display for CardVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One card inside a column.
#[derive(Debug, Clone, PartialEq)]
pub struct CardPlacement {
    /// Position of the artwork in the input list. Drives the reveal delay.
    pub index: usize,
    pub artwork_id: String,
    pub variant: CardVariant,
    pub display_h: f32,
    /// Distance from the top of the column to the top of this card.
    pub offset_top: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnModel {
    pub column_index: u32,
    /// Running total: card heights plus one gap per card.
    pub height_px: f32,
    pub items: Vec<CardPlacement>,
}

impl ColumnModel {
    pub fn new(column_index: u32) -> Self {
        Self {
            column_index,
            height_px: 0.0,
            items: Vec::new(),
        }
    }

    /// Append a card and advance the running height.
    pub fn push(&mut self, index: usize, artwork_id: String, variant: CardVariant, height: f32, gap: f32) {
        self.items.push(CardPlacement {
            index,
            artwork_id,
            variant,
            display_h: height,
            offset_top: self.height_px,
        });
        self.height_px += height + gap;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Absolute card rectangle inside the gallery container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CardRect {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Fraction of this rect's height that lies inside the vertical band `[top, bottom)`.
    pub fn visible_fraction(&self, top: f32, bottom: f32) -> f32 {
        if self.height <= 0.0 {
            return if self.y >= top && self.y < bottom { 1.0 } else { 0.0 };
        }
        let overlap = self.bottom().min(bottom) - self.y.max(top);
        (overlap.max(0.0) / self.height).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_accumulates_height_and_offsets() {
        let mut column = ColumnModel::new(0);
        column.push(0, "a".into(), CardVariant::Small, 250.0, 20.0);
        column.push(3, "b".into(), CardVariant::Large, 450.0, 20.0);

        assert_eq!(column.len(), 2);
        assert_eq!(column.items[0].offset_top, 0.0);
        assert_eq!(column.items[1].offset_top, 270.0);
        assert_eq!(column.height_px, 740.0);
    }

    #[test]
    fn test_visible_fraction() {
        let rect = CardRect {
            x: 0.0,
            y: 100.0,
            width: 200.0,
            height: 200.0,
        };
        assert_eq!(rect.visible_fraction(0.0, 100.0), 0.0);
        assert_eq!(rect.visible_fraction(0.0, 200.0), 0.5);
        assert_eq!(rect.visible_fraction(0.0, 1000.0), 1.0);
    }
}
