use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Image shown for cards whose record has no usable image set.
pub const PLACEHOLDER_IMAGE_URL: &str = "/images/placeholder-artwork.svg";

/// Title used when a record arrives without one.
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionUnit {
    #[default]
    Cm,
    In,
    Px,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(default, deserialize_with = "null_as_default")]
    pub width: f32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub height: f32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unit: DimensionUnit,
}

impl Dimensions {
    pub fn aspect_ratio(&self) -> f32 {
        if self.height <= 0.0 || self.width <= 0.0 {
            1.0
        } else {
            self.width / self.height
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSet {
    #[serde(default, deserialize_with = "null_as_default")]
    pub thumbnail: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_size: Vec<String>,
}

/// A single artwork record as served by the catalog API.
///
/// Every field is optional on the wire and `null` reads as absent. The layout
/// engine only reads these values, so absent data is filled with neutral
/// defaults instead of rejecting the record. A blank `id` is assigned by the
/// catalog loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artwork {
    #[serde(alias = "_id", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub medium: String,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dimensions: Dimensions,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default)]
    pub images: Option<ImageSet>,
    #[serde(default = "default_available", deserialize_with = "available_or_default")]
    pub is_available: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_available() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn available_or_default<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_else(default_available))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriceValue {
    Number(f64),
    Text(String),
}

/// Numbers pass through; strings such as `"450"` or `"$1,200.00"` are parsed,
/// and anything unparseable reads as no price.
fn lenient_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<PriceValue>::deserialize(deserializer)? {
        Some(PriceValue::Number(price)) => price,
        Some(PriceValue::Text(text)) => {
            let cleaned: String = text
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            cleaned.parse().unwrap_or(0.0)
        }
        None => 0.0,
    })
}

impl Artwork {
    /// Create an artwork with just the fields the gallery needs to render a card.
    pub fn new(id: impl Into<String>, title: impl Into<String>, thumbnail: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            medium: String::new(),
            price: 0.0,
            dimensions: Dimensions::default(),
            category: String::new(),
            images: Some(ImageSet {
                thumbnail: thumbnail.into(),
                full_size: Vec::new(),
            }),
            is_available: true,
            created_at: None,
            updated_at: None,
        }
    }

    /// Title for display, falling back to a placeholder for blank records.
    pub fn display_title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() {
            UNTITLED
        } else {
            title
        }
    }

    /// URL of the card image, or the placeholder when the image set is missing.
    pub fn thumbnail_url(&self) -> &str {
        match &self.images {
            Some(images) if !images.thumbnail.trim().is_empty() => images.thumbnail.as_str(),
            Some(images) => images
                .full_size
                .iter()
                .find(|url| !url.trim().is_empty())
                .map(String::as_str)
                .unwrap_or(PLACEHOLDER_IMAGE_URL),
            None => PLACEHOLDER_IMAGE_URL,
        }
    }

    /// Full-size URLs in viewer order. Empty when the record has none.
    pub fn full_size_urls(&self) -> &[String] {
        self.images
            .as_ref()
            .map(|images| images.full_size.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_image(&self) -> bool {
        self.thumbnail_url() != PLACEHOLDER_IMAGE_URL
    }

    /// Price is only meaningful when positive; anything else is shown as "on request".
    pub fn listed_price(&self) -> Option<f64> {
        (self.price.is_finite() && self.price > 0.0).then_some(self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_record() {
        let json = r#"{
            "_id": "64f0c2",
            "title": "Monsoon",
            "description": "Acrylic study",
            "medium": "Acrylic on canvas",
            "price": 450.0,
            "dimensions": {"width": 30, "height": 40, "unit": "cm"},
            "category": "abstract",
            "images": {"thumbnail": "/t/monsoon.jpg", "fullSize": ["/f/monsoon.jpg"]},
            "isAvailable": false,
            "createdAt": "2024-03-01T10:00:00Z"
        }"#;
        let artwork: Artwork = serde_json::from_str(json).unwrap();

        assert_eq!(artwork.id, "64f0c2");
        assert_eq!(artwork.thumbnail_url(), "/t/monsoon.jpg");
        assert_eq!(artwork.full_size_urls(), ["/f/monsoon.jpg".to_string()]);
        assert!(!artwork.is_available);
        assert_eq!(artwork.listed_price(), Some(450.0));
        assert!((artwork.dimensions.aspect_ratio() - 0.75).abs() < 1e-6);
        assert!(artwork.created_at.is_some());
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let artwork: Artwork = serde_json::from_str(r#"{"id": "x"}"#).unwrap();

        assert_eq!(artwork.display_title(), UNTITLED);
        assert_eq!(artwork.thumbnail_url(), PLACEHOLDER_IMAGE_URL);
        assert!(artwork.full_size_urls().is_empty());
        assert!(!artwork.has_image());
        assert!(artwork.is_available);
        assert_eq!(artwork.listed_price(), None);
        assert_eq!(artwork.dimensions.aspect_ratio(), 1.0);
    }

    #[test]
    fn test_null_and_string_fields_are_tolerated() {
        let json = r#"{
            "title": null,
            "medium": null,
            "price": "$1,200.50",
            "dimensions": {"width": null, "height": 20, "unit": null},
            "images": {"thumbnail": null, "fullSize": null},
            "isAvailable": null
        }"#;
        let artwork: Artwork = serde_json::from_str(json).unwrap();

        assert!(artwork.id.is_empty());
        assert_eq!(artwork.display_title(), UNTITLED);
        assert_eq!(artwork.listed_price(), Some(1200.5));
        assert_eq!(artwork.dimensions.height, 20.0);
        assert_eq!(artwork.thumbnail_url(), PLACEHOLDER_IMAGE_URL);
        assert!(artwork.is_available);

        let artwork: Artwork = serde_json::from_str(r#"{"id": "p", "price": "on request"}"#).unwrap();
        assert_eq!(artwork.listed_price(), None);
    }

    #[test]
    fn test_blank_thumbnail_uses_first_full_size() {
        let mut artwork = Artwork::new("a", "A", "  ");
        artwork.images.as_mut().unwrap().full_size = vec!["".into(), "/f/a.jpg".into()];
        assert_eq!(artwork.thumbnail_url(), "/f/a.jpg");
    }
}
