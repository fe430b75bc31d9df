//! Gallery configuration file.
//!
//! Loaded from `config.toml` in the user config directory
//! (`~/.config/folio/config.toml` on Linux). Every section is optional:
//!
//! ```toml
//! [breakpoints]
//! tablet = 768
//! desktop = 1024
//! large = 1280
//!
//! [overrides.desktop]
//! columns = 5
//! gap = 24.0
//! card_variants = ["medium", "large"]
//! distribution = { small = 0, medium = 60, large = 40 }
//!
//! [layout]
//! strategy = "round-robin"    # or "shortest-column"
//! resize_debounce_ms = 150
//!
//! [animation]
//! enabled = true
//! respect_reduced_motion = true
//! threshold = 0.1
//! root_margin_px = 50.0
//!
//! [preload]
//! critical_count = 6
//! next_batch_size = 6
//! next_batch_delay_ms = 1000
//! workers = 2
//! max_memory_mb = 64
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::layout::{Breakpoint, LayoutOverride, Overrides, PlacementStrategy, ResponsiveConfig, Thresholds};
use crate::platform::ObserverOptions;
use crate::preload::cache::DEFAULT_MAX_MEMORY_MB;
use crate::preload::queue::DEFAULT_WORKERS;
use crate::preload::PreloadSettings;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    pub breakpoints: Thresholds,
    pub overrides: Overrides,
    pub layout: LayoutSection,
    pub animation: AnimationSection,
    pub preload: PreloadSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutSection {
    pub strategy: PlacementStrategy,
    /// Quiet period after the last resize before the layout is recomputed.
    pub resize_debounce_ms: u64,
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            strategy: PlacementStrategy::RoundRobin,
            resize_debounce_ms: 150,
        }
    }
}

impl LayoutSection {
    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnimationSection {
    /// When false every card is revealed at mount without waiting for intersection.
    pub enabled: bool,
    pub respect_reduced_motion: bool,
    pub threshold: f32,
    pub root_margin_px: f32,
}

impl Default for AnimationSection {
    fn default() -> Self {
        let observer = ObserverOptions::default();
        Self {
            enabled: true,
            respect_reduced_motion: true,
            threshold: observer.threshold,
            root_margin_px: observer.root_margin_px,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreloadSection {
    pub critical_count: usize,
    pub next_batch_size: usize,
    pub next_batch_delay_ms: u64,
    pub scroll_window_before: usize,
    pub scroll_window_after: usize,
    pub estimated_row_height: f32,
    /// Decode worker threads, clamped to 1-4.
    pub workers: usize,
    /// Decoded image cache budget, clamped to 16-512.
    pub max_memory_mb: usize,
}

impl Default for PreloadSection {
    fn default() -> Self {
        let settings = PreloadSettings::default();
        Self {
            critical_count: settings.critical_count,
            next_batch_size: settings.next_batch_size,
            next_batch_delay_ms: settings.next_batch_delay_ms,
            scroll_window_before: settings.scroll_window_before,
            scroll_window_after: settings.scroll_window_after,
            estimated_row_height: settings.estimated_row_height,
            workers: DEFAULT_WORKERS,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
        }
    }
}

impl PreloadSection {
    pub fn settings(&self) -> PreloadSettings {
        PreloadSettings {
            critical_count: self.critical_count,
            next_batch_size: self.next_batch_size,
            next_batch_delay_ms: self.next_batch_delay_ms,
            scroll_window_before: self.scroll_window_before,
            scroll_window_after: self.scroll_window_after,
            estimated_row_height: self.estimated_row_height,
        }
    }
}

impl GalleryConfig {
    /// Validate values the resolver cannot repair on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.breakpoints;
        if !(t.tablet < t.desktop && t.desktop <= t.large) {
            return Err(ConfigError::Validation(format!(
                "breakpoints must increase: tablet {} < desktop {} <= large {}",
                t.tablet, t.desktop, t.large
            )));
        }

        for bp in [Breakpoint::Mobile, Breakpoint::Tablet, Breakpoint::Desktop] {
            if let Some(ov) = self.overrides.get(bp) {
                validate_override(bp, ov)?;
            }
        }

        if !(0.0..=1.0).contains(&self.animation.threshold) {
            return Err(ConfigError::Validation(
                "animation.threshold must be within 0-1".into(),
            ));
        }
        if self.animation.root_margin_px < 0.0 {
            return Err(ConfigError::Validation(
                "animation.root_margin_px must not be negative".into(),
            ));
        }
        if self.preload.estimated_row_height <= 0.0 {
            return Err(ConfigError::Validation(
                "preload.estimated_row_height must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: GalleryConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path. The file must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!(?path, "Loaded gallery config");
        Ok(config)
    }

    /// Load from the default location, falling back to defaults when no file exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            path => {
                debug!(?path, "No gallery config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load `path` if given, otherwise the default location.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load_default(),
        }
    }

    pub fn responsive(&self) -> ResponsiveConfig {
        ResponsiveConfig {
            thresholds: self.breakpoints,
            overrides: self.overrides.clone(),
            respect_reduced_motion: self.animation.respect_reduced_motion,
        }
    }

    pub fn observer_options(&self) -> ObserverOptions {
        ObserverOptions {
            threshold: self.animation.threshold,
            root_margin_px: self.animation.root_margin_px,
        }
    }
}

fn validate_override(bp: Breakpoint, ov: &LayoutOverride) -> Result<(), ConfigError> {
    if ov.columns == Some(0) {
        return Err(ConfigError::Validation(format!(
            "overrides.{bp}.columns must be at least 1"
        )));
    }
    if ov.gap.is_some_and(|gap| gap < 0.0) {
        return Err(ConfigError::Validation(format!(
            "overrides.{bp}.gap must not be negative"
        )));
    }
    if ov.card_variants.as_ref().is_some_and(Vec::is_empty) {
        return Err(ConfigError::Validation(format!(
            "overrides.{bp}.card_variants must not be empty"
        )));
    }
    if let Some(distribution) = ov.distribution {
        if distribution.total() != 100 {
            return Err(ConfigError::Validation(format!(
                "overrides.{bp}.distribution must sum to 100, got {}",
                distribution.total()
            )));
        }
    }
    Ok(())
}

/// `<config dir>/folio/config.toml`, if a home directory can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "folio").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Configuration with every key at its default, under a short header.
pub fn stock_config_toml() -> String {
    let defaults = GalleryConfig::default();
    let body = toml::to_string_pretty(&defaults).unwrap_or_default();
    format!("# folio gallery configuration\n# All settings are optional. Values shown are the defaults.\n\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardVariant;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = GalleryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.breakpoints.tablet, 768);
        assert_eq!(config.layout.resize_debounce(), Duration::from_millis(150));
        assert_eq!(config.preload.settings(), PreloadSettings::default());
        assert_eq!(config.observer_options(), ObserverOptions::default());
        assert!(config.responsive().respect_reduced_motion);
    }

    #[test]
    fn test_parse_overrides() {
        let config = GalleryConfig::from_toml(
            r#"
[overrides.desktop]
columns = 5
card_variants = ["medium", "large"]
distribution = { small = 0, medium = 60, large = 40 }

[layout]
strategy = "shortest-column"
"#,
        )
        .unwrap();

        assert_eq!(config.layout.strategy, PlacementStrategy::ShortestColumn);
        let resolved = config.responsive().resolve(1400, false);
        assert_eq!(resolved.columns, 5);
        assert_eq!(resolved.card_variants, vec![CardVariant::Medium, CardVariant::Large]);
        // Mobile is untouched.
        assert_eq!(config.responsive().resolve(400, false).columns, 1);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = GalleryConfig::from_toml("[layout]\ncolumns = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            "[breakpoints]\ntablet = 1100\ndesktop = 1024\n",
            "[overrides.tablet]\ncolumns = 0\n",
            "[overrides.mobile]\ncard_variants = []\n",
            "[overrides.mobile]\ndistribution = { small = 50, medium = 10 }\n",
            "[animation]\nthreshold = 1.5\n",
            "[preload]\nestimated_row_height = 0.0\n",
        ];
        for case in cases {
            let err = GalleryConfig::from_toml(case).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "{case}: {err}");
        }
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[animation]\nenabled = false\n").unwrap();

        let config = GalleryConfig::load(&path).unwrap();
        assert!(!config.animation.enabled);
        assert_eq!(config.preload.workers, DEFAULT_WORKERS);

        let missing = tmp.path().join("missing.toml");
        assert!(matches!(GalleryConfig::load(&missing), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_stock_config_parses_back() {
        let stock = stock_config_toml();
        let parsed = GalleryConfig::from_toml(&stock).unwrap();
        assert_eq!(parsed, GalleryConfig::default());
    }
}
