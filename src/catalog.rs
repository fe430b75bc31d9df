//! Artwork catalogs.
//!
//! A catalog is either a JSON document (a bare array of artwork records, or
//! the API envelope `{"success": true, "data": [...]}`) or a directory of
//! image files scanned into one record per image.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::ImageReader;
use serde_json::Value;
use tokio::task;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use crate::error::FolioError;
use crate::models::{Artwork, DimensionUnit, Dimensions, ImageSet};

/// Records returned by the API when no limit is given.
pub const DEFAULT_LIMIT: usize = 100;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"];

/// Parse a catalog document: a bare array of records, or an envelope whose
/// `data` holds them. An envelope reporting `success: false` is an error.
///
/// Records are read one at a time. A record that still fails to parse is
/// logged and skipped, and a record without an id gets `artwork-<position>`.
pub fn parse_catalog(json: &str) -> Result<Vec<Artwork>, FolioError> {
    let records = match serde_json::from_str::<Value>(json)? {
        Value::Array(records) => records,
        Value::Object(mut envelope) => {
            let success = match envelope.remove("success") {
                None | Some(Value::Null) => true,
                Some(Value::Bool(success)) => success,
                Some(other) => {
                    return Err(FolioError::InvalidCatalog(format!(
                        "`success` must be a boolean, got {other}"
                    )))
                }
            };
            if !success {
                return Err(FolioError::InvalidCatalog(
                    "catalog response reported failure".into(),
                ));
            }
            match envelope.remove("data") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(records)) => records,
                Some(other) => {
                    return Err(FolioError::InvalidCatalog(format!(
                        "`data` must be an array, got {}",
                        json_type(&other)
                    )))
                }
            }
        }
        other => {
            return Err(FolioError::InvalidCatalog(format!(
                "expected an array or an object, got {}",
                json_type(&other)
            )))
        }
    };

    let total = records.len();
    let artworks: Vec<Artwork> = records
        .into_iter()
        .enumerate()
        .filter_map(|(position, record)| artwork_from_record(position, record))
        .collect();
    if artworks.len() < total {
        warn!(skipped = total - artworks.len(), total, "Skipped malformed catalog records");
    }
    Ok(artworks)
}

fn artwork_from_record(position: usize, record: Value) -> Option<Artwork> {
    match serde_json::from_value::<Artwork>(record) {
        Ok(mut artwork) => {
            if artwork.id.trim().is_empty() {
                artwork.id = format!("artwork-{position}");
            }
            Some(artwork)
        }
        Err(e) => {
            warn!(position, "Skipping catalog record: {}", e);
            None
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Load a catalog file, keeping at most `limit` records.
pub fn load_catalog(path: &Path, limit: Option<usize>) -> Result<Vec<Artwork>, FolioError> {
    let json = fs::read_to_string(path).map_err(|source| FolioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut artworks = parse_catalog(&json)?;
    artworks.truncate(limit.unwrap_or(DEFAULT_LIMIT));
    debug!(?path, count = artworks.len(), "Loaded catalog");
    Ok(artworks)
}

pub fn save_catalog(path: &Path, artworks: &[Artwork]) -> Result<()> {
    let json = serde_json::to_string_pretty(artworks).context("Failed to serialize catalog")?;
    fs::write(path, json).with_context(|| format!("Failed to write catalog: {:?}", path))
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Scan `dir` for images on a blocking thread.
pub async fn scan_directory(dir: &Path) -> Result<Vec<Artwork>> {
    let dir = dir.to_path_buf();
    task::spawn_blocking(move || scan_directory_sync(&dir))
        .await
        .context("Scan task panicked")?
}

/// One artwork per image below `dir`, in file name order.
///
/// Image URLs are root-relative paths, so an [`FsImageSource`] rooted at
/// `dir` serves them back.
///
/// [`FsImageSource`]: crate::preload::FsImageSource
pub fn scan_directory_sync(dir: &Path) -> Result<Vec<Artwork>> {
    info!("Starting scan of {:?}", dir);
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {:?}", dir);
    }

    let mut artworks = Vec::new();
    let walker = WalkDir::new(dir).follow_links(false).sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error walking directory: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_image_file(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        artworks.push(artwork_for(entry.path(), relative));
    }

    info!("Scan complete: {} images", artworks.len());
    Ok(artworks)
}

fn artwork_for(path: &Path, relative: &Path) -> Artwork {
    let url = url_for(relative);
    let title = relative
        .file_stem()
        .and_then(|s| s.to_str())
        .map(title_from_stem)
        .unwrap_or_default();

    let mut artwork = Artwork::new(url.trim_start_matches('/'), title, url.clone());
    artwork.images = Some(ImageSet {
        thumbnail: url.clone(),
        full_size: vec![url],
    });
    if let Some((width, height)) = image_dimensions(path) {
        artwork.dimensions = Dimensions {
            width: width as f32,
            height: height as f32,
            unit: DimensionUnit::Px,
        };
    }
    artwork.created_at = modified_at(path);
    artwork.updated_at = artwork.created_at;
    artwork
}

fn url_for(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/{}", parts.join("/"))
}

/// `blue-heron_study` → `Blue Heron Study`.
fn title_from_stem(stem: &str) -> String {
    stem.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Header-only dimension read; `None` for unreadable files.
fn image_dimensions(path: &Path) -> Option<(u32, u32)> {
    let reader = match ImageReader::open(path).and_then(|r| r.with_guessed_format()) {
        Ok(reader) => reader,
        Err(e) => {
            warn!("Failed to open image {:?}: {}", path, e);
            return None;
        }
    };
    match reader.into_dimensions() {
        Ok(dims) => {
            trace!("Got dimensions {}x{} for {:?}", dims.0, dims.1, path);
            Some(dims)
        }
        Err(e) => {
            warn!("Failed to read image dimensions for {:?}: {}", path, e);
            None
        }
    }
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Default catalog output next to the scanned directory.
pub fn default_catalog_path(dir: &Path) -> PathBuf {
    dir.join("catalog.json")
}
