//! Image preloading pipeline for the gallery.
//!
//! This module provides:
//! - `ImagePreloader` - decides which images to warm and in what order
//! - `PreloadQueue` - worker pool that fetches and decodes them
//! - `ImageCache` - LRU memory cache of decoded images
//! - `ImageSource` - where image bytes come from
//!
//! Preloading is opportunistic. A failed or slow request only means a colder
//! cache; it never blocks layout or surfaces an error to the viewer.

pub mod cache;
pub mod planner;
pub mod queue;
pub mod source;

pub use cache::{DecodedImage, ImageCache};
pub use planner::{ImagePreloader, PreloadSettings, PreloadStats};
pub use queue::{PreloadQueue, PreloadQueueBuilder, PreloadRequest, PreloadResult, PreloadSink, PreloadStage};
pub use source::{FsImageSource, ImageSource};
