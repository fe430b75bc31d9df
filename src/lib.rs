//! # folio
//!
//! Core of a responsive masonry gallery for an art portfolio.
//!
//! ```text
//! viewport width ─▶ layout::responsive ─▶ layout::masonry ─▶ column render lists
//!                                    └──▶ animation        ─▶ per-card delay + visibility
//! artwork list ──────────────────────────▶ preload          ─▶ decoded image cache
//! ```
//!
//! | Module | Role |
//! |--------|------|
//! | [`models`] | Artwork records, columns and card placements |
//! | [`layout`] | Breakpoint resolution, column placement, layout cache |
//! | [`animation`] | Staggered reveal driven by intersection |
//! | [`preload`] | Critical / next-batch / scroll preloading, worker queue, image cache |
//! | [`platform`] | Host UI boundary: subscriptions, observers, a headless platform |
//! | [`timing`] | Debounce and frame-throttle primitives on an explicit clock |
//! | [`gallery`] | One mounted gallery wiring the above together |
//! | [`catalog`] | Artwork lists from JSON or from a directory of images |
//! | [`config`] | `config.toml` loading and validation |
//! | [`perf`] | Timing samples for a mounted gallery |
//!
//! Everything that reacts to the platform runs on one thread. The only
//! threads are the preload decode workers, which share nothing with the
//! gallery except the image cache.

pub mod animation;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gallery;
pub mod layout;
pub mod models;
pub mod perf;
pub mod platform;
pub mod preload;
pub mod timing;

pub use error::{ConfigError, FolioError};
pub use gallery::{Gallery, GalleryUpdate};
