use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat};

/// Where image bytes come from. Implementations are shared across worker threads.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Serves image URLs from a local directory, the way a static file server would.
///
/// `/images/a.jpg`, `images/a.jpg` and `file:///<root>/images/a.jpg` all
/// resolve below `root`. Parent-directory components are rejected.
#[derive(Debug, Clone)]
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, url: &str) -> Result<PathBuf> {
        let url = url.trim();
        if url.is_empty() {
            bail!("empty image url");
        }
        if url.contains("://") && !url.starts_with("file://") {
            bail!("unsupported url scheme: {url}");
        }

        let raw = url.strip_prefix("file://").unwrap_or(url);
        let raw = raw.split(['?', '#']).next().unwrap_or(raw);
        let path = Path::new(raw);

        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            bail!("parent directory components are not allowed: {url}");
        }
        if path.is_absolute() && path.starts_with(&self.root) {
            return Ok(path.to_path_buf());
        }

        let relative: PathBuf = path
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        Ok(self.root.join(relative))
    }
}

impl ImageSource for FsImageSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.resolve(url)?;
        std::fs::read(&path).with_context(|| format!("Failed to read image: {:?}", path))
    }
}

/// Decode image bytes. Animated GIFs decode to their first frame.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let format = image::guess_format(bytes).ok();

    if format == Some(ImageFormat::Gif) {
        let decoder = GifDecoder::new(Cursor::new(bytes)).context("Failed to decode GIF")?;
        let mut frames = decoder.into_frames();
        if let Some(frame) = frames.next() {
            let frame = frame.context("Failed to decode GIF frame")?;
            return Ok(DynamicImage::ImageRgba8(frame.into_buffer()));
        }
        return Err(anyhow!("GIF has no frames"));
    }

    match format {
        Some(fmt) => image::load_from_memory_with_format(bytes, fmt).context("Failed to decode image"),
        None => image::load_from_memory(bytes).context("Failed to decode image"),
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::RgbaImage::new(width, height)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}
