use crate::error::{AtlasError, Result};
use crate::model::Rect;
use image::{ImageFormat, RgbaImage, imageops};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Decoded pixels as the compositor works with them.
pub type PixelBuffer = RgbaImage;

/// Output format of rendered atlas maps.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AtlasFormat {
    #[default]
    Png,
    Tga,
}

impl AtlasFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AtlasFormat::Png => "png",
            AtlasFormat::Tga => "tga",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            AtlasFormat::Png => ImageFormat::Png,
            AtlasFormat::Tga => ImageFormat::Tga,
        }
    }
}

impl FromStr for AtlasFormat {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "tga" => Ok(Self::Tga),
            _ => Err(()),
        }
    }
}

/// Image I/O and the few pixel operations compositing needs.
pub trait ImageCodec: Send + Sync {
    fn open(&self, path: &Path) -> Result<PixelBuffer>;
    /// Bicubic resize to exactly `w x h`.
    fn resize(&self, buf: &PixelBuffer, w: u32, h: u32) -> PixelBuffer;
    fn crop(&self, buf: &PixelBuffer, rect: &Rect) -> PixelBuffer;
    /// Pastes `buf` over `canvas` at `(x, y)`, replacing pixels and clipping at the canvas edge.
    fn composite(&self, canvas: &mut PixelBuffer, buf: &PixelBuffer, x: u32, y: u32);
    fn save(&self, buf: &PixelBuffer, path: &Path) -> Result<()>;
    /// File extension of saved maps, without the dot.
    fn extension(&self) -> &'static str;
}

/// [`ImageCodec`] backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateCodec {
    pub format: AtlasFormat,
}

impl ImageCrateCodec {
    pub fn new(format: AtlasFormat) -> Self {
        Self { format }
    }
}

impl ImageCodec for ImageCrateCodec {
    fn open(&self, path: &Path) -> Result<PixelBuffer> {
        Ok(image::open(path)?.to_rgba8())
    }

    fn resize(&self, buf: &PixelBuffer, w: u32, h: u32) -> PixelBuffer {
        if buf.dimensions() == (w, h) {
            return buf.clone();
        }
        imageops::resize(buf, w, h, imageops::FilterType::CatmullRom)
    }

    fn crop(&self, buf: &PixelBuffer, rect: &Rect) -> PixelBuffer {
        imageops::crop_imm(buf, rect.x, rect.y, rect.w, rect.h).to_image()
    }

    fn composite(&self, canvas: &mut PixelBuffer, buf: &PixelBuffer, x: u32, y: u32) {
        imageops::replace(canvas, buf, x as i64, y as i64);
    }

    fn save(&self, buf: &PixelBuffer, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // atlas maps are opaque
        image::DynamicImage::ImageRgba8(buf.clone())
            .to_rgb8()
            .save_with_format(path, self.format.image_format())
            .map_err(AtlasError::from)
    }

    fn extension(&self) -> &'static str {
        self.format.extension()
    }
}
