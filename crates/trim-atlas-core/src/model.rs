use crate::config::{SortOrder, SplitHeuristic};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge (`x + w`).
    pub fn x2(&self) -> u32 {
        self.x + self.w
    }
    /// Exclusive bottom edge (`y + h`).
    pub fn y2(&self) -> u32 {
        self.y + self.h
    }
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
    /// Returns true if `r` is fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.x2() <= self.x2() && r.y2() <= self.y2()
    }
    /// Returns true if the interiors of both rectangles overlap.
    pub fn intersects(&self, r: &Rect) -> bool {
        !(self.x >= r.x2() || r.x >= self.x2() || self.y >= r.y2() || r.y >= self.y2())
    }
}

/// How a panel decal's native resolution is reconciled with its packed cell.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrepackPolicy {
    #[default]
    None,
    Stretch,
    Repeat,
}

impl FromStr for PrepackPolicy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "stretch" => Ok(Self::Stretch),
            "repeat" => Ok(Self::Repeat),
            _ => Err(()),
        }
    }
}

/// Texture channel ("map") of an atlas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelKind {
    Color,
    Normal,
    AoCurvHeight,
    Emission,
    Masks,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 5] = [
        ChannelKind::Color,
        ChannelKind::Normal,
        ChannelKind::AoCurvHeight,
        ChannelKind::Emission,
        ChannelKind::Masks,
    ];

    /// Lowercase file stem used for per-channel textures (`ao_curv_height.png`).
    pub fn file_stem(&self) -> &'static str {
        match self {
            ChannelKind::Color => "color",
            ChannelKind::Normal => "normal",
            ChannelKind::AoCurvHeight => "ao_curv_height",
            ChannelKind::Emission => "emission",
            ChannelKind::Masks => "masks",
        }
    }

    /// Neutral value for a source that never authored this channel.
    pub fn neutral_fill(&self) -> [u8; 3] {
        match self {
            ChannelKind::Color => [128, 128, 128],
            ChannelKind::Normal => [128, 128, 255],
            ChannelKind::AoCurvHeight => [255, 128, 128],
            ChannelKind::Emission => [0, 0, 0],
            ChannelKind::Masks => [255, 0, 0],
        }
    }

    /// Background of the atlas bitmap outside any placed box.
    pub fn atlas_fill(&self) -> [u8; 3] {
        match self {
            ChannelKind::Masks => [0, 0, 0],
            other => other.neutral_fill(),
        }
    }

    /// Band carrying a height/displacement signal, if any.
    pub fn height_band(&self) -> Option<usize> {
        match self {
            ChannelKind::AoCurvHeight => Some(2),
            _ => None,
        }
    }
}

impl FromStr for ChannelKind {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "color" => Ok(Self::Color),
            "normal" => Ok(Self::Normal),
            "ao_curv_height" | "aocurvheight" => Ok(Self::AoCurvHeight),
            "emission" => Ok(Self::Emission),
            "masks" => Ok(Self::Masks),
            _ => Err(()),
        }
    }
}

/// Which decal types an atlas merges, and therefore which channels it renders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AtlasType {
    Combined,
    Normal,
    Info,
}

impl AtlasType {
    pub fn channels(&self) -> Vec<ChannelKind> {
        match self {
            AtlasType::Combined => ChannelKind::ALL.to_vec(),
            AtlasType::Normal => vec![
                ChannelKind::Normal,
                ChannelKind::AoCurvHeight,
                ChannelKind::Emission,
                ChannelKind::Masks,
            ],
            AtlasType::Info => vec![ChannelKind::Color, ChannelKind::Emission, ChannelKind::Masks],
        }
    }
}

impl FromStr for AtlasType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "combined" => Ok(Self::Combined),
            "normal" => Ok(Self::Normal),
            "info" => Ok(Self::Info),
            _ => Err(()),
        }
    }
}

/// Location of one channel's pixels for a decal.
#[derive(Debug, Clone)]
pub enum PixelBufferRef {
    /// Encoded image on disk with its known resolution.
    File { path: PathBuf, size: (u32, u32) },
    /// Already decoded buffer.
    Memory(Arc<RgbaImage>),
}

impl PixelBufferRef {
    pub fn size(&self) -> (u32, u32) {
        match self {
            PixelBufferRef::File { size, .. } => *size,
            PixelBufferRef::Memory(img) => img.dimensions(),
        }
    }
}

/// One packable decal.
#[derive(Debug, Clone)]
pub struct DecalSource {
    /// Stable unique key (the decal uuid).
    pub id: String,
    pub name: String,
    /// Packed cell size. Starts as the largest channel resolution and follows the trim once
    /// it is edited and the atlas is tweaked or repacked.
    pub size: (u32, u32),
    /// Authored size (largest channel). Channel buffers are upscaled to it before fitting and
    /// trims reset to it.
    pub original_size: (u32, u32),
    pub is_panel: bool,
    pub prepack: PrepackPolicy,
    pub height_scale: f32,
    /// Tile count from the last REPEAT composite.
    pub repetitions: Option<u32>,
    pub channels: BTreeMap<ChannelKind, PixelBufferRef>,
}

impl DecalSource {
    /// Builds a source from its channel buffers; `size` becomes the largest channel
    /// (widest first, then tallest).
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        channels: BTreeMap<ChannelKind, PixelBufferRef>,
    ) -> Self {
        let size = channels
            .values()
            .map(|c| c.size())
            .max()
            .unwrap_or((0, 0));
        Self {
            id: id.into(),
            name: name.into(),
            size,
            original_size: size,
            is_panel: false,
            prepack: PrepackPolicy::None,
            height_scale: 1.0,
            repetitions: None,
            channels,
        }
    }

    /// Source without pixel data, for layout-only packing.
    pub fn with_size(id: impl Into<String>, name: impl Into<String>, w: u32, h: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size: (w, h),
            original_size: (w, h),
            is_panel: false,
            prepack: PrepackPolicy::None,
            height_scale: 1.0,
            repetitions: None,
            channels: BTreeMap::new(),
        }
    }

    /// Marks the source as a panel decal with the given prepack policy.
    pub fn panel(mut self, prepack: PrepackPolicy) -> Self {
        self.is_panel = true;
        self.prepack = prepack;
        self
    }

    pub fn height_scale(mut self, v: f32) -> Self {
        self.height_scale = v;
        self
    }

    /// Prepack policy as the packer sees it; only panels are ever prepacked.
    pub fn effective_prepack(&self) -> PrepackPolicy {
        if self.is_panel {
            self.prepack
        } else {
            PrepackPolicy::None
        }
    }

    pub fn is_prepacked(&self) -> bool {
        self.effective_prepack() != PrepackPolicy::None
    }
}

/// Packer output for one resolution. Replaced wholesale on every repack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackingSolution {
    pub resolution: (u32, u32),
    pub free_boxes: Vec<Rect>,
    /// Placed boxes keyed by source id, in placement order.
    pub placed_boxes: Vec<(String, Rect)>,
    pub padding: u32,
    pub split: SplitHeuristic,
    pub sort_order: SortOrder,
    /// Number of canvases tried, including the successful one.
    pub attempts: u32,
}

impl PackingSolution {
    pub fn placed_box(&self, id: &str) -> Option<&Rect> {
        self.placed_boxes
            .iter()
            .find(|(k, _)| k == id)
            .map(|(_, r)| r)
    }

    /// Share of the canvas covered by placed boxes (0.0 to 1.0).
    pub fn efficiency(&self) -> f64 {
        self.stats().occupancy
    }

    /// Vertical space left below the lowest placed box.
    pub fn gap(&self) -> u32 {
        let lowest = self
            .placed_boxes
            .iter()
            .map(|(_, r)| r.y2())
            .max()
            .unwrap_or(0);
        self.resolution.1.saturating_sub(lowest)
    }

    /// Computes packing statistics for this solution.
    pub fn stats(&self) -> PackStats {
        let total_area = self.resolution.0 as u64 * self.resolution.1 as u64;
        let used_area: u64 = self.placed_boxes.iter().map(|(_, r)| r.area()).sum();
        let occupancy = if total_area > 0 {
            used_area as f64 / total_area as f64
        } else {
            0.0
        };
        PackStats {
            num_boxes: self.placed_boxes.len(),
            num_free_boxes: self.free_boxes.len(),
            resolution: self.resolution,
            total_area,
            used_area,
            occupancy,
            gap: self.gap(),
            attempts: self.attempts,
        }
    }
}

/// Statistics about atlas packing efficiency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PackStats {
    pub num_boxes: usize,
    pub num_free_boxes: usize,
    pub resolution: (u32, u32),
    /// Canvas area (width * height).
    pub total_area: u64,
    /// Sum of placed box areas.
    pub used_area: u64,
    /// used_area / total_area (0.0 to 1.0).
    pub occupancy: f64,
    /// Rows left unused below the lowest placement.
    pub gap: u32,
    pub attempts: u32,
}

impl PackStats {
    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Boxes: {}, Resolution: {}x{}, Occupancy: {:.2}%, Gap: {} px, Attempts: {}",
            self.num_boxes,
            self.resolution.0,
            self.resolution.1,
            self.occupancy * 100.0,
            self.gap,
            self.attempts,
        )
    }
}

/// Packed rect expressed as translation (world units, origin at atlas center, Y up) and
/// scale normalized to the atlas resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrimMatrix {
    pub translation: [f64; 2],
    pub scale: [f64; 2],
}

impl TrimMatrix {
    pub fn new(translation: [f64; 2], scale: [f64; 2]) -> Self {
        Self { translation, scale }
    }
}

/// Persisted placement of one decal inside an atlas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trim {
    pub uuid: String,
    pub name: String,
    pub matrix: TrimMatrix,
    pub is_panel: bool,
    pub is_active: bool,
    pub original_size: (u32, u32),
    pub prepack: PrepackPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetitions: Option<u32>,
    /// Caller-attached handle of the quad displaying this trim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// One rendered channel bitmap.
#[derive(Debug, Clone)]
pub struct AtlasMap {
    pub channel: ChannelKind,
    pub resolution: (u32, u32),
    pub rgba: RgbaImage,
}
