//! Core library for packing decal textures into trim atlases.
//!
//! - Packing: guillotine free-list packer (axis / guillotine / alternative splits), pre-packed
//!   panel stacks and a bounded grow-and-retry loop, plus a portfolio over sorts x splits
//! - Trims: every packed box is kept as a resolution-independent trim matrix that converts
//!   to pixel boxes, UV quads and display-plane vertices
//! - Snapping: trims snap to the pixel grid, a coarser grid or explicit guide lines
//! - Compositing: one bitmap per channel, with stretch/repeat policies and height remapping
//!
//! Quick example:
//! ```ignore
//! use trim_atlas_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let cfg = PackerConfig::builder().padding(4).min_resolution(512).build();
//! let mut atlas = AtlasContext::new("demo", "0000", AtlasType::Combined, cfg)?;
//! atlas.add_source(DecalSource::with_size("a", "Panel A", 512, 64).panel(PrepackPolicy::Repeat))?;
//! atlas.add_source(DecalSource::with_size("b", "Bolt", 128, 128))?;
//! let solution = atlas.pack()?;
//! println!("{}", solution.stats().summary());
//! atlas.render_maps(&ImageCrateCodec::default(), std::path::Path::new("out"))?;
//! atlas.record(None)?.write(std::path::Path::new("out/data.json"))?;
//! # Ok(()) }
//! ```

pub mod codec;
pub mod compositing;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod model;
pub mod packer;
pub mod pipeline;
pub mod snap;
pub mod store;
pub mod transform;

pub use codec::*;
pub use compositing::*;
pub use config::*;
pub use context::*;
pub use error::*;
pub use export::*;
pub use model::*;
pub use pipeline::*;
pub use snap::*;
pub use store::*;
pub use transform::*;

/// Convenience prelude for common types and functions.
/// Importing `trim_atlas_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::codec::{AtlasFormat, ImageCodec, ImageCrateCodec, PixelBuffer};
    pub use crate::compositing::{AtlasCompositor, CompositeReport};
    pub use crate::config::{
        GrowthPolicy, PackerConfig, PackerConfigBuilder, SortOrder, SplitHeuristic, TrimSort,
    };
    pub use crate::context::AtlasContext;
    pub use crate::error::{AtlasError, Axis};
    pub use crate::export::{AtlasRecord, MapRecord, TrimRecord, lower_and_upper_pow2};
    pub use crate::model::{
        AtlasMap, AtlasType, ChannelKind, DecalSource, PackStats, PackingSolution,
        PixelBufferRef, PrepackPolicy, Rect, Trim, TrimMatrix,
    };
    pub use crate::pipeline::{PrepackLayout, initiate, pack_best, pack_sources};
    pub use crate::snap::{SnapLines, SnapTarget, snap_trim_matrix};
    pub use crate::store::TrimStore;
    pub use crate::transform::{CoordinateTransform, box_to_uv};
}
