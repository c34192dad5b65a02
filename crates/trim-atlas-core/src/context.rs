use crate::codec::ImageCodec;
use crate::compositing::{AtlasCompositor, CompositeReport};
use crate::config::PackerConfig;
use crate::error::{AtlasError, Result};
use crate::export::{AtlasRecord, MapRecord};
use crate::model::{AtlasType, ChannelKind, DecalSource, PackingSolution, PrepackPolicy, Rect};
use crate::pipeline::pack_sources;
use crate::snap::SnapTarget;
use crate::store::TrimStore;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Everything that belongs to one atlas: its decals, the current packing and the trims.
#[derive(Debug, Clone)]
pub struct AtlasContext {
    pub name: String,
    pub uuid: String,
    pub atlas_type: AtlasType,
    config: PackerConfig,
    sources: Vec<DecalSource>,
    solution: Option<PackingSolution>,
    store: TrimStore,
    maps: BTreeMap<ChannelKind, MapRecord>,
    /// Trims changed since the solution was last built.
    edited: bool,
}

impl AtlasContext {
    pub fn new(
        name: impl Into<String>,
        uuid: impl Into<String>,
        atlas_type: AtlasType,
        config: PackerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            uuid: uuid.into(),
            atlas_type,
            store: TrimStore::new(config.transform()),
            config,
            sources: Vec::new(),
            solution: None,
            maps: BTreeMap::new(),
            edited: false,
        })
    }

    pub fn config(&self) -> &PackerConfig {
        &self.config
    }

    pub fn sources(&self) -> &[DecalSource] {
        &self.sources
    }

    pub fn solution(&self) -> Option<&PackingSolution> {
        self.solution.as_ref()
    }

    pub fn store(&self) -> &TrimStore {
        &self.store
    }

    /// Mutable trims. The next render rebuilds the solution from them.
    pub fn store_mut(&mut self) -> &mut TrimStore {
        self.edited = true;
        &mut self.store
    }

    pub fn channels(&self) -> Vec<ChannelKind> {
        self.atlas_type.channels()
    }

    /// Adds a decal; ids must be unique within the atlas.
    pub fn add_source(&mut self, source: DecalSource) -> Result<()> {
        if self.sources.iter().any(|s| s.id == source.id) {
            return Err(AtlasError::InvalidInput(format!(
                "decal '{}' is already part of the atlas",
                source.id
            )));
        }
        self.sources.push(source);
        Ok(())
    }

    /// Drops a decal together with its trim and placed box. The freed cell stays empty
    /// until the next repack.
    pub fn remove_source(&mut self, id: &str) -> Result<DecalSource> {
        let idx = self
            .sources
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| AtlasError::UnknownTrim(id.to_string()))?;
        if self.store.get(id).is_some() {
            self.store.remove(id)?;
        }
        if let Some(solution) = &mut self.solution {
            solution.placed_boxes.retain(|(k, _)| k != id);
        }
        Ok(self.sources.remove(idx))
    }

    #[instrument(skip_all, fields(atlas = %self.name))]
    /// First pack: computes a solution and creates one trim per decal.
    pub fn pack(&mut self) -> Result<&PackingSolution> {
        let solution = pack_sources(&self.sources, &self.config)?;
        self.store
            .add_trims(&self.sources, &solution, self.config.trim_sort)?;
        info!(summary = %solution.stats().summary(), "atlas packed");
        self.edited = false;
        Ok(self.solution.insert(solution))
    }

    #[instrument(skip_all, fields(atlas = %self.name))]
    /// Packs again from scratch, keeping per-trim state for decals that are still present.
    ///
    /// Decals that already have a trim are packed at the trim's current pixel size, so snapped
    /// or stretched trims keep their shape.
    pub fn repack(&mut self) -> Result<&PackingSolution> {
        if self.solution.is_none() {
            return self.pack();
        }
        self.sizes_from_trims();
        let solution = pack_sources(&self.sources, &self.config)?;
        self.store
            .refresh_trims(&self.sources, &solution, self.config.trim_sort)?;
        info!(summary = %solution.stats().summary(), "atlas repacked");
        self.edited = false;
        Ok(self.solution.insert(solution))
    }

    fn sizes_from_trims(&mut self) {
        let resolution = self.store.resolution();
        let transform = *self.store.transform();
        for trim in self.store.iter() {
            if let Some(src) = self.sources.iter_mut().find(|s| s.id == trim.uuid) {
                let (_, dims) = transform.trim_matrix_to_coords(&trim.matrix, resolution);
                src.size = dims;
            }
        }
    }

    #[instrument(skip_all, fields(atlas = %self.name))]
    /// Rebuilds the solution from the current trims without packing, so trim edits reach the
    /// rendered maps.
    ///
    /// With `resolution` the canvas becomes `resolution x resolution` and every trim keeps its
    /// pixel placement; pre-packed panels are widened to the new canvas. Sources take the
    /// sizes of their new boxes. Free boxes are not tracked for a tweaked solution.
    pub fn tweak(&mut self, resolution: Option<u32>) -> Result<&PackingSolution> {
        let current = self.solution.as_ref().ok_or(AtlasError::NotPacked)?;
        let old = self.store.resolution();
        let new = match resolution {
            Some(0) => {
                return Err(AtlasError::InvalidDimensions {
                    width: 0,
                    height: 0,
                });
            }
            Some(r) => (r, r),
            None => old,
        };
        let transform = *self.store.transform();

        let mut placed_boxes: Vec<(String, Rect)> = Vec::with_capacity(current.placed_boxes.len());
        for (id, _) in &current.placed_boxes {
            let trim = self
                .store
                .get(id)
                .ok_or_else(|| AtlasError::UnknownTrim(id.clone()))?;
            let matrix = if new != old {
                transform.reframe_matrix(&trim.matrix, old, new)
            } else {
                trim.matrix
            };
            let mut rect = transform.trim_matrix_to_box(&matrix, new);
            if resolution.is_some() && trim.is_panel && trim.prepack != PrepackPolicy::None {
                rect.w = new.0;
            }
            if rect.is_empty() {
                return Err(AtlasError::InvalidDimensions {
                    width: rect.w,
                    height: rect.h,
                });
            }
            placed_boxes.push((id.clone(), rect));
        }
        let solution = PackingSolution {
            resolution: new,
            free_boxes: Vec::new(),
            placed_boxes,
            padding: current.padding,
            split: current.split,
            sort_order: current.sort_order,
            attempts: current.attempts,
        };

        for (id, rect) in &solution.placed_boxes {
            if let Some(src) = self.sources.iter_mut().find(|s| &s.id == id) {
                src.size = (rect.w, rect.h);
            }
        }
        self.store
            .refresh_trims(&self.sources, &solution, self.config.trim_sort)?;
        debug!(resolution = new.0, boxes = solution.placed_boxes.len(), "atlas tweaked");
        self.edited = false;
        Ok(self.solution.insert(solution))
    }

    /// Resets a trim to its authored size; panels also stop being pre-packed.
    pub fn reset_trim_scale(&mut self, uuid: &str) -> Result<()> {
        self.store.reset_trim_scale(uuid)?;
        let is_panel = self.store.get(uuid).is_some_and(|t| t.is_panel);
        if is_panel {
            if let Some(src) = self.sources.iter_mut().find(|s| s.id == uuid) {
                src.prepack = PrepackPolicy::None;
            }
        }
        self.edited = true;
        Ok(())
    }

    pub fn stretch_trim_scale(&mut self, uuid: &str) -> Result<()> {
        self.store.stretch_trim_scale(uuid)?;
        self.edited = true;
        Ok(())
    }

    pub fn snap_trim(&mut self, uuid: &str, target: &SnapTarget) -> Result<()> {
        self.store.apply_snap(uuid, target)?;
        self.edited = true;
        Ok(())
    }

    /// Renders every channel of the atlas type into `dir`.
    ///
    /// Edited trims are tweaked into the solution first. A failing channel does not stop the
    /// others; tile counts from successful channels are written back to the decals and their
    /// trims.
    #[instrument(skip_all, fields(atlas = %self.name))]
    pub fn render_maps<C: ImageCodec + ?Sized>(
        &mut self,
        codec: &C,
        dir: &Path,
    ) -> Result<Vec<(ChannelKind, Result<CompositeReport>)>> {
        if self.edited {
            self.tweak(None)?;
        }
        let solution = self.solution.as_ref().ok_or(AtlasError::NotPacked)?;
        let compositor = AtlasCompositor::new(codec);
        let channels = self.atlas_type.channels();
        let sources = &self.sources;

        #[cfg(feature = "parallel")]
        let results: Vec<(ChannelKind, Result<CompositeReport>)> = if self.config.parallel {
            channels
                .par_iter()
                .map(|&ch| (ch, compositor.render_channel(ch, solution, sources, dir)))
                .collect()
        } else {
            channels
                .iter()
                .map(|&ch| (ch, compositor.render_channel(ch, solution, sources, dir)))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let results: Vec<(ChannelKind, Result<CompositeReport>)> = channels
            .iter()
            .map(|&ch| (ch, compositor.render_channel(ch, solution, sources, dir)))
            .collect();

        let resolution = solution.resolution;
        for (channel, res) in &results {
            match res {
                Ok(report) => {
                    let texture = report
                        .path
                        .as_ref()
                        .and_then(|p| p.file_name())
                        .map(|f| f.to_string_lossy().into_owned())
                        .unwrap_or_else(|| channel.file_stem().to_string());
                    self.maps.insert(
                        *channel,
                        MapRecord {
                            texture,
                            resolution,
                        },
                    );
                    for (id, reps) in &report.repetitions {
                        if let Some(src) = self.sources.iter_mut().find(|s| &s.id == id) {
                            src.repetitions = *reps;
                        }
                        if let Some(trim) = self.store.get_mut(id) {
                            trim.repetitions = *reps;
                        }
                    }
                }
                Err(e) => warn!(?channel, error = %e, "channel failed to render"),
            }
        }
        Ok(results)
    }

    /// Snapshot of the atlas for `data.json`, optionally for maps shrunk to `downscale` pixels.
    pub fn record(&self, downscale: Option<u32>) -> Result<AtlasRecord> {
        if self.solution.is_none() {
            return Err(AtlasError::NotPacked);
        }
        let record =
            AtlasRecord::from_store(&self.name, &self.uuid, &self.store, self.maps.clone());
        Ok(match downscale {
            Some(size) => record.downscaled(size, self.store.transform()),
            None => record,
        })
    }
}
