use crate::config::TrimSort;
use crate::error::{AtlasError, Result};
use crate::model::{DecalSource, PackingSolution, PrepackPolicy, Trim};
use crate::snap::{SnapTarget, snap_trim_matrix};
use crate::transform::CoordinateTransform;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Ordered trims of one atlas plus the active selection.
#[derive(Debug, Clone)]
pub struct TrimStore {
    trims: Vec<Trim>,
    active: Option<usize>,
    resolution: (u32, u32),
    transform: CoordinateTransform,
}

struct Preserved {
    is_active: bool,
    original_size: (u32, u32),
    display: Option<String>,
}

impl TrimStore {
    pub fn new(transform: CoordinateTransform) -> Self {
        Self {
            trims: Vec::new(),
            active: None,
            resolution: (0, 0),
            transform,
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    pub fn len(&self) -> usize {
        self.trims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trims.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trim> {
        self.trims.iter()
    }

    pub fn get(&self, uuid: &str) -> Option<&Trim> {
        self.trims.iter().find(|t| t.uuid == uuid)
    }

    pub fn get_mut(&mut self, uuid: &str) -> Option<&mut Trim> {
        self.trims.iter_mut().find(|t| t.uuid == uuid)
    }

    fn index_of(&self, uuid: &str) -> Result<usize> {
        self.trims
            .iter()
            .position(|t| t.uuid == uuid)
            .ok_or_else(|| AtlasError::UnknownTrim(uuid.to_string()))
    }

    /// Replaces the store's trims with one trim per placed source; the first trim becomes active.
    pub fn add_trims(
        &mut self,
        sources: &[DecalSource],
        solution: &PackingSolution,
        sort: TrimSort,
    ) -> Result<()> {
        let by_id: HashMap<&str, &DecalSource> =
            sources.iter().map(|s| (s.id.as_str(), s)).collect();

        let mut trims = Vec::with_capacity(solution.placed_boxes.len());
        for (id, rect) in &solution.placed_boxes {
            let src = by_id.get(id.as_str()).ok_or_else(|| {
                AtlasError::InvalidInput(format!("placed box '{id}' has no matching decal"))
            })?;
            trims.push(Trim {
                uuid: src.id.clone(),
                name: src.name.clone(),
                matrix: self.transform.box_to_trim_matrix(rect, solution.resolution),
                is_panel: src.is_panel,
                is_active: false,
                original_size: src.original_size,
                prepack: src.effective_prepack(),
                repetitions: src.repetitions,
                display: None,
            });
        }
        if sort == TrimSort::ByName {
            trims.sort_by(|a, b| a.name.cmp(&b.name));
        }
        if let Some(first) = trims.first_mut() {
            first.is_active = true;
        }

        self.active = if trims.is_empty() { None } else { Some(0) };
        self.trims = trims;
        self.resolution = solution.resolution;
        debug!(trims = self.trims.len(), "added trims");
        Ok(())
    }

    /// Rebuilds all trims from a new solution, carrying the active flag, original size and
    /// display handle over to trims whose uuid survives.
    pub fn refresh_trims(
        &mut self,
        sources: &[DecalSource],
        solution: &PackingSolution,
        sort: TrimSort,
    ) -> Result<()> {
        let preserved: HashMap<String, Preserved> = self
            .trims
            .iter()
            .map(|t| {
                (
                    t.uuid.clone(),
                    Preserved {
                        is_active: t.is_active,
                        original_size: t.original_size,
                        display: t.display.clone(),
                    },
                )
            })
            .collect();

        self.add_trims(sources, solution, sort)?;

        if preserved.is_empty() {
            return Ok(());
        }
        let mut active = None;
        for (i, trim) in self.trims.iter_mut().enumerate() {
            match preserved.get(&trim.uuid) {
                Some(p) => {
                    trim.is_active = p.is_active;
                    trim.original_size = p.original_size;
                    trim.display = p.display.clone();
                    if p.is_active && active.is_none() {
                        active = Some(i);
                    }
                }
                None => trim.is_active = false,
            }
        }
        if active.is_none() && !self.trims.is_empty() {
            self.trims[0].is_active = true;
            active = Some(0);
        }
        self.active = active;
        Ok(())
    }

    pub fn active(&self) -> Option<&Trim> {
        self.active.and_then(|i| self.trims.get(i))
    }

    pub fn set_active(&mut self, uuid: &str) -> Result<()> {
        let idx = self.index_of(uuid)?;
        for (i, t) in self.trims.iter_mut().enumerate() {
            t.is_active = i == idx;
        }
        self.active = Some(idx);
        Ok(())
    }

    /// Removes a trim; the active selection falls back to the first remaining trim.
    pub fn remove(&mut self, uuid: &str) -> Result<Trim> {
        let idx = self.index_of(uuid)?;
        let removed = self.trims.remove(idx);
        self.active = match self.active {
            Some(a) if a == idx => None,
            Some(a) if a > idx => Some(a - 1),
            other => other,
        };
        if self.active.is_none() && !self.trims.is_empty() {
            self.trims[0].is_active = true;
            self.active = Some(0);
        }
        Ok(removed)
    }

    /// Restores a trim's authored size. Panels also drop back to no prepack.
    pub fn reset_trim_scale(&mut self, uuid: &str) -> Result<()> {
        let (rw, rh) = self.resolution;
        let idx = self.index_of(uuid)?;
        let trim = &mut self.trims[idx];
        trim.matrix.scale = [
            trim.original_size.0 as f64 / rw as f64,
            trim.original_size.1 as f64 / rh as f64,
        ];
        if trim.is_panel {
            trim.prepack = PrepackPolicy::None;
        }
        Ok(())
    }

    /// Spans a trim across the full atlas width, keeping its vertical placement.
    pub fn stretch_trim_scale(&mut self, uuid: &str) -> Result<()> {
        let idx = self.index_of(uuid)?;
        let trim = &mut self.trims[idx];
        trim.matrix.scale[0] = 1.0;
        trim.matrix.translation[0] = 0.0;
        Ok(())
    }

    /// Snaps one trim. On failure the trim keeps its previous matrix.
    pub fn apply_snap(&mut self, uuid: &str, target: &SnapTarget) -> Result<()> {
        let idx = self.index_of(uuid)?;
        let snapped = snap_trim_matrix(
            &self.transform,
            &self.trims[idx].matrix,
            self.resolution,
            target,
        )?;
        self.trims[idx].matrix = snapped;
        Ok(())
    }

    /// Snaps every trim, returning the uuids of trims that could not be snapped.
    pub fn snap_all(&mut self, target: &SnapTarget) -> Vec<(String, AtlasError)> {
        let uuids: Vec<String> = self.trims.iter().map(|t| t.uuid.clone()).collect();
        let mut failed = Vec::new();
        for uuid in uuids {
            if let Err(e) = self.apply_snap(&uuid, target) {
                warn!(trim = %uuid, error = %e, "snap rejected");
                failed.push((uuid, e));
            }
        }
        failed
    }

    /// Moves trims proportionally for a new atlas resolution.
    pub fn rescale(&mut self, new_resolution: (u32, u32)) -> Result<()> {
        if new_resolution.0 == 0 || new_resolution.1 == 0 {
            return Err(AtlasError::InvalidDimensions {
                width: new_resolution.0,
                height: new_resolution.1,
            });
        }
        if self.resolution.0 != 0 && self.resolution.1 != 0 {
            self.transform
                .rescale_locations(&mut self.trims, self.resolution, new_resolution);
        }
        self.resolution = new_resolution;
        Ok(())
    }

    /// Trim under a UV coordinate (wrapped into `[0, 1)`); the nearest midpoint wins among
    /// overlapping trims, and over all trims when none contains the point.
    pub fn trim_at_uv(&self, uv: [f64; 2]) -> Option<&Trim> {
        let u = uv[0].rem_euclid(1.0);
        let v = uv[1].rem_euclid(1.0);
        let dist = |mid: [f64; 2]| (mid[0] - u).powi(2) + (mid[1] - v).powi(2);

        let mut containing: Option<(f64, &Trim)> = None;
        let mut nearest: Option<(f64, &Trim)> = None;
        for trim in &self.trims {
            let ([lo, hi], mid) = self.transform.trim_uv_bounds(&trim.matrix, self.resolution);
            let d = dist(mid);
            let inside = lo[0] <= u && u <= hi[0] && lo[1] <= v && v <= hi[1];
            if inside && containing.is_none_or(|(best, _)| d < best) {
                containing = Some((d, trim));
            }
            if nearest.is_none_or(|(best, _)| d < best) {
                nearest = Some((d, trim));
            }
        }
        containing.or(nearest).map(|(_, t)| t)
    }

    /// Replaces the trims wholesale, e.g. when loading a persisted record.
    pub fn restore(&mut self, trims: Vec<Trim>, resolution: (u32, u32)) {
        self.active = trims.iter().position(|t| t.is_active);
        self.trims = trims;
        self.resolution = resolution;
    }
}
