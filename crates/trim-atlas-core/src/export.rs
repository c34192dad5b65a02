use crate::error::Result;
use crate::model::{ChannelKind, PrepackPolicy, Trim, TrimMatrix};
use crate::store::TrimStore;
use crate::transform::CoordinateTransform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// One rendered map as listed in `data.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapRecord {
    /// File name relative to the record.
    pub texture: String,
    pub resolution: (u32, u32),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrimRecord {
    pub name: String,
    pub uuid: String,
    /// World-space translation.
    pub location: [f64; 2],
    pub scale: [f64; 2],
    pub is_active: bool,
    pub is_panel: bool,
    /// Top-left pixel of the trim at the record's resolution.
    pub coords: [i64; 2],
    pub dimensions: [u32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetitions: Option<u32>,
}

/// Persisted atlas: resolution, rendered maps and every trim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AtlasRecord {
    pub name: String,
    pub uuid: String,
    pub resolution: (u32, u32),
    pub is_atlas: bool,
    #[serde(default)]
    pub maps: BTreeMap<ChannelKind, MapRecord>,
    pub trims: Vec<TrimRecord>,
}

fn trim_record(
    trim: &Trim,
    resolution: (u32, u32),
    transform: &CoordinateTransform,
) -> TrimRecord {
    let ((x, y), (w, h)) = transform.trim_matrix_to_coords(&trim.matrix, resolution);
    TrimRecord {
        name: trim.name.clone(),
        uuid: trim.uuid.clone(),
        location: trim.matrix.translation,
        scale: trim.matrix.scale,
        is_active: trim.is_active,
        is_panel: trim.is_panel,
        coords: [x, y],
        dimensions: [w, h],
        repetitions: if trim.is_panel { trim.repetitions } else { None },
    }
}

impl AtlasRecord {
    pub fn from_store(
        name: impl Into<String>,
        uuid: impl Into<String>,
        store: &TrimStore,
        maps: BTreeMap<ChannelKind, MapRecord>,
    ) -> Self {
        let resolution = store.resolution();
        let trims = store
            .iter()
            .map(|t| trim_record(t, resolution, store.transform()))
            .collect();
        Self {
            name: name.into(),
            uuid: uuid.into(),
            resolution,
            is_atlas: true,
            maps,
            trims,
        }
    }

    /// Record for maps shrunk to `size x size`: locations move proportionally and pixel
    /// coords are recomputed. Sizes at or above the current resolution leave locations as-is.
    pub fn downscaled(&self, size: u32, transform: &CoordinateTransform) -> Self {
        let mut out = self.clone();
        let target = (size, size);
        let factor = size as f64 / self.resolution.0 as f64;
        for tr in &mut out.trims {
            if size < self.resolution.0 {
                tr.location = [tr.location[0] * factor, tr.location[1] * factor];
            }
            let m = TrimMatrix::new(tr.location, tr.scale);
            let ((x, y), (w, h)) = transform.trim_matrix_to_coords(&m, target);
            tr.coords = [x, y];
            tr.dimensions = [w, h];
        }
        for map in out.maps.values_mut() {
            map.resolution = target;
        }
        out.resolution = target;
        out
    }

    /// Trims as stored in the record; authored sizes fall back to the recorded dimensions.
    pub fn to_trims(&self) -> Vec<Trim> {
        self.trims
            .iter()
            .map(|tr| Trim {
                uuid: tr.uuid.clone(),
                name: tr.name.clone(),
                matrix: TrimMatrix::new(tr.location, tr.scale),
                is_panel: tr.is_panel,
                is_active: tr.is_active,
                original_size: (tr.dimensions[0], tr.dimensions[1]),
                prepack: PrepackPolicy::None,
                repetitions: tr.repetitions,
                display: None,
            })
            .collect()
    }

    /// Loads the record into `store`: an empty store takes every trim, otherwise matrices and
    /// active flags are copied onto trims with the same uuid.
    pub fn apply_to(&self, store: &mut TrimStore) -> Result<()> {
        if store.is_empty() {
            store.restore(self.to_trims(), self.resolution);
            return Ok(());
        }
        if store.resolution() != self.resolution {
            let trims: Vec<Trim> = store.iter().cloned().collect();
            store.restore(trims, self.resolution);
        }
        for tr in &self.trims {
            match store.get_mut(&tr.uuid) {
                Some(trim) => {
                    trim.matrix = TrimMatrix::new(tr.location, tr.scale);
                    trim.repetitions = tr.repetitions;
                }
                None => warn!(trim = %tr.uuid, "record trim not in store, skipped"),
            }
        }
        let active = self
            .trims
            .iter()
            .find(|t| t.is_active && store.get(&t.uuid).is_some());
        if let Some(active) = active {
            store.set_active(&active.uuid)?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// Powers of two bracketing `resolution`: the largest `<=` and the smallest `>`.
pub fn lower_and_upper_pow2(resolution: u32) -> (u32, u32) {
    if resolution == 0 {
        return (1, 1);
    }
    let upper = (resolution as u64 + 1).next_power_of_two();
    ((upper / 2) as u32, upper.min(u32::MAX as u64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow2_brackets() {
        assert_eq!(lower_and_upper_pow2(1000), (512, 1024));
        assert_eq!(lower_and_upper_pow2(1024), (1024, 2048));
        assert_eq!(lower_and_upper_pow2(1), (1, 2));
    }
}
