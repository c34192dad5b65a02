//! Snapping trim edges onto a grid or an explicit set of guide lines.
//!
//! Edges are measured in a bottom-up pixel frame: `x` grows to the right from the atlas' left
//! edge and `y` grows upward from its bottom edge, matching world-space orientation.

use crate::error::{AtlasError, Axis, Result};
use crate::model::TrimMatrix;
use crate::transform::CoordinateTransform;
use std::borrow::Cow;

/// Sorted, deduplicated snap-line positions per axis, in bottom-up pixels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapLines {
    /// Positions of lines that left/right edges snap to.
    pub x: Vec<f64>,
    /// Positions of lines that bottom/top edges snap to.
    pub y: Vec<f64>,
}

fn normalize(mut v: Vec<f64>) -> Vec<f64> {
    v.retain(|p| p.is_finite());
    v.sort_by(|a, b| a.total_cmp(b));
    v.dedup();
    v
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

impl SnapLines {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            x: normalize(x),
            y: normalize(y),
        }
    }

    /// Evenly spaced lines dividing the atlas into `snap.0 x snap.1` cells.
    pub fn from_resolution(atlas: (u32, u32), snap: (u32, u32)) -> Result<Self> {
        if snap.0 == 0 || snap.1 == 0 {
            return Err(AtlasError::InvalidDimensions {
                width: snap.0,
                height: snap.1,
            });
        }
        let grid = |size: u32, cells: u32| -> Vec<f64> {
            let step = size as f64 / cells as f64;
            (0..=cells).map(|s| s as f64 * step).collect()
        };
        Ok(Self {
            x: grid(atlas.0, snap.0),
            y: grid(atlas.1, snap.1),
        })
    }

    /// Lines through the vertices of a guide mesh given in atlas world space.
    pub fn from_world_points(
        points: &[[f64; 3]],
        resolution: (u32, u32),
        transform: &CoordinateTransform,
    ) -> Self {
        let ppu = transform.pixels_per_unit;
        let (hw, hh) = (resolution.0 as f64 / 2.0, resolution.1 as f64 / 2.0);
        let x = points.iter().map(|p| round4(p[0] * ppu + hw)).collect();
        let y = points.iter().map(|p| round4(p[1] * ppu + hh)).collect();
        Self::new(x, y)
    }
}

/// What a trim snaps to.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapTarget {
    /// Every pixel of the atlas itself.
    Pixel,
    /// A coarser grid of `w x h` cells over the atlas.
    Resolution(u32, u32),
    /// Explicit guide lines.
    Lines(SnapLines),
}

impl SnapTarget {
    pub fn lines(&self, resolution: (u32, u32)) -> Result<Cow<'_, SnapLines>> {
        match self {
            SnapTarget::Pixel => SnapLines::from_resolution(resolution, resolution).map(Cow::Owned),
            SnapTarget::Resolution(w, h) => {
                SnapLines::from_resolution(resolution, (*w, *h)).map(Cow::Owned)
            }
            SnapTarget::Lines(lines) => Ok(Cow::Borrowed(lines)),
        }
    }
}

/// Nearest line to `value`; outside the range clamps, ties go to the lower line.
fn snap_edge(value: f64, lines: &[f64]) -> f64 {
    let (first, last) = (lines[0], lines[lines.len() - 1]);
    if value <= first {
        return first;
    }
    if value >= last {
        return last;
    }
    let idx = lines.partition_point(|&l| l <= value);
    let (lower, upper) = (lines[idx - 1], lines[idx]);
    if value - lower <= upper - value {
        lower
    } else {
        upper
    }
}

fn snap_span(lo: f64, hi: f64, lines: &[f64], axis: Axis) -> Result<(f64, f64)> {
    if lines.is_empty() {
        return Err(AtlasError::DegenerateSnapResult { axis });
    }
    let (mut lo, mut hi) = (snap_edge(lo, lines), snap_edge(hi, lines));
    if lo != hi {
        return Ok((lo, hi));
    }
    if lines.len() < 2 {
        return Err(AtlasError::DegenerateSnapResult { axis });
    }
    let last = lines.len() - 1;
    if lo == lines[last] {
        lo = lines[last - 1];
    } else if hi == lines[0] {
        hi = lines[1];
    } else {
        hi = lines[lines.partition_point(|&l| l <= hi)];
    }
    Ok((lo, hi))
}

/// Snaps all four edges of a trim and returns the resulting matrix. The input is left untouched.
pub fn snap_trim_matrix(
    transform: &CoordinateTransform,
    matrix: &TrimMatrix,
    resolution: (u32, u32),
    target: &SnapTarget,
) -> Result<TrimMatrix> {
    let lines = target.lines(resolution)?;
    let ppu = transform.pixels_per_unit;
    let (rw, rh) = (resolution.0 as f64, resolution.1 as f64);
    let w = matrix.scale[0] * rw;
    let h = matrix.scale[1] * rh;
    let left = matrix.translation[0] * ppu - w / 2.0 + rw / 2.0;
    let bottom = matrix.translation[1] * ppu - h / 2.0 + rh / 2.0;

    let (left, right) = snap_span(left, left + w, &lines.x, Axis::Horizontal)?;
    let (bottom, top) = snap_span(bottom, bottom + h, &lines.y, Axis::Vertical)?;

    Ok(TrimMatrix {
        translation: [
            ((left + right) / 2.0 - rw / 2.0) / ppu,
            ((bottom + top) / 2.0 - rh / 2.0) / ppu,
        ],
        scale: [(right - left) / rw, (top - bottom) / rh],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_ties_resolve_to_lower_line() {
        let lines = [0.0, 10.0, 20.0];
        assert_eq!(snap_edge(5.0, &lines), 0.0);
        assert_eq!(snap_edge(5.1, &lines), 10.0);
        assert_eq!(snap_edge(-3.0, &lines), 0.0);
        assert_eq!(snap_edge(25.0, &lines), 20.0);
    }

    #[test]
    fn collapsed_span_moves_away_from_boundary() {
        let lines = [0.0, 10.0, 20.0];
        assert_eq!(
            snap_span(19.0, 21.0, &lines, Axis::Horizontal).ok(),
            Some((10.0, 20.0))
        );
        assert_eq!(
            snap_span(-1.0, 1.0, &lines, Axis::Horizontal).ok(),
            Some((0.0, 10.0))
        );
        assert_eq!(
            snap_span(9.0, 11.0, &lines, Axis::Horizontal).ok(),
            Some((10.0, 20.0))
        );
    }

    #[test]
    fn single_line_cannot_hold_a_span() {
        let err = snap_span(1.0, 2.0, &[4.0], Axis::Vertical).unwrap_err();
        assert!(matches!(
            err,
            AtlasError::DegenerateSnapResult {
                axis: Axis::Vertical
            }
        ));
    }

    #[test]
    fn world_points_become_bottom_up_pixels() {
        let t = CoordinateTransform::default();
        let lines = SnapLines::from_world_points(
            &[[-0.512, 0.0, 0.0], [0.0, 0.256, 0.0], [-0.512, 0.256, 0.0]],
            (1024, 1024),
            &t,
        );
        assert_eq!(lines.x, vec![0.0, 512.0]);
        assert_eq!(lines.y, vec![512.0, 768.0]);
    }
}
