//! Conversions between packed-pixel boxes, trim matrices, UV quads and display-plane vertices.
//!
//! Pixel space has its origin at the atlas' top-left corner with Y growing downward. Trim
//! matrices live in world space: origin at the atlas center, Y growing upward, and one packed
//! pixel equal to `1 / pixels_per_unit` world units. Every conversion is total for non-zero
//! resolutions; callers guarantee that.

use crate::model::{Rect, Trim, TrimMatrix};

/// One packed pixel is 1/1000 of a world unit unless configured otherwise.
pub const DEFAULT_PIXELS_PER_UNIT: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    pub pixels_per_unit: f64,
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self {
            pixels_per_unit: DEFAULT_PIXELS_PER_UNIT,
        }
    }
}

impl CoordinateTransform {
    pub fn new(pixels_per_unit: f64) -> Self {
        Self { pixels_per_unit }
    }

    /// Expresses a packed box as a trim matrix for an atlas of `resolution`.
    pub fn box_to_trim_matrix(&self, rect: &Rect, resolution: (u32, u32)) -> TrimMatrix {
        let (rw, rh) = (resolution.0 as f64, resolution.1 as f64);
        let (x, y, w, h) = (rect.x as f64, rect.y as f64, rect.w as f64, rect.h as f64);
        let ppu = self.pixels_per_unit;
        TrimMatrix {
            translation: [(x + w / 2.0 - rw / 2.0) / ppu, -(y + h / 2.0 - rh / 2.0) / ppu],
            scale: [w / rw, h / rh],
        }
    }

    /// Inverse of [`box_to_trim_matrix`](Self::box_to_trim_matrix), keeping signed origins.
    ///
    /// Origin and dimensions are both rounded from the unrounded matrix values, so two trims
    /// sharing an edge keep sharing it across repeated round trips.
    pub fn trim_matrix_to_coords(
        &self,
        matrix: &TrimMatrix,
        resolution: (u32, u32),
    ) -> ((i64, i64), (u32, u32)) {
        let (rw, rh) = (resolution.0 as f64, resolution.1 as f64);
        let ppu = self.pixels_per_unit;
        let w = matrix.scale[0] * rw;
        let h = matrix.scale[1] * rh;
        let left = rw / 2.0 + matrix.translation[0] * ppu - w / 2.0;
        let top = rh / 2.0 - matrix.translation[1] * ppu - h / 2.0;
        (
            (left.round() as i64, top.round() as i64),
            (w.round().max(0.0) as u32, h.round().max(0.0) as u32),
        )
    }

    /// Packed-pixel box of a trim matrix. The part left of or above the canvas is clipped
    /// away, so the far edges stay where the matrix puts them.
    pub fn trim_matrix_to_box(&self, matrix: &TrimMatrix, resolution: (u32, u32)) -> Rect {
        let ((x, y), (w, h)) = self.trim_matrix_to_coords(matrix, resolution);
        let clip = |origin: i64, len: u32| -> (u32, u32) {
            if origin >= 0 {
                (origin as u32, len)
            } else {
                (0, (len as i64 + origin).max(0) as u32)
            }
        };
        let (x, w) = clip(x, w);
        let (y, h) = clip(y, h);
        Rect::new(x, y, w, h)
    }

    /// Same pixel placement on a canvas resized from `old` to `new`: the top-left corner and
    /// the pixel size of the trim are kept.
    pub fn reframe_matrix(
        &self,
        matrix: &TrimMatrix,
        old: (u32, u32),
        new: (u32, u32),
    ) -> TrimMatrix {
        let ppu = self.pixels_per_unit;
        let dx = (new.0 as f64 - old.0 as f64) / 2.0 / ppu;
        let dy = (new.1 as f64 - old.1 as f64) / 2.0 / ppu;
        TrimMatrix {
            translation: [matrix.translation[0] - dx, matrix.translation[1] + dy],
            scale: [
                matrix.scale[0] * old.0 as f64 / new.0 as f64,
                matrix.scale[1] * old.1 as f64 / new.1 as f64,
            ],
        }
    }

    /// Flat quad of `dimensions` pixels centered on the origin, in world units.
    /// Corner order matches [`box_to_uv`].
    pub fn box_to_plane_vertices(&self, dimensions: (u32, u32)) -> [[f64; 3]; 4] {
        let hw = dimensions.0 as f64 / 2.0 / self.pixels_per_unit;
        let hh = dimensions.1 as f64 / 2.0 / self.pixels_per_unit;
        [
            [-hw, hh, 0.0],
            [hw, hh, 0.0],
            [hw, -hh, 0.0],
            [-hw, -hh, 0.0],
        ]
    }

    /// Backdrop quad covering the whole atlas.
    pub fn atlas_plane_vertices(&self, resolution: (u32, u32)) -> [[f64; 3]; 4] {
        self.box_to_plane_vertices(resolution)
    }

    /// World-space center of the display quad of a trim.
    pub fn trim_center(&self, matrix: &TrimMatrix) -> [f64; 3] {
        [matrix.translation[0], matrix.translation[1], 0.0]
    }

    /// UV bounds `([u_min, v_min], [u_max, v_max])` and UV midpoint of a trim.
    pub fn trim_uv_bounds(
        &self,
        matrix: &TrimMatrix,
        resolution: (u32, u32),
    ) -> ([[f64; 2]; 2], [f64; 2]) {
        let u = 0.5 + matrix.translation[0] * self.pixels_per_unit / resolution.0 as f64;
        let v = 0.5 + matrix.translation[1] * self.pixels_per_unit / resolution.1 as f64;
        let (hu, hv) = (matrix.scale[0] / 2.0, matrix.scale[1] / 2.0);
        ([[u - hu, v - hv], [u + hu, v + hv]], [u, v])
    }

    /// Keeps trims at the same relative place when the atlas changes resolution.
    /// Translations scale per axis; normalized scales are already resolution independent.
    pub fn rescale_locations(&self, trims: &mut [Trim], old: (u32, u32), new: (u32, u32)) {
        let fx = new.0 as f64 / old.0 as f64;
        let fy = new.1 as f64 / old.1 as f64;
        for trim in trims {
            trim.matrix.translation[0] *= fx;
            trim.matrix.translation[1] *= fy;
        }
    }
}

/// UV corners of a pixel box, clockwise from the top-left: `u = x / W`, `v = 1 - y / H`.
pub fn box_to_uv(
    top_left: (i64, i64),
    dimensions: (u32, u32),
    resolution: (u32, u32),
) -> [[f64; 2]; 4] {
    let (rw, rh) = (resolution.0 as f64, resolution.1 as f64);
    let left = top_left.0 as f64 / rw;
    let right = (top_left.0 as f64 + dimensions.0 as f64) / rw;
    let top = 1.0 - top_left.1 as f64 / rh;
    let bottom = 1.0 - (top_left.1 as f64 + dimensions.1 as f64) / rh;
    [[left, top], [right, top], [right, bottom], [left, bottom]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_box_has_zero_translation() {
        let t = CoordinateTransform::default();
        let m = t.box_to_trim_matrix(&Rect::new(256, 256, 512, 512), (1024, 1024));
        assert_eq!(m.translation, [0.0, 0.0]);
        assert_eq!(m.scale, [0.5, 0.5]);
    }

    #[test]
    fn y_axis_flips_between_pixel_and_world_space() {
        let t = CoordinateTransform::default();
        // top-left quadrant in pixels is up-left in world space
        let m = t.box_to_trim_matrix(&Rect::new(0, 0, 512, 512), (1024, 1024));
        assert!((m.translation[0] + 0.256).abs() < 1e-12);
        assert!((m.translation[1] - 0.256).abs() < 1e-12);
    }

    #[test]
    fn uv_corners_of_top_left_quadrant() {
        let uv = box_to_uv((0, 0), (512, 512), (1024, 1024));
        assert_eq!(uv, [[0.0, 1.0], [0.5, 1.0], [0.5, 0.5], [0.0, 0.5]]);
    }

    #[test]
    fn plane_vertices_ignore_atlas_resolution() {
        let t = CoordinateTransform::default();
        let v = t.box_to_plane_vertices((200, 100));
        assert_eq!(v[0], [-0.1, 0.05, 0.0]);
        assert_eq!(v[2], [0.1, -0.05, 0.0]);
    }
}
