use crate::model::Rect;

pub mod guillotine;

/// A packer places rectangles into a fixed-size canvas.
///
/// Implementations must ensure no overlaps and reserve the configured padding around every
/// placement. `pack` returns `None` if the rectangle does not fit; callers then grow the canvas
/// and start over with a fresh packer.
pub trait Packer {
    fn can_pack(&self, rect: &Rect) -> bool;
    fn pack(&mut self, key: &str, rect: &Rect) -> Option<Rect>;
}

/// Offset of a placement inside its reserved cell: half the padding, ties rounded to even
/// (1 -> 0, 3 -> 2, 5 -> 2, 7 -> 4).
pub fn half_padding(padding: u32) -> u32 {
    let half = padding / 2;
    if padding % 2 == 1 && half % 2 == 1 {
        half + 1
    } else {
        half
    }
}
