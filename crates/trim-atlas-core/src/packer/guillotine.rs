use super::{Packer, half_padding};
use crate::config::SplitHeuristic;
use crate::model::Rect;

/// Free-list packer that cuts the leftover of every used free box into two new free boxes.
pub struct GuillotinePacker {
    resolution: (u32, u32),
    padding: u32,
    split: SplitHeuristic,
    free: Vec<Rect>,
    placed: Vec<(String, Rect)>,
}

impl GuillotinePacker {
    /// Packer whose whole canvas is free.
    pub fn new(resolution: (u32, u32), padding: u32, split: SplitHeuristic) -> Self {
        let canvas = Rect::new(0, 0, resolution.0, resolution.1);
        Self::with_state(resolution, padding, split, vec![canvas], Vec::new())
    }

    /// Packer resuming from existing free boxes and placements (e.g. a pre-packed stack).
    pub fn with_state(
        resolution: (u32, u32),
        padding: u32,
        split: SplitHeuristic,
        free: Vec<Rect>,
        placed: Vec<(String, Rect)>,
    ) -> Self {
        Self {
            resolution,
            padding,
            split,
            free: free.into_iter().filter(|r| !r.is_empty()).collect(),
            placed,
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn free_boxes(&self) -> &[Rect] {
        &self.free
    }

    pub fn placed(&self) -> &[(String, Rect)] {
        &self.placed
    }

    pub fn into_parts(self) -> (Vec<Rect>, Vec<(String, Rect)>) {
        (self.free, self.placed)
    }

    /// Tightest fit: smallest leftover area, then topmost, then leftmost, then list order.
    fn choose(&self, w: u32, h: u32) -> Option<usize> {
        let needed = w as u64 * h as u64;
        self.free
            .iter()
            .enumerate()
            .filter(|(_, fr)| fr.w >= w && fr.h >= h)
            .min_by_key(|(i, fr)| (fr.area() - needed, fr.y, fr.x, *i))
            .map(|(i, _)| i)
    }

    /// Splits the L-shaped leftover of `fr` after reserving `pw x ph` at its top-left corner.
    fn split(&self, fr: &Rect, pw: u32, ph: u32) -> (Option<Rect>, Option<Rect>) {
        let dw = fr.w - pw;
        let dh = fr.h - ph;

        let (a, b) = match self.split {
            SplitHeuristic::Axis => (
                Rect::new(fr.x + pw, fr.y, dw, ph),
                Rect::new(fr.x, fr.y + ph, fr.w, dh),
            ),
            SplitHeuristic::Guillotine | SplitHeuristic::GuillotineAlt => {
                let vertical_cut = if self.split == SplitHeuristic::Guillotine {
                    dw > dh
                } else {
                    dh > dw
                };
                if vertical_cut {
                    // full-height right box, bottom box under the placement only
                    (
                        Rect::new(fr.x + pw, fr.y, dw, fr.h),
                        Rect::new(fr.x, fr.y + ph, pw, dh),
                    )
                } else {
                    // full-width bottom box, right box beside the placement only
                    (
                        Rect::new(fr.x, fr.y + ph, fr.w, dh),
                        Rect::new(fr.x + pw, fr.y, dw, ph),
                    )
                }
            }
        };
        let keep = |r: Rect| if r.is_empty() { None } else { Some(r) };
        (keep(a), keep(b))
    }

    fn place(&mut self, idx: usize, key: &str, w: u32, h: u32) -> Rect {
        let fr = self.free.remove(idx);
        let (pw, ph) = (w + self.padding, h + self.padding);
        let (a, b) = self.split(&fr, pw, ph);
        if let Some(r) = a {
            self.free.push(r);
        }
        if let Some(r) = b {
            self.free.push(r);
        }
        let half = half_padding(self.padding);
        let placed = Rect::new(fr.x + half, fr.y + half, w, h);
        self.placed.push((key.to_string(), placed));
        placed
    }
}

impl Packer for GuillotinePacker {
    fn can_pack(&self, rect: &Rect) -> bool {
        self.choose(rect.w + self.padding, rect.h + self.padding)
            .is_some()
    }

    fn pack(&mut self, key: &str, rect: &Rect) -> Option<Rect> {
        let idx = self.choose(rect.w + self.padding, rect.h + self.padding)?;
        Some(self.place(idx, key, rect.w, rect.h))
    }
}
