use crate::config::{GrowthPolicy, PackerConfig, SortOrder, SplitHeuristic};
use crate::error::{AtlasError, Result};
use crate::model::{DecalSource, PackingSolution, Rect};
use crate::packer::{Packer, guillotine::GuillotinePacker, half_padding};
use std::cmp::Ordering;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Canvas state after stacking pre-packed panels, before any free packing.
#[derive(Debug, Clone, PartialEq)]
pub struct PrepackLayout {
    /// Square canvas edge, possibly bumped above the requested minimum.
    pub resolution: u32,
    pub free_boxes: Vec<Rect>,
    pub placed_boxes: Vec<(String, Rect)>,
}

/// Stacks pre-packed panels at full canvas width from the top and returns the remaining space.
///
/// The canvas is enlarged when the stack (or its widest panel) does not fit `min_resolution`.
pub fn initiate(min_resolution: u32, padding: u32, prepacked: &[&DecalSource]) -> PrepackLayout {
    if prepacked.is_empty() {
        return PrepackLayout {
            resolution: min_resolution,
            free_boxes: vec![Rect::new(0, 0, min_resolution, min_resolution)],
            placed_boxes: Vec::new(),
        };
    }

    let n = prepacked.len() as u32;
    let vertical: u32 = prepacked.iter().map(|s| s.size.1).sum::<u32>() + n * padding + padding;
    let horizontal = prepacked.iter().map(|s| s.size.0).max().unwrap_or(0);
    let resolution = min_resolution.max(vertical).max(horizontal);

    let half = half_padding(padding);
    let mut placed_boxes = Vec::with_capacity(prepacked.len());
    let mut y = half;
    for (i, src) in prepacked.iter().enumerate() {
        if i > 0 {
            y += padding;
        }
        placed_boxes.push((src.id.clone(), Rect::new(0, y, resolution, src.size.1)));
        y += src.size.1;
    }

    let top = y + half;
    let rest = Rect::new(0, top, resolution, resolution.saturating_sub(top));
    let free_boxes = if rest.is_empty() { Vec::new() } else { vec![rest] };

    PrepackLayout {
        resolution,
        free_boxes,
        placed_boxes,
    }
}

/// Default first canvas edge: the side of a square holding the total decal area.
pub fn area_resolution(sources: &[DecalSource]) -> u32 {
    let area: u64 = sources
        .iter()
        .map(|s| s.size.0 as u64 * s.size.1 as u64)
        .sum();
    ((area as f64).sqrt().round() as u32).max(1)
}

fn sort_sources<'a>(sources: &[&'a DecalSource], order: SortOrder) -> Vec<&'a DecalSource> {
    let mut sorted = sources.to_vec();
    let by_name = |a: &&DecalSource, b: &&DecalSource| a.name.cmp(&b.name);
    match order {
        SortOrder::WidthDesc => {
            sorted.sort_by(|a, b| b.size.0.cmp(&a.size.0).then_with(|| by_name(a, b)))
        }
        SortOrder::HeightDesc => {
            sorted.sort_by(|a, b| b.size.1.cmp(&a.size.1).then_with(|| by_name(a, b)))
        }
        SortOrder::AreaDesc => sorted.sort_by(|a, b| {
            let aa = a.size.0 as u64 * a.size.1 as u64;
            let ba = b.size.0 as u64 * b.size.1 as u64;
            ba.cmp(&aa).then_with(|| by_name(a, b))
        }),
        SortOrder::NameAsc => sorted.sort_by(by_name),
        SortOrder::None => {}
    }
    sorted
}

/// Next canvas edge after `source` failed to fit at `resolution`.
fn grow(resolution: u32, source: &DecalSource, padding: u32, growth: GrowthPolicy) -> u64 {
    match growth {
        GrowthPolicy::Double => {
            let needed = (source.size.0.max(source.size.1) + padding) as u64;
            let mut next = resolution as u64 * 2;
            while next < needed {
                next *= 2;
            }
            next
        }
        GrowthPolicy::Linear(step) => resolution as u64 + step as u64,
    }
}

fn check_sources(sources: &[DecalSource]) -> Result<()> {
    if sources.is_empty() {
        return Err(AtlasError::Empty);
    }
    if let Some(s) = sources.iter().find(|s| s.size.0 == 0 || s.size.1 == 0) {
        return Err(AtlasError::InvalidInput(format!(
            "decal '{}' has zero size {}x{}",
            s.name, s.size.0, s.size.1
        )));
    }
    Ok(())
}

#[instrument(skip_all)]
/// Packs `sources` into a square atlas, growing the canvas until every decal fits.
///
/// Notes:
/// - Pre-packed panels are stacked first in input order; the rest follow `cfg.sort_order`.
/// - Every retry starts from a fresh canvas; nothing carries over between attempts.
/// - `cfg.portfolio` delegates to [`pack_best`].
pub fn pack_sources(sources: &[DecalSource], cfg: &PackerConfig) -> Result<PackingSolution> {
    cfg.validate()?;
    check_sources(sources)?;

    if cfg.portfolio {
        return pack_best(sources, cfg);
    }

    let solution = pack_with(sources, cfg, cfg.sort_order, cfg.split)?;
    info!(
        resolution = solution.resolution.0,
        attempts = solution.attempts,
        boxes = solution.placed_boxes.len(),
        "packed atlas"
    );
    Ok(solution)
}

fn pack_with(
    sources: &[DecalSource],
    cfg: &PackerConfig,
    order: SortOrder,
    split: SplitHeuristic,
) -> Result<PackingSolution> {
    let prepacked: Vec<&DecalSource> = sources.iter().filter(|s| s.is_prepacked()).collect();
    let free: Vec<&DecalSource> = sources.iter().filter(|s| !s.is_prepacked()).collect();
    let ordered = sort_sources(&free, order);

    let infeasible = |resolution: u32, attempts: u32| AtlasError::PackingInfeasible {
        sources: sources.len(),
        resolution,
        attempts,
    };

    let mut resolution = cfg
        .min_resolution
        .unwrap_or_else(|| area_resolution(sources));
    let mut attempts = 0;

    loop {
        if attempts >= cfg.max_attempts {
            return Err(infeasible(resolution, attempts));
        }
        attempts += 1;

        let layout = initiate(resolution, cfg.padding, &prepacked);
        resolution = layout.resolution;
        if resolution > cfg.max_resolution {
            return Err(infeasible(resolution, attempts));
        }

        let mut packer = GuillotinePacker::with_state(
            (resolution, resolution),
            cfg.padding,
            split,
            layout.free_boxes,
            layout.placed_boxes,
        );
        let failed = ordered
            .iter()
            .find(|src| {
                let rect = Rect::new(0, 0, src.size.0, src.size.1);
                packer.pack(&src.id, &rect).is_none()
            })
            .copied();

        match failed {
            None => {
                let (free_boxes, placed_boxes) = packer.into_parts();
                return Ok(PackingSolution {
                    resolution: (resolution, resolution),
                    free_boxes,
                    placed_boxes,
                    padding: cfg.padding,
                    split,
                    sort_order: order,
                    attempts,
                });
            }
            Some(src) => {
                let next = grow(resolution, src, cfg.padding, cfg.growth);
                debug!(
                    resolution,
                    next,
                    decal = %src.name,
                    "decal did not fit, growing canvas"
                );
                if next > cfg.max_resolution as u64 {
                    return Err(infeasible(cfg.max_resolution, attempts));
                }
                resolution = next as u32;
            }
        }
    }
}

/// Higher occupancy wins, then the larger unused band at the bottom.
fn better(a: &PackingSolution, b: &PackingSolution) -> Ordering {
    let (sa, sb) = (a.stats(), b.stats());
    sa.occupancy
        .partial_cmp(&sb.occupancy)
        .unwrap_or(Ordering::Equal)
        .then_with(|| sa.gap.cmp(&sb.gap))
}

#[instrument(skip_all)]
/// Tries every sort order x split heuristic combination and keeps the best solution.
///
/// Ties keep the earliest candidate, so results are identical with or without `parallel`.
pub fn pack_best(sources: &[DecalSource], cfg: &PackerConfig) -> Result<PackingSolution> {
    cfg.validate()?;
    check_sources(sources)?;

    let candidates: Vec<(SortOrder, SplitHeuristic)> = SortOrder::PORTFOLIO
        .iter()
        .flat_map(|&o| SplitHeuristic::ALL.iter().map(move |&s| (o, s)))
        .collect();

    #[cfg(feature = "parallel")]
    let results: Vec<Result<PackingSolution>> = if cfg.parallel {
        candidates
            .par_iter()
            .map(|&(o, s)| pack_with(sources, cfg, o, s))
            .collect()
    } else {
        candidates
            .iter()
            .map(|&(o, s)| pack_with(sources, cfg, o, s))
            .collect()
    };
    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<PackingSolution>> = candidates
        .iter()
        .map(|&(o, s)| pack_with(sources, cfg, o, s))
        .collect();

    let mut best: Option<PackingSolution> = None;
    let mut first_err = None;
    for res in results {
        match res {
            Ok(sol) => {
                debug!(
                    sort = ?sol.sort_order,
                    split = ?sol.split,
                    resolution = sol.resolution.0,
                    "portfolio candidate"
                );
                match &best {
                    Some(b) if better(&sol, b) != Ordering::Greater => {}
                    _ => best = Some(sol),
                }
            }
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }

    match best {
        Some(sol) => {
            info!(
                sort = ?sol.sort_order,
                split = ?sol.split,
                resolution = sol.resolution.0,
                "portfolio picked"
            );
            Ok(sol)
        }
        None => Err(first_err.unwrap_or(AtlasError::Empty)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initiate_without_panels_frees_whole_canvas() {
        let layout = initiate(256, 4, &[]);
        assert_eq!(layout.resolution, 256);
        assert_eq!(layout.free_boxes, vec![Rect::new(0, 0, 256, 256)]);
        assert!(layout.placed_boxes.is_empty());
    }

    #[test]
    fn double_growth_jumps_past_oversized_decal() {
        let src = DecalSource::with_size("a", "a", 1000, 10);
        assert_eq!(grow(128, &src, 4, GrowthPolicy::Double), 1024);
        assert_eq!(grow(128, &src, 4, GrowthPolicy::Linear(10)), 138);
    }

    #[test]
    fn area_resolution_rounds_square_root() {
        let srcs = vec![
            DecalSource::with_size("a", "a", 100, 100),
            DecalSource::with_size("b", "b", 50, 40),
        ];
        // sqrt(12000) = 109.54
        assert_eq!(area_resolution(&srcs), 110);
    }
}
