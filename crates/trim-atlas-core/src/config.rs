use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Free-box split heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SplitHeuristic {
    /// Right box as tall as the placement, bottom box spanning the full free-box width.
    Axis,
    /// Cut along the larger leftover extent.
    Guillotine,
    /// Cut along the smaller leftover extent.
    GuillotineAlt,
}

impl SplitHeuristic {
    pub const ALL: [SplitHeuristic; 3] = [
        SplitHeuristic::Axis,
        SplitHeuristic::Guillotine,
        SplitHeuristic::GuillotineAlt,
    ];
}

impl FromStr for SplitHeuristic {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "axis" | "kivy" => Ok(Self::Axis),
            "guillotine" | "blackpawn" => Ok(Self::Guillotine),
            "guillotine_alt" | "guillotinealt" | "alt" => Ok(Self::GuillotineAlt),
            _ => Err(()),
        }
    }
}

/// Sorting orders for deterministic packing of non-prepacked decals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    WidthDesc,
    HeightDesc,
    AreaDesc,
    NameAsc,
    None,
}

impl SortOrder {
    /// Orders tried by portfolio packing.
    pub const PORTFOLIO: [SortOrder; 3] = [
        SortOrder::WidthDesc,
        SortOrder::HeightDesc,
        SortOrder::AreaDesc,
    ];
}

impl FromStr for SortOrder {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "width_desc" | "width" => Ok(Self::WidthDesc),
            "height_desc" | "height" => Ok(Self::HeightDesc),
            "area_desc" | "area" => Ok(Self::AreaDesc),
            "name_asc" | "name" => Ok(Self::NameAsc),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

/// How the canvas grows after a failed attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GrowthPolicy {
    /// Multiply by the smallest power of two that lets the failing decal fit.
    Double,
    /// Add a fixed number of pixels per attempt.
    Linear(u32),
}

impl FromStr for GrowthPolicy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.split_once(':') {
            None if lower == "double" => Ok(Self::Double),
            None if lower == "linear" => Ok(Self::Linear(10)),
            Some(("linear", step)) => step.parse().map(Self::Linear).map_err(|_| ()),
            _ => Err(()),
        }
    }
}

/// Iteration order of trims in a store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrimSort {
    ByName,
    ByPackOrder,
}

impl FromStr for TrimSort {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" | "by_name" => Ok(Self::ByName),
            "pack" | "by_pack_order" => Ok(Self::ByPackOrder),
            _ => Err(()),
        }
    }
}

/// Packing configuration.
/// Key notes:
///   - `split` selects how the leftover L-shape of a free box is cut after a placement
///   - `growth` decides the next canvas after a failed attempt; `max_resolution` and
///     `max_attempts` bound the grow-and-retry loop
///   - `portfolio` tries every sort x split combination and keeps the densest solution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackerConfig {
    /// First canvas edge. None derives it from the total decal area.
    #[serde(default)]
    pub min_resolution: Option<u32>,
    /// Largest canvas edge the grow-and-retry loop may reach.
    #[serde(default = "default_max_resolution")]
    pub max_resolution: u32,
    /// Upper bound on canvases tried per pack.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pixels between decals (half of it on the outer edge).
    #[serde(default = "default_padding")]
    pub padding: u32,

    #[serde(default = "default_split")]
    pub split: SplitHeuristic,
    #[serde(default = "default_sort_order")]
    pub sort_order: SortOrder,
    #[serde(default = "default_growth")]
    pub growth: GrowthPolicy,
    /// Try every sort x split combination and keep the best solution.
    #[serde(default)]
    pub portfolio: bool,
    /// Enable parallel candidate/channel evaluation when feature "parallel" is on.
    #[serde(default)]
    pub parallel: bool,

    /// Packed pixels per world unit of a trim matrix.
    #[serde(default = "default_pixels_per_unit")]
    pub pixels_per_unit: f64,
    #[serde(default = "default_trim_sort")]
    pub trim_sort: TrimSort,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            min_resolution: None,
            max_resolution: default_max_resolution(),
            max_attempts: default_max_attempts(),
            padding: default_padding(),
            split: default_split(),
            sort_order: default_sort_order(),
            growth: default_growth(),
            portfolio: false,
            parallel: false,
            pixels_per_unit: default_pixels_per_unit(),
            trim_sort: default_trim_sort(),
        }
    }
}

impl PackerConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - a resolution bound is zero or the minimum exceeds the maximum
    /// - the attempt bound is zero
    /// - the world scale is not a positive finite number
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::AtlasError;

        if self.max_resolution == 0 {
            return Err(AtlasError::InvalidDimensions {
                width: self.max_resolution,
                height: self.max_resolution,
            });
        }
        if let Some(min) = self.min_resolution {
            if min == 0 {
                return Err(AtlasError::InvalidDimensions {
                    width: min,
                    height: min,
                });
            }
            if min > self.max_resolution {
                return Err(AtlasError::InvalidConfig(format!(
                    "min_resolution ({}) exceeds max_resolution ({})",
                    min, self.max_resolution
                )));
            }
        }
        if self.max_attempts == 0 {
            return Err(AtlasError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }
        if self.padding >= self.max_resolution {
            return Err(AtlasError::InvalidConfig(format!(
                "padding ({}) leaves no usable space within max_resolution ({})",
                self.padding, self.max_resolution
            )));
        }
        if let GrowthPolicy::Linear(0) = self.growth {
            return Err(AtlasError::InvalidConfig(
                "linear growth step must be positive".into(),
            ));
        }
        if !(self.pixels_per_unit.is_finite() && self.pixels_per_unit > 0.0) {
            return Err(AtlasError::InvalidConfig(format!(
                "pixels_per_unit must be positive, got {}",
                self.pixels_per_unit
            )));
        }
        Ok(())
    }

    /// Coordinate transform matching this configuration's world scale.
    pub fn transform(&self) -> crate::transform::CoordinateTransform {
        crate::transform::CoordinateTransform::new(self.pixels_per_unit)
    }
}

fn default_max_resolution() -> u32 {
    16384
}
fn default_max_attempts() -> u32 {
    64
}
fn default_padding() -> u32 {
    4
}
fn default_split() -> SplitHeuristic {
    SplitHeuristic::Guillotine
}
fn default_sort_order() -> SortOrder {
    SortOrder::AreaDesc
}
fn default_growth() -> GrowthPolicy {
    GrowthPolicy::Double
}
fn default_pixels_per_unit() -> f64 {
    crate::transform::DEFAULT_PIXELS_PER_UNIT
}
fn default_trim_sort() -> TrimSort {
    TrimSort::ByName
}

/// Builder for `PackerConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct PackerConfigBuilder {
    cfg: PackerConfig,
}

impl PackerConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: PackerConfig::default(),
        }
    }
    pub fn min_resolution(mut self, v: u32) -> Self {
        self.cfg.min_resolution = Some(v);
        self
    }
    pub fn max_resolution(mut self, v: u32) -> Self {
        self.cfg.max_resolution = v;
        self
    }
    pub fn max_attempts(mut self, v: u32) -> Self {
        self.cfg.max_attempts = v;
        self
    }
    pub fn padding(mut self, v: u32) -> Self {
        self.cfg.padding = v;
        self
    }
    pub fn split(mut self, v: SplitHeuristic) -> Self {
        self.cfg.split = v;
        self
    }
    pub fn sort_order(mut self, v: SortOrder) -> Self {
        self.cfg.sort_order = v;
        self
    }
    pub fn growth(mut self, v: GrowthPolicy) -> Self {
        self.cfg.growth = v;
        self
    }
    pub fn portfolio(mut self, v: bool) -> Self {
        self.cfg.portfolio = v;
        self
    }
    pub fn parallel(mut self, v: bool) -> Self {
        self.cfg.parallel = v;
        self
    }
    pub fn pixels_per_unit(mut self, v: f64) -> Self {
        self.cfg.pixels_per_unit = v;
        self
    }
    pub fn trim_sort(mut self, v: TrimSort) -> Self {
        self.cfg.trim_sort = v;
        self
    }
    pub fn build(self) -> PackerConfig {
        self.cfg
    }
}

impl PackerConfig {
    /// Create a fluent builder for `PackerConfig`.
    pub fn builder() -> PackerConfigBuilder {
        PackerConfigBuilder::new()
    }
}
