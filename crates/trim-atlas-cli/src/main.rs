use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use globset::{Glob, GlobSetBuilder};
use serde::Deserialize;
use tracing::{error, info, warn};
use trim_atlas_core::prelude::*;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "trim-atlas",
    about = "Pack decal textures into trim atlases",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --no-progress or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack decal folders and render one map per channel plus data.json
    Pack(PackArgs),
    /// Layout only: compute placements and write data.json (no maps)
    Layout(PackArgs),
    /// Snap the trims of an existing data.json to a grid (re-renders maps with --input)
    Snap(SnapArgs),
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    // Input/Output
    /// Directory holding one sub-directory per decal
    #[arg(help_heading = "Input/Output")]
    input: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// Atlas name stored in data.json
    #[arg(short, long, default_value = "atlas", help_heading = "Input/Output")]
    name: String,
    /// Atlas uuid (a random one is generated when omitted)
    #[arg(long, help_heading = "Input/Output")]
    uuid: Option<String>,
    /// YAML config file path (overrides packing options)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,

    // Layout
    /// Atlas type: combined | normal | info
    #[arg(long, default_value = "combined", help_heading = "Layout")]
    atlas_type: String,
    /// First canvas edge (defaults to the square root of the total decal area)
    #[arg(long, help_heading = "Layout")]
    min_resolution: Option<u32>,
    /// Largest canvas edge before giving up
    #[arg(long, default_value_t = 16384, help_heading = "Layout")]
    max_resolution: u32,
    /// Largest number of canvases to try
    #[arg(long, default_value_t = 64, help_heading = "Layout")]
    max_attempts: u32,
    /// Padding between decals
    #[arg(long, default_value_t = 4, help_heading = "Layout")]
    padding: u32,
    /// Sort order: area_desc|height_desc|width_desc|name_asc|none
    #[arg(long, default_value = "area_desc", help_heading = "Layout")]
    sort_order: String,
    /// Trim order in data.json: name | pack
    #[arg(long, default_value = "name", help_heading = "Layout")]
    trim_sort: String,
    /// Packed pixels per world unit
    #[arg(long, default_value_t = 1000.0, help_heading = "Layout")]
    pixels_per_unit: f64,

    // Algorithms
    /// Split heuristic: axis | guillotine | guillotine_alt
    #[arg(long, default_value = "guillotine", help_heading = "Algorithms")]
    split: String,
    /// Canvas growth: double | linear | linear:<step>
    #[arg(long, default_value = "double", help_heading = "Algorithms")]
    growth: String,
    /// Try every sort x split combination and keep the densest
    #[arg(long, default_value_t = false, help_heading = "Algorithms")]
    portfolio: bool,
    /// Evaluate portfolio candidates and channels in parallel (requires core feature `parallel`)
    #[arg(long, default_value_t = false, help_heading = "Algorithms")]
    parallel: bool,

    // Export
    /// Map format: png | tga
    #[arg(long, default_value = "png", value_parser = ["png", "tga"], help_heading = "Export")]
    format: String,
    /// Shrink maps to the next lower power of two (or to this edge) after rendering
    #[arg(long, help_heading = "Export")]
    downscale: Option<Option<u32>>,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
    /// Dry run: pack and print stats but do not write files
    #[arg(long, default_value_t = false, help_heading = "Export")]
    dry_run: bool,
    #[arg(skip)]
    layout_only: bool,
}

#[derive(Parser, Debug, Clone)]
struct SnapArgs {
    /// data.json of a packed atlas
    record: PathBuf,
    /// Snap to a grid of N x N cells
    #[arg(long, conflicts_with = "pixel")]
    resolution: Option<u32>,
    /// Snap to the atlas pixel grid
    #[arg(long, default_value_t = false)]
    pixel: bool,
    /// Only snap this trim (uuid)
    #[arg(long)]
    trim: Option<String>,
    /// Packed pixels per world unit the record was written with
    #[arg(long, default_value_t = 1000.0)]
    pixels_per_unit: f64,
    /// Output file (defaults to overwriting the input)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Decal directory the atlas was packed from; maps are re-rendered next to the output.
    /// Without it only data.json changes and the maps no longer match the trims.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Atlas type used when re-rendering: combined | normal | info
    #[arg(long, default_value = "combined")]
    atlas_type: String,
    /// Map format used when re-rendering: png | tga
    #[arg(long, default_value = "png", value_parser = ["png", "tga"])]
    format: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Pack(args) => run_pack(args, cli.progress && !cli.quiet),
        Commands::Layout(args) => {
            let mut a = args.clone();
            a.layout_only = true;
            run_pack(&a, cli.progress && !cli.quiet)
        }
        Commands::Snap(args) => run_snap(args, cli.progress && !cli.quiet),
    }
}

fn packer_config(cli: &PackArgs) -> anyhow::Result<PackerConfig> {
    let cfg = PackerConfig {
        min_resolution: cli.min_resolution,
        max_resolution: cli.max_resolution,
        max_attempts: cli.max_attempts,
        padding: cli.padding,
        split: parse_enum(&cli.split, "split heuristic")?,
        sort_order: parse_enum(&cli.sort_order, "sort order")?,
        growth: parse_enum(&cli.growth, "growth policy")?,
        portfolio: cli.portfolio,
        parallel: cli.parallel,
        pixels_per_unit: cli.pixels_per_unit,
        trim_sort: parse_enum(&cli.trim_sort, "trim sort")?,
    };
    // Config file sets packing options en bloc
    let cfg = match &cli.config {
        Some(path) => {
            let file = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            let y: YamlConfig = serde_yaml::from_str(&file)?;
            y.into_packer_config(cfg)?
        }
        None => cfg,
    };
    cfg.validate()?;
    Ok(cfg)
}

fn run_pack(cli: &PackArgs, show_progress: bool) -> anyhow::Result<()> {
    let cfg = packer_config(cli)?;

    if cli.print_config {
        match cli.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }

    let atlas_type: AtlasType = parse_enum(&cli.atlas_type, "atlas type")?;
    let format: AtlasFormat = parse_enum(&cli.format, "map format")?;
    let decal_dirs = gather_decal_dirs(&cli.input, &cli.include, &cli.exclude)?;
    let sources = load_decals_with_progress(&decal_dirs, show_progress)?;
    info!(count = sources.len(), "loaded decals");
    if sources.is_empty() {
        anyhow::bail!("no decals found under {}", cli.input.display());
    }

    let uuid = cli
        .uuid
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut atlas = AtlasContext::new(&cli.name, uuid, atlas_type, cfg)?;
    for src in sources {
        atlas.add_source(src)?;
    }
    let stats = atlas.pack()?.stats();
    info!(
        resolution = stats.resolution.0,
        attempts = stats.attempts,
        occupancy = %format!("{:.2}%", stats.occupancy * 100.0),
        "stats"
    );

    if cli.dry_run {
        println!("{}", stats.summary());
        return Ok(());
    }
    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("create out_dir {}", cli.out_dir.display()))?;

    let mut downscale = None;
    if !cli.layout_only {
        let codec = ImageCrateCodec::new(format);
        let results = atlas.render_maps(&codec, &cli.out_dir)?;
        let mut rendered = Vec::new();
        for (channel, res) in results {
            match res {
                Ok(report) => {
                    if !report.missing_channels.is_empty() {
                        warn!(
                            ?channel,
                            decals = report.missing_channels.len(),
                            "decals without this channel were filled with neutral color"
                        );
                    }
                    for id in &report.policy_mismatches {
                        warn!(decal = %id, "repeat cell too narrow, stretched instead");
                    }
                    if let Some(path) = report.path {
                        info!(?path, ?channel, "wrote map");
                        rendered.push(path);
                    }
                }
                Err(e) => error!(?channel, error = %e, "map failed"),
            }
        }
        if rendered.is_empty() {
            anyhow::bail!("no map could be rendered");
        }
        if let Some(size) = cli.downscale {
            let edge = size.unwrap_or_else(|| lower_and_upper_pow2(stats.resolution.0).0);
            if edge < stats.resolution.0 {
                downscale_maps(&codec, &rendered, edge)?;
                downscale = Some(edge);
            } else {
                warn!(edge, "downscale edge is not below the atlas resolution, skipped");
            }
        }
    }

    let record = atlas.record(downscale)?;
    let json_path = cli.out_dir.join("data.json");
    record
        .write(&json_path)
        .with_context(|| format!("write {}", json_path.display()))?;
    info!(?json_path, trims = record.trims.len(), "atlas written");
    Ok(())
}

fn downscale_maps(codec: &ImageCrateCodec, paths: &[PathBuf], edge: u32) -> anyhow::Result<()> {
    for path in paths {
        let img = codec
            .open(path)
            .with_context(|| format!("read {}", path.display()))?;
        let small = codec.resize(&img, edge, edge);
        codec
            .save(&small, path)
            .with_context(|| format!("write {}", path.display()))?;
    }
    info!(edge, maps = paths.len(), "downscaled maps");
    Ok(())
}

fn run_snap(args: &SnapArgs, show_progress: bool) -> anyhow::Result<()> {
    let target = match (args.resolution, args.pixel) {
        (Some(n), false) => SnapTarget::Resolution(n, n),
        (None, true) => SnapTarget::Pixel,
        _ => anyhow::bail!("pass either --resolution <N> or --pixel"),
    };
    let record = AtlasRecord::read(&args.record)
        .with_context(|| format!("read {}", args.record.display()))?;
    let path = args.output.clone().unwrap_or_else(|| args.record.clone());

    let out = match &args.input {
        Some(input) => snap_and_render(args, input, &record, &target, &path, show_progress)?,
        None => {
            let transform = CoordinateTransform::new(args.pixels_per_unit);
            let mut store = TrimStore::new(transform);
            record.apply_to(&mut store)?;
            match &args.trim {
                Some(uuid) => store.apply_snap(uuid, &target)?,
                None => {
                    for (uuid, e) in store.snap_all(&target) {
                        warn!(trim = %uuid, error = %e, "trim left unsnapped");
                    }
                }
            }
            if !record.maps.is_empty() {
                warn!("maps were not re-rendered; pass --input <decal dir> to rebuild them");
            }
            AtlasRecord::from_store(&record.name, &record.uuid, &store, record.maps.clone())
        }
    };

    out.write(&path)
        .with_context(|| format!("write {}", path.display()))?;
    info!(?path, trims = out.trims.len(), "snapped trims written");
    Ok(())
}

/// Rebuilds the atlas from its decals, applies the record's trims, snaps and re-renders.
fn snap_and_render(
    args: &SnapArgs,
    input: &Path,
    record: &AtlasRecord,
    target: &SnapTarget,
    out_path: &Path,
    show_progress: bool,
) -> anyhow::Result<AtlasRecord> {
    let cfg = PackerConfig {
        pixels_per_unit: args.pixels_per_unit,
        ..PackerConfig::default()
    };
    let atlas_type: AtlasType = parse_enum(&args.atlas_type, "atlas type")?;
    let format: AtlasFormat = parse_enum(&args.format, "map format")?;
    let dirs = gather_decal_dirs(input, &[], &[])?;
    let mut atlas = AtlasContext::new(&record.name, &record.uuid, atlas_type, cfg)?;
    for src in load_decals_with_progress(&dirs, show_progress)? {
        atlas.add_source(src)?;
    }
    atlas.pack()?;
    record.apply_to(atlas.store_mut())?;

    match &args.trim {
        Some(uuid) => atlas.snap_trim(uuid, target)?,
        None => {
            for (uuid, e) in atlas.store_mut().snap_all(target) {
                warn!(trim = %uuid, error = %e, "trim left unsnapped");
            }
        }
    }

    let dir = out_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    for (channel, res) in atlas.render_maps(&ImageCrateCodec::new(format), dir)? {
        match res {
            Ok(report) => info!(path = ?report.path, ?channel, "wrote map"),
            Err(e) => error!(?channel, error = %e, "map failed"),
        }
    }
    Ok(atlas.record(None)?)
}

fn parse_enum<T: std::str::FromStr>(s: &str, what: &str) -> anyhow::Result<T> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("unknown {}: {}", what, s))
}

/// Directories holding at least one channel texture, in sorted order.
fn gather_decal_dirs(
    path: &Path,
    include: &[String],
    exclude: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    // Build glob matchers
    let mut inc_set = None;
    if !include.is_empty() {
        let mut b = GlobSetBuilder::new();
        for pat in include {
            b.add(Glob::new(pat)?);
        }
        inc_set = Some(b.build()?);
    }
    let mut exc_set = None;
    if !exclude.is_empty() {
        let mut b = GlobSetBuilder::new();
        for pat in exclude {
            b.add(Glob::new(pat)?);
        }
        exc_set = Some(b.build()?);
    }
    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let p = entry.path();
        if p.is_file()
            && !should_skip(p, inc_set.as_ref(), exc_set.as_ref())
            && channel_of(p).is_some()
        {
            if let Some(parent) = p.parent() {
                if !dirs.iter().any(|d| d == parent) {
                    dirs.push(parent.to_path_buf());
                }
            }
        }
    }
    Ok(dirs)
}

fn should_skip(
    p: &Path,
    include: Option<&globset::GlobSet>,
    exclude: Option<&globset::GlobSet>,
) -> bool {
    let s = p.to_string_lossy().replace('\\', "/");
    if let Some(ex) = exclude {
        if ex.is_match(&s) {
            return true;
        }
    }
    if let Some(inc) = include {
        if !inc.is_match(&s) {
            return true;
        }
    }
    false
}

/// Channel encoded in a texture file name such as `ao_curv_height.png`.
fn channel_of(p: &Path) -> Option<ChannelKind> {
    let ext = p.extension()?.to_str()?.to_ascii_lowercase();
    if !matches!(ext.as_str(), "png" | "tga" | "jpg" | "jpeg") {
        return None;
    }
    p.file_stem()?.to_str()?.parse().ok()
}

/// Optional `decal.yaml` next to the channel textures.
#[derive(Debug, Deserialize, Default)]
struct DecalMeta {
    name: Option<String>,
    uuid: Option<String>,
    #[serde(default)]
    panel: bool,
    prepack: Option<String>,
    height_scale: Option<f32>,
}

fn load_decals_with_progress(dirs: &[PathBuf], progress: bool) -> anyhow::Result<Vec<DecalSource>> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(dirs.len() as u64);
        b.set_style(ProgressStyle::with_template(
            "{spinner:.green} loading {pos}/{len} [{elapsed_precise}] {wide_msg}",
        )?);
        Some(b)
    } else {
        None
    };
    let mut list = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let msg = dir.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if let Some(b) = &bar {
            b.set_message(msg.to_string());
        }
        match load_decal(dir) {
            Ok(src) => list.push(src),
            Err(e) => {
                error!(?dir, error = %e, "skip decal");
            }
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    Ok(list)
}

fn load_decal(dir: &Path) -> anyhow::Result<DecalSource> {
    let meta_path = dir.join("decal.yaml");
    let meta: DecalMeta = if meta_path.is_file() {
        serde_yaml::from_str(&fs::read_to_string(&meta_path)?)
            .with_context(|| format!("parse {}", meta_path.display()))?
    } else {
        DecalMeta::default()
    };

    let mut channels = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(channel) = channel_of(&path) {
            let size = image::image_dimensions(&path)
                .with_context(|| format!("read size of {}", path.display()))?;
            channels.insert(channel, PixelBufferRef::File { path, size });
        }
    }
    if channels.is_empty() {
        anyhow::bail!("no channel textures in {}", dir.display());
    }

    let dir_name = dir
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "decal".into());
    let id = meta.uuid.unwrap_or_else(|| dir_name.clone());
    let name = meta.name.unwrap_or(dir_name);
    let mut src = DecalSource::new(id, name, channels);
    if meta.panel {
        let prepack = match meta.prepack {
            Some(p) => parse_enum(&p, "prepack policy")?,
            None => PrepackPolicy::None,
        };
        src = src.panel(prepack);
    }
    if let Some(h) = meta.height_scale {
        src = src.height_scale(h);
    }
    Ok(src)
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Deserialize, Default)]
struct YamlConfig {
    min_resolution: Option<u32>,
    max_resolution: Option<u32>,
    max_attempts: Option<u32>,
    padding: Option<u32>,
    split: Option<String>,
    sort_order: Option<String>,
    growth: Option<String>,
    portfolio: Option<bool>,
    parallel: Option<bool>,
    pixels_per_unit: Option<f64>,
    trim_sort: Option<String>,
}

impl YamlConfig {
    fn into_packer_config(self, mut cfg: PackerConfig) -> anyhow::Result<PackerConfig> {
        if let Some(v) = self.min_resolution {
            cfg.min_resolution = Some(v);
        }
        if let Some(v) = self.max_resolution {
            cfg.max_resolution = v;
        }
        if let Some(v) = self.max_attempts {
            cfg.max_attempts = v;
        }
        if let Some(v) = self.padding {
            cfg.padding = v;
        }
        if let Some(v) = self.split {
            cfg.split = parse_enum(&v, "split heuristic")?;
        }
        if let Some(v) = self.sort_order {
            cfg.sort_order = parse_enum(&v, "sort order")?;
        }
        if let Some(v) = self.growth {
            cfg.growth = parse_enum(&v, "growth policy")?;
        }
        if let Some(v) = self.portfolio {
            cfg.portfolio = v;
        }
        if let Some(v) = self.parallel {
            cfg.parallel = v;
        }
        if let Some(v) = self.pixels_per_unit {
            cfg.pixels_per_unit = v;
        }
        if let Some(v) = self.trim_sort {
            cfg.trim_sort = parse_enum(&v, "trim sort")?;
        }
        Ok(cfg)
    }
}
