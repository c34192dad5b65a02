use image::Rgba;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use trim_atlas_core::prelude::*;

const RED: [u8; 3] = [255, 0, 0];
const GRAY: [u8; 4] = [128, 128, 128, 255];

fn solid(w: u32, h: u32, rgb: [u8; 3]) -> PixelBufferRef {
    PixelBufferRef::Memory(Arc::new(PixelBuffer::from_pixel(
        w,
        h,
        Rgba([rgb[0], rgb[1], rgb[2], 255]),
    )))
}

fn decal(id: &str, w: u32, h: u32, rgb: [u8; 3]) -> DecalSource {
    let channels: BTreeMap<_, _> = [(ChannelKind::Color, solid(w, h, rgb))].into_iter().collect();
    DecalSource::new(id, id, channels)
}

fn out_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("trim_atlas_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn context(min: u32, sources: Vec<DecalSource>) -> AtlasContext {
    let cfg = PackerConfig::builder().min_resolution(min).padding(0).build();
    let mut ctx = AtlasContext::new("edits", "edits-uuid", AtlasType::Info, cfg).expect("cfg");
    for src in sources {
        ctx.add_source(src).expect("unique");
    }
    ctx.pack().expect("packs");
    ctx
}

#[test]
fn snapped_trim_is_rendered_where_the_record_points() {
    let mut ctx = context(256, vec![decal("r", 100, 60, RED)]);
    assert_eq!(ctx.solution().and_then(|s| s.placed_box("r")), Some(&Rect::new(0, 0, 100, 60)));

    ctx.snap_trim("r", &SnapTarget::Resolution(2, 2)).expect("snaps");
    let dir = out_dir("snapped");
    let results = ctx
        .render_maps(&ImageCrateCodec::default(), &dir)
        .expect("packed");
    assert!(results.iter().all(|(_, r)| r.is_ok()));

    let cell = Rect::new(0, 0, 128, 128);
    assert_eq!(ctx.solution().and_then(|s| s.placed_box("r")), Some(&cell));
    let src = &ctx.sources()[0];
    assert_eq!(src.size, (128, 128));
    assert_eq!(src.original_size, (100, 60));
    assert_eq!(ctx.store().get("r").map(|t| t.original_size), Some((100, 60)));

    let record = ctx.record(None).expect("packed");
    assert_eq!(record.trims[0].coords, [0, 0]);
    assert_eq!(record.trims[0].dimensions, [128, 128]);

    let color = image::open(dir.join("color.png")).expect("readable").to_rgba8();
    assert_eq!(color.get_pixel(127, 127).0, [255, 0, 0, 255]);
    assert_eq!(color.get_pixel(128, 128).0, GRAY);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn repack_keeps_the_snapped_size() {
    let mut ctx = context(256, vec![decal("r", 100, 60, RED)]);
    ctx.snap_trim("r", &SnapTarget::Resolution(2, 2)).expect("snaps");

    let sol = ctx.repack().expect("packs").clone();
    let placed = sol.placed_box("r").expect("placed");
    assert_eq!((placed.w, placed.h), (128, 128));
    let trim = ctx.store().get("r").expect("trim");
    assert_eq!(trim.matrix.scale, [0.5, 0.5]);
    assert_eq!(trim.original_size, (100, 60));

    // reset goes back to the authored size on the next repack
    ctx.reset_trim_scale("r").expect("known");
    let sol = ctx.repack().expect("packs").clone();
    let placed = sol.placed_box("r").expect("placed");
    assert_eq!((placed.w, placed.h), (100, 60));
}

#[test]
fn tweak_to_a_larger_canvas_widens_panels_and_keeps_pixels() {
    let panel = decal("p", 100, 50, [1, 2, 3]).panel(PrepackPolicy::Repeat);
    let mut ctx = context(320, vec![panel, decal("d", 64, 64, [40, 50, 60])]);
    let before = ctx.solution().cloned().expect("packed");
    assert_eq!(before.resolution, (320, 320));
    assert_eq!(before.placed_box("p"), Some(&Rect::new(0, 0, 320, 50)));
    let d_box = *before.placed_box("d").expect("placed");

    let sol = ctx.tweak(Some(640)).expect("packed").clone();
    assert_eq!(sol.resolution, (640, 640));
    assert_eq!(sol.placed_box("p"), Some(&Rect::new(0, 0, 640, 50)));
    assert_eq!(sol.placed_box("d"), Some(&d_box));
    assert_eq!(ctx.store().resolution(), (640, 640));
    let p = ctx.sources().iter().find(|s| s.id == "p").expect("panel");
    assert_eq!(p.size, (640, 50));
    assert_eq!(p.original_size, (100, 50));

    let codec = ImageCrateCodec::default();
    let (map, report) = AtlasCompositor::new(&codec)
        .composite_channel(ChannelKind::Color, &sol, ctx.sources())
        .expect("composites");
    assert_eq!(report.repetitions, vec![("p".to_string(), Some(6))]);
    assert_eq!(map.rgba.get_pixel(d_box.x + 10, d_box.y + 10).0, [40, 50, 60, 255]);
    assert_eq!(map.rgba.get_pixel(639, 639).0, GRAY);
}

#[test]
fn tweak_needs_a_packing_and_a_canvas() {
    let cfg = PackerConfig::builder().min_resolution(64).build();
    let mut ctx = AtlasContext::new("t", "t", AtlasType::Info, cfg).expect("cfg");
    ctx.add_source(decal("a", 16, 16, RED)).expect("unique");
    assert!(matches!(ctx.tweak(None), Err(AtlasError::NotPacked)));
    ctx.pack().expect("packs");
    assert!(matches!(
        ctx.tweak(Some(0)),
        Err(AtlasError::InvalidDimensions { .. })
    ));
    // untouched trims rebuild the same boxes
    let packed = ctx.solution().cloned().expect("packed");
    let tweaked = ctx.tweak(None).expect("packed").clone();
    assert_eq!(tweaked.placed_boxes, packed.placed_boxes);
}

#[test]
fn removed_source_leaves_the_other_maps_renderable() {
    let mut ctx = context(
        256,
        vec![decal("a", 64, 64, [10, 200, 10]), decal("b", 32, 32, RED)],
    );
    let b_box = *ctx
        .solution()
        .and_then(|s| s.placed_box("b"))
        .expect("placed");

    ctx.remove_source("b").expect("known");
    assert!(ctx.solution().and_then(|s| s.placed_box("b")).is_none());

    let dir = out_dir("removed");
    let results = ctx
        .render_maps(&ImageCrateCodec::default(), &dir)
        .expect("packed");
    assert_eq!(results.len(), 3);
    for (channel, res) in &results {
        assert!(res.is_ok(), "{channel:?} failed: {res:?}");
    }
    let color = image::open(dir.join("color.png")).expect("readable").to_rgba8();
    assert_eq!(color.get_pixel(b_box.x, b_box.y).0, GRAY);
    assert_eq!(ctx.record(None).expect("packed").trims.len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}
