use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trim_atlas_core::prelude::*;

#[test]
fn box_matrix_box_round_trip_is_exact() {
    let mut rng = StdRng::seed_from_u64(0x7A11);
    let t = CoordinateTransform::default();
    for _ in 0..2000 {
        let res = (rng.gen_range(1..=4096u32), rng.gen_range(1..=4096u32));
        let x = rng.gen_range(0..res.0);
        let y = rng.gen_range(0..res.1);
        let w = rng.gen_range(1..=res.0 - x);
        let h = rng.gen_range(1..=res.1 - y);
        let r = Rect::new(x, y, w, h);
        let m = t.box_to_trim_matrix(&r, res);
        assert_eq!(t.trim_matrix_to_box(&m, res), r, "res {:?}", res);
    }
}

#[test]
fn round_trip_holds_for_other_world_scales() {
    let mut rng = StdRng::seed_from_u64(42);
    for ppu in [1.0, 100.0, 2048.0] {
        let t = CoordinateTransform::new(ppu);
        for _ in 0..200 {
            let r = Rect::new(
                rng.gen_range(0..512),
                rng.gen_range(0..512),
                rng.gen_range(1..=512),
                rng.gen_range(1..=512),
            );
            let m = t.box_to_trim_matrix(&r, (1024, 1024));
            assert_eq!(t.trim_matrix_to_box(&m, (1024, 1024)), r);
        }
    }
}

#[test]
fn adjacent_trims_keep_a_shared_edge() {
    let t = CoordinateTransform::default();
    let res = (1000, 700);
    let a = t.box_to_trim_matrix(&Rect::new(13, 7, 331, 95), res);
    let b = t.box_to_trim_matrix(&Rect::new(344, 7, 17, 95), res);
    let ((ax, _), (aw, _)) = t.trim_matrix_to_coords(&a, res);
    let ((bx, _), _) = t.trim_matrix_to_coords(&b, res);
    assert_eq!(ax + aw as i64, bx);
}

#[test]
fn uv_quad_matches_trim_bounds() {
    let t = CoordinateTransform::default();
    let res = (2048, 1024);
    let r = Rect::new(512, 256, 1024, 128);
    let m = t.box_to_trim_matrix(&r, res);
    let uv = box_to_uv((r.x as i64, r.y as i64), (r.w, r.h), res);
    let ([lo, hi], mid) = t.trim_uv_bounds(&m, res);

    assert!((uv[0][0] - lo[0]).abs() < 1e-9);
    assert!((uv[0][1] - hi[1]).abs() < 1e-9);
    assert!((uv[2][0] - hi[0]).abs() < 1e-9);
    assert!((uv[2][1] - lo[1]).abs() < 1e-9);
    assert!((mid[0] - 0.5).abs() < 1e-9);
    assert!((mid[1] - 0.6875).abs() < 1e-9);
}

#[test]
fn plane_quad_spans_box_in_world_units() {
    let t = CoordinateTransform::new(500.0);
    let v = t.box_to_plane_vertices((250, 100));
    assert_eq!(v[0], [-0.25, 0.1, 0.0]);
    assert_eq!(v[1], [0.25, 0.1, 0.0]);
    assert_eq!(v[3], [-0.25, -0.1, 0.0]);

    let backdrop = t.atlas_plane_vertices((1000, 1000));
    assert_eq!(backdrop[2], [1.0, -1.0, 0.0]);
}

#[test]
fn rescaling_keeps_relative_positions() {
    let t = CoordinateTransform::default();
    let r = Rect::new(100, 300, 50, 20);
    let mut trims = vec![Trim {
        uuid: "u".into(),
        name: "n".into(),
        matrix: t.box_to_trim_matrix(&r, (1000, 1000)),
        is_panel: false,
        is_active: true,
        original_size: (50, 20),
        prepack: PrepackPolicy::None,
        repetitions: None,
        display: None,
    }];
    t.rescale_locations(&mut trims, (1000, 1000), (2000, 2000));
    assert_eq!(
        t.trim_matrix_to_box(&trims[0].matrix, (2000, 2000)),
        Rect::new(200, 600, 100, 40)
    );
}

#[test]
fn display_quad_sits_on_trim_translation() {
    let t = CoordinateTransform::default();
    let m = t.box_to_trim_matrix(&Rect::new(0, 0, 500, 500), (1000, 1000));
    assert_eq!(t.trim_center(&m), [-0.25, 0.25, 0.0]);
}

#[test]
fn box_is_clipped_at_the_top_left_canvas_edge() {
    let t = CoordinateTransform::default();
    // 30x20 box whose left edge sits 10 px outside a 100 px canvas
    let m = TrimMatrix::new([-0.045, 0.035], [0.3, 0.2]);
    assert_eq!(t.trim_matrix_to_coords(&m, (100, 100)), ((-10, 5), (30, 20)));
    assert_eq!(t.trim_matrix_to_box(&m, (100, 100)), Rect::new(0, 5, 20, 20));
}

#[test]
fn reframing_keeps_pixel_placement() {
    let t = CoordinateTransform::default();
    let r = Rect::new(10, 20, 30, 40);
    let m = t.box_to_trim_matrix(&r, (100, 100));
    let grown = t.reframe_matrix(&m, (100, 100), (256, 256));
    assert_eq!(t.trim_matrix_to_box(&grown, (256, 256)), r);
    let back = t.reframe_matrix(&grown, (256, 256), (100, 100));
    assert_eq!(t.trim_matrix_to_box(&back, (100, 100)), r);
}
