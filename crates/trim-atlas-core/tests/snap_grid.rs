use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trim_atlas_core::prelude::*;

#[test]
fn right_edge_at_513_snaps_to_512() {
    let t = CoordinateTransform::default();
    let res = (1024, 1024);
    let m = t.box_to_trim_matrix(&Rect::new(300, 100, 213, 100), res);
    let snapped = snap_trim_matrix(&t, &m, res, &SnapTarget::Resolution(8, 8)).expect("snaps");
    assert_eq!(
        t.trim_matrix_to_box(&snapped, res),
        Rect::new(256, 128, 256, 128)
    );
    // input untouched
    assert_eq!(t.trim_matrix_to_box(&m, res), Rect::new(300, 100, 213, 100));
}

#[test]
fn snapping_twice_changes_nothing() {
    let mut rng = StdRng::seed_from_u64(5);
    let t = CoordinateTransform::default();
    let res = (1024, 1024);
    for target in [SnapTarget::Resolution(16, 16), SnapTarget::Resolution(7, 3)] {
        for _ in 0..300 {
            let x = rng.gen_range(0..1000);
            let y = rng.gen_range(0..1000);
            let r = Rect::new(x, y, rng.gen_range(1..=1024 - x), rng.gen_range(1..=1024 - y));
            let m = t.box_to_trim_matrix(&r, res);
            let once = snap_trim_matrix(&t, &m, res, &target).expect("snaps");
            let twice = snap_trim_matrix(&t, &once, res, &target).expect("snaps");
            assert_eq!(once, twice);
            assert!(once.scale[0] > 0.0 && once.scale[1] > 0.0);
        }
    }
}

#[test]
fn pixel_target_rounds_fractional_edges() {
    let t = CoordinateTransform::default();
    let res = (256, 256);
    let m = TrimMatrix::new([0.0104, -0.0203], [40.3 / 256.0, 19.6 / 256.0]);
    let snapped = snap_trim_matrix(&t, &m, res, &SnapTarget::Pixel).expect("snaps");
    let w = snapped.scale[0] * 256.0;
    let h = snapped.scale[1] * 256.0;
    assert_eq!(w.fract(), 0.0);
    assert_eq!(h.fract(), 0.0);
}

#[test]
fn collapsed_trim_grows_to_one_cell() {
    let t = CoordinateTransform::default();
    let res = (1024, 1024);
    // 10 px wide trim next to a 256 px grid line
    let m = t.box_to_trim_matrix(&Rect::new(250, 0, 10, 256), res);
    let snapped = snap_trim_matrix(&t, &m, res, &SnapTarget::Resolution(4, 4)).expect("snaps");
    assert_eq!(
        t.trim_matrix_to_box(&snapped, res),
        Rect::new(256, 0, 256, 256)
    );
}

#[test]
fn guide_lines_from_world_points() {
    let t = CoordinateTransform::default();
    let res = (1024, 1024);
    // a guide quad covering the left half of the atlas
    let quad = t
        .box_to_plane_vertices((512, 1024))
        .map(|[x, y, z]| [x - 0.256, y, z]);
    let lines = SnapLines::from_world_points(&quad, res, &t);
    assert_eq!(lines.x, vec![0.0, 512.0]);
    assert_eq!(lines.y, vec![0.0, 1024.0]);

    let m = t.box_to_trim_matrix(&Rect::new(30, 40, 400, 900), res);
    let snapped = snap_trim_matrix(&t, &m, res, &SnapTarget::Lines(lines)).expect("snaps");
    assert_eq!(
        t.trim_matrix_to_box(&snapped, res),
        Rect::new(0, 0, 512, 1024)
    );
}

#[test]
fn single_guide_line_is_degenerate() {
    let t = CoordinateTransform::default();
    let res = (1024, 1024);
    let m = t.box_to_trim_matrix(&Rect::new(0, 0, 64, 64), res);
    let lines = SnapLines::new(vec![512.0], vec![0.0, 1024.0]);
    let err = snap_trim_matrix(&t, &m, res, &SnapTarget::Lines(lines)).unwrap_err();
    assert!(matches!(
        err,
        AtlasError::DegenerateSnapResult {
            axis: Axis::Horizontal
        }
    ));
}

#[test]
fn zero_snap_resolution_is_rejected() {
    let t = CoordinateTransform::default();
    let m = TrimMatrix::new([0.0, 0.0], [0.5, 0.5]);
    assert!(matches!(
        snap_trim_matrix(&t, &m, (512, 512), &SnapTarget::Resolution(0, 4)),
        Err(AtlasError::InvalidDimensions { .. })
    ));
}
