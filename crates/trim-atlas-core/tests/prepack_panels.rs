use trim_atlas_core::prelude::*;

fn panels() -> Vec<DecalSource> {
    vec![
        DecalSource::with_size("a", "panel_a", 256, 200).panel(PrepackPolicy::Stretch),
        DecalSource::with_size("b", "panel_b", 256, 300).panel(PrepackPolicy::Repeat),
    ]
}

#[test]
fn stacked_panels_bump_the_canvas() {
    let sources = panels();
    let refs: Vec<&DecalSource> = sources.iter().collect();
    let layout = initiate(256, 8, &refs);

    // 4 + 200 + 8 + 300 + 8 + 4
    assert_eq!(layout.resolution, 524);
    assert_eq!(
        layout.placed_boxes,
        vec![
            ("a".to_string(), Rect::new(0, 4, 524, 200)),
            ("b".to_string(), Rect::new(0, 212, 524, 300)),
        ]
    );
    assert_eq!(layout.free_boxes, vec![Rect::new(0, 516, 524, 8)]);
}

#[test]
fn panels_only_pack_in_one_attempt() {
    let cfg = PackerConfig::builder().min_resolution(256).padding(8).build();
    let sol = pack_sources(&panels(), &cfg).expect("packs");
    assert_eq!(sol.resolution, (524, 524));
    assert_eq!(sol.attempts, 1);
}

#[test]
fn free_decals_pack_below_the_stack() {
    let mut sources = panels();
    sources.push(DecalSource::with_size("c", "bolt", 64, 64));
    let cfg = PackerConfig::builder().min_resolution(256).padding(8).build();

    let sol = pack_sources(&sources, &cfg).expect("packs");
    // 72 px cell does not fit the 8 px band, so the canvas doubles once
    assert_eq!(sol.resolution, (1048, 1048));
    assert_eq!(sol.placed_box("a"), Some(&Rect::new(0, 4, 1048, 200)));
    assert_eq!(sol.placed_box("b"), Some(&Rect::new(0, 212, 1048, 300)));
    let bolt = sol.placed_box("c").expect("placed");
    assert_eq!((bolt.x, bolt.y), (4, 520));
}

#[test]
fn only_panels_are_prepacked() {
    let mut plain = DecalSource::with_size("b", "plain", 32, 32);
    plain.prepack = PrepackPolicy::Repeat;
    let sources = vec![
        DecalSource::with_size("a", "panel_a", 256, 32).panel(PrepackPolicy::None),
        plain,
    ];
    assert!(!sources[0].is_prepacked());
    assert!(!sources[1].is_prepacked());

    let cfg = PackerConfig::builder().min_resolution(512).padding(0).build();
    let sol = pack_sources(&sources, &cfg).expect("packs");
    assert_eq!(sol.placed_box("a"), Some(&Rect::new(0, 0, 256, 32)));
}
