use trim_atlas_core::prelude::*;

#[test]
fn oversized_decal_hits_max_resolution() {
    let sources = vec![DecalSource::with_size("big", "big", 1000, 10)];
    let cfg = PackerConfig::builder().max_resolution(600).build();
    match pack_sources(&sources, &cfg) {
        Err(AtlasError::PackingInfeasible {
            sources,
            resolution,
            attempts,
        }) => {
            assert_eq!(sources, 1);
            assert_eq!(resolution, 600);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected PackingInfeasible, got {other:?}"),
    }
}

#[test]
fn attempt_bound_stops_slow_growth() {
    let sources = vec![DecalSource::with_size("a", "a", 100, 100)];
    let cfg = PackerConfig::builder()
        .min_resolution(10)
        .padding(0)
        .growth(GrowthPolicy::Linear(1))
        .max_attempts(5)
        .build();
    let err = pack_sources(&sources, &cfg).unwrap_err();
    assert!(matches!(
        err,
        AtlasError::PackingInfeasible { attempts: 5, .. }
    ));
}

#[test]
fn tall_panel_stack_beyond_max_is_infeasible() {
    let sources = vec![
        DecalSource::with_size("p1", "p1", 64, 400).panel(PrepackPolicy::Stretch),
        DecalSource::with_size("p2", "p2", 64, 400).panel(PrepackPolicy::Stretch),
    ];
    let cfg = PackerConfig::builder().max_resolution(512).build();
    assert!(matches!(
        pack_sources(&sources, &cfg),
        Err(AtlasError::PackingInfeasible { .. })
    ));
}

#[test]
fn empty_and_degenerate_inputs_are_rejected() {
    let cfg = PackerConfig::default();
    assert!(matches!(pack_sources(&[], &cfg), Err(AtlasError::Empty)));

    let zero = vec![DecalSource::with_size("z", "z", 0, 16)];
    assert!(matches!(
        pack_sources(&zero, &cfg),
        Err(AtlasError::InvalidInput(_))
    ));
}

#[test]
fn invalid_configs_are_rejected() {
    let one = vec![DecalSource::with_size("a", "a", 8, 8)];
    let bad = [
        PackerConfig::builder().min_resolution(0).build(),
        PackerConfig::builder().min_resolution(4096).max_resolution(1024).build(),
        PackerConfig::builder().max_attempts(0).build(),
        PackerConfig::builder().growth(GrowthPolicy::Linear(0)).build(),
        PackerConfig::builder().pixels_per_unit(0.0).build(),
    ];
    for cfg in bad {
        assert!(pack_sources(&one, &cfg).is_err(), "{cfg:?} accepted");
    }
}

#[test]
fn config_enums_parse_from_cli_strings() {
    assert_eq!("kivy".parse::<SplitHeuristic>(), Ok(SplitHeuristic::Axis));
    assert_eq!("blackpawn".parse::<SplitHeuristic>(), Ok(SplitHeuristic::Guillotine));
    assert_eq!("linear:32".parse::<GrowthPolicy>(), Ok(GrowthPolicy::Linear(32)));
    assert_eq!("linear".parse::<GrowthPolicy>(), Ok(GrowthPolicy::Linear(10)));
    assert_eq!("double".parse::<GrowthPolicy>(), Ok(GrowthPolicy::Double));
    assert!("triple".parse::<GrowthPolicy>().is_err());
    assert_eq!("area".parse::<SortOrder>(), Ok(SortOrder::AreaDesc));
}
