use legend_sim::{
    volume_id, GeometryClassifier, GeometryError, GeometryVariant, Region, Vec3,
    DEFAULT_DETECTORS_PER_TUBE,
};

fn baseline() -> GeometryClassifier {
    GeometryClassifier::new(GeometryVariant::Baseline, DEFAULT_DETECTORS_PER_TUBE)
}

#[test]
fn quadrant_rule_picks_dominant_axis_then_sign() {
    let classifier = baseline();
    assert_eq!(classifier.reentrance_tube(3.0, 1.0), 0);
    assert_eq!(classifier.reentrance_tube(1.0, 3.0), 1);
    assert_eq!(classifier.reentrance_tube(-3.0, 1.0), 2);
    assert_eq!(classifier.reentrance_tube(1.0, -3.0), 3);
}

#[test]
fn equal_magnitudes_fall_back_to_tube_zero() {
    let classifier = baseline();
    assert_eq!(classifier.reentrance_tube(2.0, 2.0), 0);
    assert_eq!(classifier.reentrance_tube(-2.0, 2.0), 0);
    assert_eq!(classifier.reentrance_tube(0.0, 0.0), 0);
}

#[test]
fn detector_number_combines_copy_number_and_tube() {
    let classifier = GeometryClassifier::new(GeometryVariant::Baseline, 10);
    let placement = classifier.classify(Vec3::new(0.0, -5.0, 1.0), 4);
    assert_eq!(placement.tube, 3);
    assert_eq!(placement.detector, 34);
    assert_eq!(classifier.element_tube(placement.detector), 3);
}

#[test]
fn single_tube_variants_force_tube_zero() {
    for variant in [
        GeometryVariant::HallA,
        GeometryVariant::HallAWithoutGe,
        GeometryVariant::HallAOnlyWlsr,
        GeometryVariant::BaselineLargeReentranceTube,
        GeometryVariant::BaselineLargeReentranceTube4mCryo,
    ] {
        let classifier = GeometryClassifier::new(variant, DEFAULT_DETECTORS_PER_TUBE);
        assert_eq!(classifier.reentrance_tube(-7.0, 1.0), 0, "{variant}");
    }
}

#[test]
fn large_tube_uses_plain_copy_number() {
    let classifier = GeometryClassifier::new(GeometryVariant::BaselineLargeReentranceTube, 96);
    let placement = classifier.classify(Vec3::new(-10.0, 0.0, 0.0), 150);
    assert_eq!(placement.tube, 0);
    assert_eq!(placement.detector, 150);
}

#[test]
fn geometry_names_round_trip_and_unknown_is_fatal() {
    for variant in GeometryVariant::ALL {
        assert_eq!(GeometryVariant::from_name(variant.as_str()), Ok(variant));
    }
    let parsed: GeometryVariant = "hallA_only_WLSR".parse().unwrap();
    assert_eq!(parsed, GeometryVariant::HallAOnlyWlsr);
    assert_eq!(
        GeometryVariant::from_name("moon_base"),
        Err(GeometryError::UnknownGeometry("moon_base".into()))
    );
}

#[test]
fn volume_table_and_regions() {
    assert_eq!(volume_id("Cavern_log"), Ok(0));
    assert_eq!(volume_id("Ge_log"), Ok(12));
    assert_eq!(volume_id("Membrane_log"), Ok(14));
    assert!(matches!(
        volume_id("Nowhere_log"),
        Err(GeometryError::UnknownVolume(name)) if name == "Nowhere_log"
    ));

    assert_eq!(Region::from_volume("Ge_phys"), Region::Germanium);
    assert_eq!(Region::from_volume("Lar_phys"), Region::LiquidArgon);
    assert_eq!(Region::from_volume("ULar_phys"), Region::UndergroundArgon);
    assert_eq!(Region::from_volume("Water_phys"), Region::Water);
    assert_eq!(Region::from_volume("Copper_phys"), Region::Other);
    assert!(Region::UndergroundArgon.is_argon());
    assert!(!Region::Water.is_argon());
}
