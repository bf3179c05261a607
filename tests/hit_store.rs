use legend_sim::{
    CrystalSensitiveDetector, GeometryClassifier, GeometryVariant, Hit, HitCollections,
    HitColumns, HitStore, Species, StepRecord, Vec3, CRYSTAL_HITS_COLLECTION,
};

fn hit(track_id: i32, edep: f64) -> Hit {
    Hit {
        track_id,
        time: 1500.0,
        weight: 0.25,
        edep,
        position: Vec3::new(100.0, 2500.0, -1000.0),
        tube: 1,
        detector: 97,
    }
}

fn ge_step(species: Species, edep: f64) -> StepRecord {
    StepRecord {
        track_id: 8,
        parent_id: 3,
        species,
        global_time: 42.0,
        energy_deposit: edep,
        weight: 1.0,
        pre_position: Vec3::new(0.0, 100.0, 0.0),
        post_position: Vec3::new(0.0, 120.0, 0.0),
        pre_volume: "Ge_phys".into(),
        post_volume: Some("Ge_phys".into()),
        copy_number: 5,
        process: "ionIoni".into(),
    }
}

#[test]
fn finalize_keeps_every_hit_in_order() {
    let mut store = HitStore::new();
    store.add_hit(hit(5, 0.5));
    store.add_hit(hit(5, 0.25));
    store.add_hit(hit(9, 1.0));

    let mut columns = HitColumns::default();
    store.finalize(&mut columns);
    assert_eq!(columns.track_id, vec![5, 5, 9]);
    assert_eq!(columns.tube, vec![1, 1, 1]);
    assert_eq!(columns.edep, vec![0.5, 0.25, 1.0]);
}

#[test]
fn finalize_converts_to_output_units() {
    let mut store = HitStore::new();
    store.add_hit(hit(1, 2.0));
    let mut columns = HitColumns::default();
    store.finalize(&mut columns);
    assert_eq!(columns.time, vec![1500.0]);
    assert_eq!(columns.x, vec![0.1]);
    assert_eq!(columns.y, vec![2.5]);
    assert_eq!(columns.z, vec![-1.0]);
    assert_eq!(columns.weight, vec![0.25]);
    assert_eq!(columns.detector, vec![97]);
}

#[test]
fn clear_empties_store_and_finalize_replaces_columns() {
    let mut store = HitStore::new();
    store.add_hit(hit(1, 2.0));
    let mut columns = HitColumns::default();
    store.finalize(&mut columns);
    store.clear();
    assert!(store.is_empty());
    store.finalize(&mut columns);
    assert!(columns.is_empty());
}

#[test]
fn sensitive_detector_scores_only_ge77_deposits() {
    let detector = CrystalSensitiveDetector::new(GeometryClassifier::new(
        GeometryVariant::Baseline,
        96,
    ));
    let mut store = HitStore::new();

    assert!(!detector.process_step(&ge_step(Species::ion(32, 77, 0.0), 0.0), &mut store));
    assert!(!detector.process_step(&ge_step(Species::electron(), 0.3), &mut store));
    assert!(detector.process_step(&ge_step(Species::ion(32, 77, 0.0), 0.3), &mut store));

    assert_eq!(store.len(), 1);
    let stored = store.hits()[0];
    assert_eq!(stored.track_id, 8);
    assert_eq!(stored.tube, 1);
    assert_eq!(stored.detector, 5 + 96);
    assert_eq!(stored.position, Vec3::new(0.0, 120.0, 0.0));
}

#[test]
fn collections_register_idempotently() {
    let mut collections = HitCollections::new();
    let id = collections.register(CRYSTAL_HITS_COLLECTION);
    assert_eq!(collections.register(CRYSTAL_HITS_COLLECTION), id);
    assert_eq!(collections.collection_id(CRYSTAL_HITS_COLLECTION), Some(id));
    assert_eq!(collections.collection_id("Other"), None);

    collections.get_mut(id).unwrap().add_hit(hit(3, 1.0));
    collections.clear();
    assert!(collections.get(id).unwrap().is_empty());
}
