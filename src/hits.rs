use crate::geometry::GeometryClassifier;
use crate::transport::{StepRecord, Vec3};
use crate::units::{M, MEV, NS};
use serde::Serialize;

/// Name under which the crystal detector registers its hit collection.
pub const CRYSTAL_HITS_COLLECTION: &str = "CrystalHitsCollection";

/// Discrete energy deposit in a germanium volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub track_id: i32,
    pub time: f64,
    pub weight: f64,
    pub edep: f64,
    pub position: Vec3,
    pub tube: u32,
    pub detector: i32,
}

/// Append-only hit list for one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitStore {
    hits: Vec<Hit>,
}

impl HitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every hit of the previous event.
    pub fn clear(&mut self) {
        self.hits.clear();
    }

    pub fn add_hit(&mut self, hit: Hit) {
        self.hits.push(hit);
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Copies the hits into output columns (ns, MeV, m), one row per hit, in
    /// insertion order. Hits on the same track are not merged.
    pub fn finalize(&self, columns: &mut HitColumns) {
        columns.clear();
        for hit in &self.hits {
            columns.track_id.push(hit.track_id);
            columns.time.push(hit.time / NS);
            columns.weight.push(hit.weight);
            columns.edep.push(hit.edep / MEV);
            columns.x.push(hit.position.x / M);
            columns.y.push(hit.position.y / M);
            columns.z.push(hit.position.z / M);
            columns.tube.push(hit.tube as i32);
            columns.detector.push(hit.detector);
        }
    }
}

/// Per-hit output columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HitColumns {
    pub track_id: Vec<i32>,
    pub time: Vec<f64>,
    pub weight: Vec<f64>,
    pub edep: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub tube: Vec<i32>,
    pub detector: Vec<i32>,
}

impl HitColumns {
    pub fn clear(&mut self) {
        self.track_id.clear();
        self.time.clear();
        self.weight.clear();
        self.edep.clear();
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.tube.clear();
        self.detector.clear();
    }

    pub fn len(&self) -> usize {
        self.track_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track_id.is_empty()
    }
}

/// Sensitive detector attached to the germanium crystals.
#[derive(Debug, Clone)]
pub struct CrystalSensitiveDetector {
    classifier: GeometryClassifier,
}

impl CrystalSensitiveDetector {
    pub fn new(classifier: GeometryClassifier) -> Self {
        Self { classifier }
    }

    /// Scores a germanium step. Returns `true` when a hit was stored.
    ///
    /// Only Ge-77 tracks with a nonzero deposit produce hits. The tube is
    /// taken from the track position at the post-step point.
    pub fn process_step(&self, step: &StepRecord, store: &mut HitStore) -> bool {
        if step.energy_deposit == 0.0 {
            return false;
        }
        if !step.species.is_ge77() {
            return false;
        }
        let placement = self
            .classifier
            .classify(step.post_position, step.copy_number);
        store.add_hit(Hit {
            track_id: step.track_id,
            time: step.global_time,
            weight: step.weight,
            edep: step.energy_deposit,
            position: step.post_position,
            tube: placement.tube,
            detector: placement.detector,
        });
        true
    }
}

/// Named hit collections of one worker; IDs are registration indices.
#[derive(Debug, Clone, Default)]
pub struct HitCollections {
    entries: Vec<(String, HitStore)>,
}

impl HitCollections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a collection and returns its ID. Re-registering returns the existing ID.
    pub fn register(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        if let Some(id) = self.collection_id(&name) {
            return id;
        }
        self.entries.push((name, HitStore::new()));
        self.entries.len() - 1
    }

    pub fn collection_id(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(known, _)| known == name)
    }

    pub fn get(&self, id: usize) -> Option<&HitStore> {
        self.entries.get(id).map(|(_, store)| store)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut HitStore> {
        self.entries.get_mut(id).map(|(_, store)| store)
    }

    /// Clears every registered collection.
    pub fn clear(&mut self) {
        for (_, store) in &mut self.entries {
            store.clear();
        }
    }
}
