use crate::transport::{Secondary, TrackEnd, Vec3};
use crate::units::{M, NS};
use serde::{Deserialize, Serialize};

/// Unbiased name of the neutron capture process.
pub const CAPTURE_PROCESS: &str = "nCapture";

const ARGON_Z: u32 = 18;
const GADOLINIUM_Z: u32 = 64;

/// Matches `name` against the capture process names, including the
/// `biasWrapper(<name>)` form the engine reports for biased processes.
pub fn is_capture_process(name: &str, accepted: &[String]) -> bool {
    let bare = name
        .strip_prefix("biasWrapper(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(name);
    accepted.iter().any(|known| known == bare)
}

/// Capture-target bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    Ge77,
    Argon,
    Gadolinium,
    Other,
}

impl CaptureKind {
    pub const ALL: [CaptureKind; 4] = [
        CaptureKind::Ge77,
        CaptureKind::Argon,
        CaptureKind::Gadolinium,
        CaptureKind::Other,
    ];
}

/// One logged capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureRecord {
    pub kind: CaptureKind,
    pub time: f64,
    pub position: Vec3,
    pub mass: u32,
    pub charge: u32,
    pub excitation_energy: f64,
    pub neutron_track_id: i32,
    /// Track ID of the nucleus that decided the bucket, when there was one.
    pub product_track_id: Option<i32>,
}

/// Picks the bucket for a set of capture secondaries. Ge-77 wins over argon
/// and gadolinium; everything else is "other" and keeps the first nucleus.
pub fn classify_capture(secondaries: &[Secondary]) -> (CaptureKind, Option<&Secondary>) {
    if let Some(product) = secondaries.iter().find(|s| s.species.is_ge77()) {
        return (CaptureKind::Ge77, Some(product));
    }
    if let Some(product) = secondaries.iter().find(|s| {
        s.species.atomic_number == ARGON_Z || s.species.atomic_number == GADOLINIUM_Z
    }) {
        let kind = if product.species.atomic_number == ARGON_Z {
            CaptureKind::Argon
        } else {
            CaptureKind::Gadolinium
        };
        return (kind, Some(product));
    }
    let nucleus = secondaries
        .iter()
        .find(|s| s.species.atomic_mass > 0)
        .or_else(|| secondaries.first());
    (CaptureKind::Other, nucleus)
}

/// Builds the record for a capture-terminated neutron track.
pub fn capture_record(track: &TrackEnd) -> CaptureRecord {
    let (kind, product) = classify_capture(&track.secondaries);
    let (mass, charge, excitation_energy) = product
        .map(|p| {
            (
                p.species.atomic_mass,
                p.species.atomic_number,
                p.species.excitation_energy,
            )
        })
        .unwrap_or((0, 0, 0.0));
    CaptureRecord {
        kind,
        time: track.global_time,
        position: track.position,
        mass,
        charge,
        excitation_energy,
        neutron_track_id: track.track_id,
        product_track_id: product.map(|p| p.track_id),
    }
}

/// Captures logged in the current event, in track-end order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureLog {
    records: Vec<CaptureRecord>,
}

impl CaptureLog {
    pub fn push(&mut self, record: CaptureRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[CaptureRecord] {
        &self.records
    }

    pub fn by_kind(&self, kind: CaptureKind) -> impl Iterator<Item = &CaptureRecord> + '_ {
        self.records.iter().filter(move |record| record.kind == kind)
    }

    pub fn count(&self, kind: CaptureKind) -> usize {
        self.by_kind(kind).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Writes every bucket into its output columns (ns, m).
    pub fn fill(&self, columns: &mut CaptureColumns) {
        columns.clear();
        for record in &self.records {
            let bucket = columns.bucket_mut(record.kind);
            bucket.time.push(record.time / NS);
            bucket.x.push(record.position.x / M);
            bucket.y.push(record.position.y / M);
            bucket.z.push(record.position.z / M);
            bucket.mass.push(record.mass as i32);
            bucket.charge.push(record.charge as i32);
        }
    }
}

/// Columns of one capture bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureBucketColumns {
    pub time: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub mass: Vec<i32>,
    pub charge: Vec<i32>,
}

impl CaptureBucketColumns {
    fn clear(&mut self) {
        self.time.clear();
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.mass.clear();
        self.charge.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureColumns {
    pub ge77: CaptureBucketColumns,
    pub argon: CaptureBucketColumns,
    pub gadolinium: CaptureBucketColumns,
    pub other: CaptureBucketColumns,
}

impl CaptureColumns {
    pub fn clear(&mut self) {
        for kind in CaptureKind::ALL {
            self.bucket_mut(kind).clear();
        }
    }

    pub fn bucket(&self, kind: CaptureKind) -> &CaptureBucketColumns {
        match kind {
            CaptureKind::Ge77 => &self.ge77,
            CaptureKind::Argon => &self.argon,
            CaptureKind::Gadolinium => &self.gadolinium,
            CaptureKind::Other => &self.other,
        }
    }

    fn bucket_mut(&mut self, kind: CaptureKind) -> &mut CaptureBucketColumns {
        match kind {
            CaptureKind::Ge77 => &mut self.ge77,
            CaptureKind::Argon => &mut self.argon,
            CaptureKind::Gadolinium => &mut self.gadolinium,
            CaptureKind::Other => &mut self.other,
        }
    }
}
