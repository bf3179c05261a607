use crate::capture::CaptureColumns;
use crate::geometry::Region;
use crate::hits::HitColumns;
use crate::neutron::NeutronColumns;
use crate::trajectory::TrajectoryColumns;
use crate::transport::Vec3;
use crate::units::{M, MEV, NS};
use crate::windows::{EnergyClassColumns, TimeWindow, TubeEnergyColumns};
use serde::Serialize;
use serde_json::{Map, Value};

/// Individual germanium/argon deposits.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DepositColumns {
    pub time: Vec<f64>,
    pub region: Vec<i32>,
    pub edep: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub tube: Vec<i32>,
    pub track_id: Vec<i32>,
    pub pdg: Vec<i32>,
    pub detector: Vec<i32>,
}

/// One deposit as seen by the stepping hook, in engine units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deposit {
    pub time: f64,
    pub region: Region,
    pub edep: f64,
    pub position: Vec3,
    pub tube: u32,
    pub track_id: i32,
    pub pdg: i32,
    pub detector: i32,
}

impl DepositColumns {
    pub fn clear(&mut self) {
        self.time.clear();
        self.region.clear();
        self.edep.clear();
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.tube.clear();
        self.track_id.clear();
        self.pdg.clear();
        self.detector.clear();
    }

    pub fn push(&mut self, deposit: &Deposit) {
        self.time.push(deposit.time / NS);
        self.region.push(deposit.region.code());
        self.edep.push(deposit.edep / MEV);
        self.x.push(deposit.position.x / M);
        self.y.push(deposit.position.y / M);
        self.z.push(deposit.position.z / M);
        self.tube.push(deposit.tube as i32);
        self.track_id.push(deposit.track_id);
        self.pdg.push(deposit.pdg);
        self.detector.push(deposit.detector);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Deposits of tracks belonging to a sibling set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiblingDepositColumns {
    pub time: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub edep: Vec<f64>,
    pub id: Vec<i32>,
    pub pdg: Vec<i32>,
    pub region: Vec<i32>,
}

impl SiblingDepositColumns {
    pub fn clear(&mut self) {
        self.time.clear();
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.edep.clear();
        self.id.clear();
        self.pdg.clear();
        self.region.clear();
    }

    pub fn push(&mut self, deposit: &Deposit) {
        self.time.push(deposit.time / NS);
        self.x.push(deposit.position.x / M);
        self.y.push(deposit.position.y / M);
        self.z.push(deposit.position.z / M);
        self.edep.push(deposit.edep / MEV);
        self.id.push(deposit.track_id);
        self.pdg.push(deposit.pdg);
        self.region.push(deposit.region.code());
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Gammas emitted by the Ge-77m isomeric transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GammaEmissionColumns {
    pub time: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub energy: Vec<f64>,
    pub id: Vec<i32>,
    /// Track ID of the decaying Ge-77m nucleus.
    pub ge77_track: Vec<i32>,
}

impl GammaEmissionColumns {
    pub fn clear(&mut self) {
        self.time.clear();
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.energy.clear();
        self.id.clear();
        self.ge77_track.clear();
    }

    pub fn push(&mut self, time: f64, position: Vec3, energy: f64, id: i32, ge77_track: i32) {
        self.time.push(time / NS);
        self.x.push(position.x / M);
        self.y.push(position.y / M);
        self.z.push(position.z / M);
        self.energy.push(energy / MEV);
        self.id.push(id);
        self.ge77_track.push(ge77_track);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Water-tank energy per window (eV).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WaterEnergy {
    pub prompt: f64,
    pub delayed: f64,
    pub delayed_long: f64,
    pub after_delayed: f64,
}

impl WaterEnergy {
    pub fn add(&mut self, window: TimeWindow, energy: f64) {
        match window {
            TimeWindow::Prompt => self.prompt += energy,
            TimeWindow::Delayed => self.delayed += energy,
            TimeWindow::DelayedLong => self.delayed_long += energy,
            TimeWindow::AfterDelayed => self.after_delayed += energy,
        }
    }

    pub fn get(&self, window: TimeWindow) -> f64 {
        match window {
            TimeWindow::Prompt => self.prompt,
            TimeWindow::Delayed => self.delayed,
            TimeWindow::DelayedLong => self.delayed_long,
            TimeWindow::AfterDelayed => self.after_delayed,
        }
    }
}

/// Flat per-event output row.
///
/// Workers reuse one row for every event, so each column is repopulated or
/// reset before the row is emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventRow {
    pub event_id: i64,
    /// Ge-77 productions in the event.
    pub n_ge77: u32,
    pub neutrons_produced: u32,
    pub muon_veto: bool,
    pub is_metastable: bool,
    pub is_internal_conversion: bool,
    pub hits: HitColumns,
    pub neutron: NeutronColumns,
    pub ge: EnergyClassColumns,
    pub ge_without_gd: EnergyClassColumns,
    pub ge_only_gd: EnergyClassColumns,
    pub lar_energy: TubeEnergyColumns,
    pub water_energy: WaterEnergy,
    pub captures: CaptureColumns,
    pub deposits: DepositColumns,
    pub ge77_siblings: SiblingDepositColumns,
    pub gd_siblings: SiblingDepositColumns,
    pub ge77m_gammas: GammaEmissionColumns,
    pub trajectories: TrajectoryColumns,
}

impl EventRow {
    /// Returns every column to its documented default; per-tube vectors are
    /// seeded with `tube_count` zeros.
    pub fn reset(&mut self, tube_count: usize) {
        self.event_id = 0;
        self.n_ge77 = 0;
        self.neutrons_produced = 0;
        self.muon_veto = false;
        self.is_metastable = false;
        self.is_internal_conversion = false;
        self.hits.clear();
        self.neutron.clear();
        self.ge.reset(tube_count);
        self.ge_without_gd.reset(tube_count);
        self.ge_only_gd.reset(tube_count);
        self.lar_energy.reset(tube_count);
        self.water_energy = WaterEnergy::default();
        self.captures.clear();
        self.deposits.clear();
        self.ge77_siblings.clear();
        self.gd_siblings.clear();
        self.ge77m_gammas.clear();
        self.trajectories.clear();
    }

    /// Dotted column names, in the order [`EventRow::flatten`] yields them.
    pub fn schema() -> Vec<String> {
        let mut columns = Vec::new();
        if let Ok(Value::Object(fields)) = serde_json::to_value(EventRow::default()) {
            collect_columns("", &fields, &mut columns);
        }
        columns
    }

    /// Flattens the row into `(column, value)` pairs matching [`EventRow::schema`].
    pub fn flatten(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut flat = Map::new();
        if let Value::Object(fields) = serde_json::to_value(self)? {
            flatten_into("", fields, &mut flat);
        }
        Ok(flat)
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn collect_columns(prefix: &str, fields: &Map<String, Value>, out: &mut Vec<String>) {
    for (key, value) in fields {
        let name = join(prefix, key);
        match value {
            Value::Object(inner) => collect_columns(&name, inner, out),
            _ => out.push(name),
        }
    }
}

fn flatten_into(prefix: &str, fields: Map<String, Value>, out: &mut Map<String, Value>) {
    for (key, value) in fields {
        let name = join(prefix, &key);
        match value {
            Value::Object(inner) => flatten_into(&name, inner, out),
            leaf => {
                out.insert(name, leaf);
            }
        }
    }
}
