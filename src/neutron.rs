use crate::geometry::Region;
use crate::transport::{StepRecord, TrackStart, Vec3};
use crate::units::{M, MEV, NS};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Neutron state captured at its own track start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeutronOrigin {
    pub track_id: i32,
    pub position: Vec3,
    pub momentum: Vec3,
    pub kinetic_energy: f64,
    pub time: f64,
    pub parent_pdg: i32,
    pub region: Region,
}

/// Per-event neutron state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeutronTracker {
    origins: HashMap<i32, NeutronOrigin>,
    outer_radius: HashMap<i32, f64>,
    produced: u32,
}

impl NeutronTracker {
    pub fn clear(&mut self) {
        self.origins.clear();
        self.outer_radius.clear();
        self.produced = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty() && self.outer_radius.is_empty() && self.produced == 0
    }

    /// Snapshots a neutron at its vertex. Returns the origin for non-primary
    /// and primary neutrons alike; other species return `None`.
    pub fn on_track_start(&mut self, track: &TrackStart) -> Option<NeutronOrigin> {
        if !track.species.is_neutron() {
            return None;
        }
        let origin = NeutronOrigin {
            track_id: track.track_id,
            position: track.vertex_position,
            momentum: track.vertex_momentum,
            kinetic_energy: track.kinetic_energy,
            time: track.global_time,
            parent_pdg: track.parent_pdg,
            region: Region::from_volume(&track.vertex_volume),
        };
        self.origins.insert(track.track_id, origin);
        self.outer_radius
            .insert(track.track_id, track.vertex_position.transverse());
        self.produced += 1;
        Some(origin)
    }

    /// Extends the maximum transverse radius reached by the stepping neutron.
    pub fn on_step(&mut self, step: &StepRecord) {
        if !step.species.is_neutron() {
            return;
        }
        let radius = step.post_position.transverse();
        let entry = self.outer_radius.entry(step.track_id).or_insert(radius);
        if radius > *entry {
            *entry = radius;
        }
    }

    pub fn origin(&self, track_id: i32) -> Option<&NeutronOrigin> {
        self.origins.get(&track_id)
    }

    pub fn most_outer_radius(&self, track_id: i32) -> Option<f64> {
        self.outer_radius.get(&track_id).copied()
    }

    /// Neutrons started in the current event.
    pub fn produced(&self) -> u32 {
        self.produced
    }
}

/// Whether a neutron step crosses from outside into the argon volume.
pub fn is_argon_crossing(step: &StepRecord) -> bool {
    if !step.species.is_neutron() {
        return false;
    }
    let Some(post) = step.post_volume.as_deref() else {
        return false;
    };
    !Region::from_volume(&step.pre_volume).is_argon() && Region::from_volume(post).is_argon()
}

/// Production kinematics of the neutron behind a Ge-77 capture (m, MeV, ns).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NeutronColumns {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub px: Vec<f64>,
    pub py: Vec<f64>,
    pub pz: Vec<f64>,
    pub ekin: Vec<f64>,
    pub time: Vec<f64>,
    pub most_outer_radius: Vec<f64>,
}

impl NeutronColumns {
    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.px.clear();
        self.py.clear();
        self.pz.clear();
        self.ekin.clear();
        self.time.clear();
        self.most_outer_radius.clear();
    }

    pub fn push(&mut self, origin: &NeutronOrigin, most_outer_radius: f64) {
        self.x.push(origin.position.x / M);
        self.y.push(origin.position.y / M);
        self.z.push(origin.position.z / M);
        self.px.push(origin.momentum.x / MEV);
        self.py.push(origin.momentum.y / MEV);
        self.pz.push(origin.momentum.z / MEV);
        self.ekin.push(origin.kinetic_energy / MEV);
        self.time.push(origin.time / NS);
        self.most_outer_radius.push(most_outer_radius / M);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Run-wide record of one neutron produced in the argon, dumped at end of run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NeutronProductionRecord {
    pub event_id: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub ekin: f64,
    pub parent_pdg: i32,
}

impl NeutronProductionRecord {
    pub fn from_origin(event_id: i64, origin: &NeutronOrigin) -> Self {
        Self {
            event_id,
            x: origin.position.x / M,
            y: origin.position.y / M,
            z: origin.position.z / M,
            px: origin.momentum.x / MEV,
            py: origin.momentum.y / MEV,
            pz: origin.momentum.z / MEV,
            ekin: origin.kinetic_energy / MEV,
            parent_pdg: origin.parent_pdg,
        }
    }
}

impl fmt::Display for NeutronProductionRecord {
    /// Space-separated text row: event, x, y, z, px, py, pz, ekin, parent PDG.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {} {}",
            self.event_id,
            self.x,
            self.y,
            self.z,
            self.px,
            self.py,
            self.pz,
            self.ekin,
            self.parent_pdg
        )
    }
}

/// Run-level counters shared by every worker.
#[derive(Debug, Default)]
pub struct RunCounters {
    crossing_neutrons: AtomicU64,
    neutrons_in_argon: AtomicU64,
    events_processed: AtomicU64,
    events_written: AtomicU64,
    dropped_late_deposits: AtomicU64,
}

impl RunCounters {
    pub fn reset(&self) {
        self.crossing_neutrons.store(0, Ordering::Relaxed);
        self.neutrons_in_argon.store(0, Ordering::Relaxed);
        self.events_processed.store(0, Ordering::Relaxed);
        self.events_written.store(0, Ordering::Relaxed);
        self.dropped_late_deposits.store(0, Ordering::Relaxed);
    }

    pub fn record_crossing(&self) {
        self.crossing_neutrons.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_neutron_in_argon(&self) {
        self.neutrons_in_argon.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event(&self, written: bool) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
        if written {
            self.events_written.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_dropped_deposit(&self) {
        self.dropped_late_deposits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn crossing_neutrons(&self) -> u64 {
        self.crossing_neutrons.load(Ordering::Relaxed)
    }

    pub fn neutrons_in_argon(&self) -> u64 {
        self.neutrons_in_argon.load(Ordering::Relaxed)
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    pub fn events_written(&self) -> u64 {
        self.events_written.load(Ordering::Relaxed)
    }

    pub fn dropped_late_deposits(&self) -> u64 {
        self.dropped_late_deposits.load(Ordering::Relaxed)
    }
}
