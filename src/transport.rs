use crate::trajectory::Trajectory;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Lines};
use thiserror::Error;

/// PDG codes the pipeline branches on.
pub const PDG_NEUTRON: i32 = 2112;
pub const PDG_GAMMA: i32 = 22;
pub const PDG_ELECTRON: i32 = 11;

/// Cartesian vector in engine units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Distance from the cryostat axis.
    pub fn transverse(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

/// Particle species as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    pub pdg: i32,
    #[serde(default)]
    pub atomic_mass: u32,
    #[serde(default)]
    pub atomic_number: u32,
    /// Nuclear excitation energy; nonzero marks an isomeric state.
    #[serde(default)]
    pub excitation_energy: f64,
}

impl Species {
    pub fn neutron() -> Self {
        Self::particle("neutron", PDG_NEUTRON)
    }

    pub fn gamma() -> Self {
        Self::particle("gamma", PDG_GAMMA)
    }

    pub fn electron() -> Self {
        Self::particle("e-", PDG_ELECTRON)
    }

    pub fn particle(name: impl Into<String>, pdg: i32) -> Self {
        Self {
            name: name.into(),
            pdg,
            atomic_mass: 0,
            atomic_number: 0,
            excitation_energy: 0.0,
        }
    }

    /// Builds a nucleus using the engine's ion naming and PDG encoding.
    pub fn ion(atomic_number: u32, atomic_mass: u32, excitation_energy: f64) -> Self {
        let isomer = u32::from(excitation_energy > 0.0);
        let pdg = 1_000_000_000 + atomic_number * 10_000 + atomic_mass * 10 + isomer;
        Self {
            name: format!("Z{atomic_number}A{atomic_mass}"),
            pdg: pdg as i32,
            atomic_mass,
            atomic_number,
            excitation_energy,
        }
    }

    pub fn is_neutron(&self) -> bool {
        self.pdg == PDG_NEUTRON
    }

    pub fn is_gamma(&self) -> bool {
        self.pdg == PDG_GAMMA
    }

    pub fn is_electron(&self) -> bool {
        self.pdg == PDG_ELECTRON
    }

    pub fn is_nucleus(&self, atomic_number: u32, atomic_mass: u32) -> bool {
        self.atomic_number == atomic_number && self.atomic_mass == atomic_mass
    }

    pub fn is_ge77(&self) -> bool {
        self.is_nucleus(32, 77)
    }

    pub fn is_excited(&self) -> bool {
        self.excitation_energy > 0.0
    }
}

fn unit_weight() -> f64 {
    1.0
}

/// Payload of the per-step callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub track_id: i32,
    pub parent_id: i32,
    pub species: Species,
    /// Global time at the post-step point.
    pub global_time: f64,
    pub energy_deposit: f64,
    #[serde(default = "unit_weight")]
    pub weight: f64,
    pub pre_position: Vec3,
    pub post_position: Vec3,
    pub pre_volume: String,
    /// Absent when the step leaves the world.
    #[serde(default)]
    pub post_volume: Option<String>,
    /// Copy number of the mother volume one level up the touch path.
    #[serde(default)]
    pub copy_number: i32,
    #[serde(default)]
    pub process: String,
}

/// Payload of the pre-tracking callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackStart {
    pub track_id: i32,
    pub parent_id: i32,
    pub species: Species,
    /// PDG code of the parent track, zero for primaries.
    #[serde(default)]
    pub parent_pdg: i32,
    pub vertex_position: Vec3,
    pub vertex_momentum: Vec3,
    pub kinetic_energy: f64,
    pub global_time: f64,
    #[serde(default)]
    pub vertex_volume: String,
}

/// Secondary spawned in the final step of a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secondary {
    pub track_id: i32,
    pub species: Species,
    pub position: Vec3,
    #[serde(default)]
    pub momentum: Vec3,
    #[serde(default)]
    pub kinetic_energy: f64,
    pub global_time: f64,
}

/// Payload of the post-tracking callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEnd {
    pub track_id: i32,
    pub parent_id: i32,
    pub species: Species,
    /// Name of the process that limited the final step.
    pub process: String,
    pub global_time: f64,
    pub position: Vec3,
    #[serde(default)]
    pub secondaries: Vec<Secondary>,
}

/// Payload of the end-of-event callback.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventEnd {
    pub event_id: i64,
    #[serde(default)]
    pub trajectories: Vec<Trajectory>,
}

/// One engine callback, as recorded in a replay stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportCallback {
    BeginEvent { event_id: i64 },
    TrackStart(TrackStart),
    Step(StepRecord),
    TrackEnd(TrackEnd),
    EndEvent(EventEnd),
}

/// Callback interface implemented by per-worker pipeline contexts.
pub trait TransportObserver {
    type Error;

    fn on_event_begin(&mut self, event_id: i64) -> Result<(), Self::Error>;
    fn on_track_start(&mut self, track: &TrackStart) -> Result<(), Self::Error>;
    fn on_step(&mut self, step: &StepRecord) -> Result<(), Self::Error>;
    fn on_track_end(&mut self, track: &TrackEnd) -> Result<(), Self::Error>;
    fn on_event_end(&mut self, event: &EventEnd) -> Result<(), Self::Error>;
}

/// Routes one callback to the matching observer hook.
pub fn dispatch<O: TransportObserver>(
    observer: &mut O,
    callback: &TransportCallback,
) -> Result<(), O::Error> {
    match callback {
        TransportCallback::BeginEvent { event_id } => observer.on_event_begin(*event_id),
        TransportCallback::TrackStart(track) => observer.on_track_start(track),
        TransportCallback::Step(step) => observer.on_step(step),
        TransportCallback::TrackEnd(track) => observer.on_track_end(track),
        TransportCallback::EndEvent(event) => observer.on_event_end(event),
    }
}

/// Complete callback sequence of one event, `BeginEvent` through `EndEvent`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub event_id: i64,
    pub callbacks: Vec<TransportCallback>,
}

/// Errors raised while reading a recorded callback stream.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to read callback stream: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: invalid callback record: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("line {line}: callback outside of an open event")]
    OutsideEvent { line: usize },
    #[error("line {line}: event {event_id} begins before event {open} ended")]
    NestedEvent { line: usize, event_id: i64, open: i64 },
    #[error("callback source exhausted while event {event_id} was in flight")]
    SourceExhausted { event_id: i64 },
}

/// Streams whole events out of a JSON-lines callback stream.
///
/// Only the event being assembled is held in memory. An event still open
/// when the stream ends yields [`TransportError::SourceExhausted`] and is
/// never returned. The iterator is fused after the first error.
#[derive(Debug)]
pub struct EventReader<R> {
    lines: Lines<R>,
    line_no: usize,
    open: Option<RecordedEvent>,
    done: bool,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            open: None,
            done: false,
        }
    }

    /// Line number of the last line consumed.
    pub fn line(&self) -> usize {
        self.line_no
    }

    fn next_event(&mut self) -> Result<Option<RecordedEvent>, TransportError> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let callback: TransportCallback =
                serde_json::from_str(&line).map_err(|source| TransportError::Parse {
                    line: self.line_no,
                    source,
                })?;
            if let TransportCallback::BeginEvent { event_id } = callback {
                if let Some(current) = &self.open {
                    return Err(TransportError::NestedEvent {
                        line: self.line_no,
                        event_id,
                        open: current.event_id,
                    });
                }
                self.open = Some(RecordedEvent {
                    event_id,
                    callbacks: vec![callback],
                });
                continue;
            }
            let Some(current) = self.open.as_mut() else {
                return Err(TransportError::OutsideEvent { line: self.line_no });
            };
            let closes = matches!(callback, TransportCallback::EndEvent(_));
            current.callbacks.push(callback);
            if closes {
                return Ok(self.open.take());
            }
        }
        match self.open.take() {
            Some(current) => Err(TransportError::SourceExhausted {
                event_id: current.event_id,
            }),
            None => Ok(None),
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<RecordedEvent, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.next_event().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}

/// Reads a whole callback stream into memory.
pub fn read_events<R: BufRead>(reader: R) -> Result<Vec<RecordedEvent>, TransportError> {
    EventReader::new(reader).collect()
}
