//! Per-event aggregation state machine.
//!
//! An [`EventAggregator`] is either idle or accumulating one event. Every
//! per-event container is reset when an event begins; the row is assembled
//! and handed out when it ends.

use crate::capture::{capture_record, is_capture_process, CaptureKind, CaptureLog};
use crate::config::SimulationConfig;
use crate::error::PipelineError;
use crate::geometry::{GeometryClassifier, Region};
use crate::hits::{CrystalSensitiveDetector, HitCollections, CRYSTAL_HITS_COLLECTION};
use crate::neutron::{
    is_argon_crossing, NeutronColumns, NeutronProductionRecord, NeutronTracker, RunCounters,
};
use crate::provenance::{ProvenanceSet, ProvenanceTracker};
use crate::row::{
    Deposit, DepositColumns, EventRow, GammaEmissionColumns, SiblingDepositColumns, WaterEnergy,
};
use crate::trajectory::filter_trajectories;
use crate::transport::{EventEnd, StepRecord, TrackEnd, TrackStart};
use crate::units::to_ev;
use crate::windows::{TimeWindow, TubeEnergyColumns, WindowAccumulator};
use std::sync::Arc;

/// Process names the engine reports for radioactive decay.
const DECAY_PROCESSES: [&str; 2] = ["RadioactiveDecay", "Radioactivation"];

fn is_decay_process(name: &str) -> bool {
    DECAY_PROCESSES.iter().any(|known| name.contains(known))
}

/// Worker-owned aggregation state for one event at a time.
#[derive(Debug)]
pub struct EventAggregator {
    config: Arc<SimulationConfig>,
    counters: Arc<RunCounters>,
    classifier: GeometryClassifier,
    collections: HitCollections,
    crystal_collection: Option<usize>,
    detector: CrystalSensitiveDetector,
    current: Option<i64>,
    ge: WindowAccumulator,
    ge_without_gd: WindowAccumulator,
    ge_only_gd: WindowAccumulator,
    lar: TubeEnergyColumns,
    water: WaterEnergy,
    provenance: ProvenanceTracker,
    captures: CaptureLog,
    neutrons: NeutronTracker,
    ge77_neutrons: NeutronColumns,
    deposits: DepositColumns,
    ge77_sibling_deposits: SiblingDepositColumns,
    gd_sibling_deposits: SiblingDepositColumns,
    ge77m_gammas: GammaEmissionColumns,
    production: Vec<NeutronProductionRecord>,
    n_ge77: u32,
    is_metastable: bool,
    is_internal_conversion: bool,
    row: EventRow,
}

impl EventAggregator {
    /// Creates an aggregator with the crystal hit collection registered.
    pub fn new(config: Arc<SimulationConfig>, counters: Arc<RunCounters>) -> Self {
        let mut collections = HitCollections::new();
        collections.register(CRYSTAL_HITS_COLLECTION);
        Self::with_collections(config, counters, collections)
    }

    /// Creates an aggregator over externally registered hit collections.
    pub fn with_collections(
        config: Arc<SimulationConfig>,
        counters: Arc<RunCounters>,
        collections: HitCollections,
    ) -> Self {
        let classifier = GeometryClassifier::new(config.geometry, config.detectors_per_tube);
        let provenance = ProvenanceTracker::new(
            config.ge77_sibling_retention,
            config.gd_sibling_retention,
        );
        let mut aggregator = Self {
            counters,
            classifier,
            collections,
            crystal_collection: None,
            detector: CrystalSensitiveDetector::new(classifier),
            current: None,
            ge: WindowAccumulator::new(),
            ge_without_gd: WindowAccumulator::new(),
            ge_only_gd: WindowAccumulator::new(),
            lar: TubeEnergyColumns::default(),
            water: WaterEnergy::default(),
            provenance,
            captures: CaptureLog::default(),
            neutrons: NeutronTracker::default(),
            ge77_neutrons: NeutronColumns::default(),
            deposits: DepositColumns::default(),
            ge77_sibling_deposits: SiblingDepositColumns::default(),
            gd_sibling_deposits: SiblingDepositColumns::default(),
            ge77m_gammas: GammaEmissionColumns::default(),
            production: Vec::new(),
            n_ge77: 0,
            is_metastable: false,
            is_internal_conversion: false,
            row: EventRow::default(),
            config,
        };
        aggregator.reset();
        aggregator
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn classifier(&self) -> &GeometryClassifier {
        &self.classifier
    }

    /// ID of the event currently accumulating.
    pub fn current_event(&self) -> Option<i64> {
        self.current
    }

    pub fn is_accumulating(&self) -> bool {
        self.current.is_some()
    }

    /// Clears every per-event container. Calling it twice is the same as once.
    pub fn reset(&mut self) {
        let tube_count = self.config.tube_count;
        self.collections.clear();
        self.ge.clear();
        self.ge_without_gd.clear();
        self.ge_only_gd.clear();
        self.lar.reset(tube_count);
        self.water = WaterEnergy::default();
        self.provenance.clear();
        self.captures.clear();
        self.neutrons.clear();
        self.ge77_neutrons.clear();
        self.deposits.clear();
        self.ge77_sibling_deposits.clear();
        self.gd_sibling_deposits.clear();
        self.ge77m_gammas.clear();
        self.production.clear();
        self.n_ge77 = 0;
        self.is_metastable = false;
        self.is_internal_conversion = false;
        self.row.reset(tube_count);
    }

    /// Whether every per-event container is in its reset state.
    pub fn is_clean(&self) -> bool {
        let tube_count = self.config.tube_count;
        let mut empty_row = EventRow::default();
        empty_row.reset(tube_count);
        let mut empty_lar = TubeEnergyColumns::default();
        empty_lar.reset(tube_count);
        let hits_empty = self
            .crystal_collection
            .or_else(|| self.collections.collection_id(CRYSTAL_HITS_COLLECTION))
            .and_then(|id| self.collections.get(id))
            .map_or(true, |store| store.is_empty());
        hits_empty
            && self.ge.is_empty()
            && self.ge_without_gd.is_empty()
            && self.ge_only_gd.is_empty()
            && self.lar == empty_lar
            && self.water == WaterEnergy::default()
            && self.provenance.is_empty()
            && self.captures.is_empty()
            && self.neutrons.is_empty()
            && self.ge77_neutrons.is_empty()
            && self.deposits.is_empty()
            && self.ge77_sibling_deposits.is_empty()
            && self.gd_sibling_deposits.is_empty()
            && self.ge77m_gammas.is_empty()
            && self.production.is_empty()
            && self.n_ge77 == 0
            && !self.is_metastable
            && !self.is_internal_conversion
            && self.row == empty_row
    }

    /// Enters the accumulating state for `event_id`.
    pub fn begin_event(&mut self, event_id: i64) -> Result<(), PipelineError> {
        if let Some(open) = self.current {
            return Err(PipelineError::EventAlreadyOpen { open });
        }
        self.reset();
        self.current = Some(event_id);
        Ok(())
    }

    /// Drops the in-flight event without emitting anything.
    pub fn abort_event(&mut self) {
        self.current = None;
        self.reset();
    }

    fn open_event(&self) -> Result<i64, PipelineError> {
        self.current.ok_or(PipelineError::EventNotOpen)
    }

    fn resolve_collection(&mut self) -> Result<usize, PipelineError> {
        if let Some(id) = self.crystal_collection {
            return Ok(id);
        }
        let id = self
            .collections
            .collection_id(CRYSTAL_HITS_COLLECTION)
            .ok_or_else(|| {
                PipelineError::MissingHitCollection(CRYSTAL_HITS_COLLECTION.to_string())
            })?;
        self.crystal_collection = Some(id);
        Ok(id)
    }

    pub fn on_track_start(&mut self, track: &TrackStart) -> Result<(), PipelineError> {
        let event_id = self.open_event()?;
        self.provenance
            .on_track_start(track.track_id, track.parent_id);
        if let Some(origin) = self.neutrons.on_track_start(track) {
            if origin.region.is_argon() {
                self.counters.record_neutron_in_argon();
                if self.config.outputs.write_neutron_production_info {
                    self.production
                        .push(NeutronProductionRecord::from_origin(event_id, &origin));
                }
            }
        }
        Ok(())
    }

    pub fn on_step(&mut self, step: &StepRecord) -> Result<(), PipelineError> {
        self.open_event()?;
        self.neutrons.on_step(step);
        if is_argon_crossing(step) {
            self.counters.record_crossing();
        }
        if step.energy_deposit == 0.0 {
            return Ok(());
        }

        let region = Region::from_volume(&step.pre_volume);
        if region == Region::Germanium && step.species.is_ge77() {
            let id = self.resolve_collection()?;
            let store = self.collections.get_mut(id).ok_or_else(|| {
                PipelineError::MissingHitCollection(CRYSTAL_HITS_COLLECTION.to_string())
            })?;
            self.detector.process_step(step, store);
        }

        let window = TimeWindow::classify(step.global_time);
        if window == TimeWindow::AfterDelayed
            && !self.config.outputs.allow_long_time_emission_readout
        {
            self.counters.record_dropped_deposit();
            return Ok(());
        }

        let energy = to_ev(step.energy_deposit);
        let position = step.post_position;
        let gd_sibling = self.provenance.is_gd_sibling(step.track_id);
        let (tube, detector) = match region {
            Region::Germanium => {
                let placement = self.classifier.classify(position, step.copy_number);
                self.ge.add_to(window, placement.detector, energy);
                if self.config.outputs.write_advanced_multiplicity {
                    if gd_sibling {
                        self.ge_only_gd.add_to(window, placement.detector, energy);
                    } else {
                        self.ge_without_gd.add_to(window, placement.detector, energy);
                    }
                }
                (placement.tube, placement.detector)
            }
            Region::LiquidArgon | Region::UndergroundArgon => {
                let tube = self.classifier.reentrance_tube(position.x, position.y);
                self.lar.add(window, tube as usize, energy);
                (tube, -1)
            }
            Region::Water => {
                self.water.add(window, energy);
                (0, -1)
            }
            Region::Other => (0, -1),
        };

        let deposit = Deposit {
            time: step.global_time,
            region,
            edep: step.energy_deposit,
            position,
            tube,
            track_id: step.track_id,
            pdg: step.species.pdg,
            detector,
        };
        let outputs = self.config.outputs;
        if outputs.individual_deposition_info
            && (region == Region::Germanium || region.is_argon())
        {
            self.deposits.push(&deposit);
        }
        if outputs.individual_ge_deposition_info && self.provenance.is_ge77_sibling(step.track_id)
        {
            self.ge77_sibling_deposits.push(&deposit);
        }
        if outputs.individual_gd_deposition_info && gd_sibling {
            self.gd_sibling_deposits.push(&deposit);
        }
        Ok(())
    }

    pub fn on_track_end(&mut self, track: &TrackEnd) -> Result<(), PipelineError> {
        self.open_event()?;
        self.provenance
            .on_track_end(track.track_id, &track.secondaries);

        if track.species.is_neutron()
            && is_capture_process(&track.process, &self.config.capture_process_names)
        {
            self.record_capture(track);
        }

        if self.provenance.contains(ProvenanceSet::Ge77, track.track_id)
            && track.species.is_ge77()
            && track.species.is_excited()
            && is_decay_process(&track.process)
        {
            self.record_isomeric_transition(track);
        }
        Ok(())
    }

    fn record_capture(&mut self, track: &TrackEnd) {
        let record = capture_record(track);
        match record.kind {
            CaptureKind::Ge77 => {
                self.n_ge77 += 1;
                if let Some(origin) = self.neutrons.origin(track.track_id) {
                    let radius = self
                        .neutrons
                        .most_outer_radius(track.track_id)
                        .unwrap_or_else(|| origin.position.transverse());
                    self.ge77_neutrons.push(origin, radius);
                }
                if let Some(product) = record.product_track_id {
                    self.provenance.mark(ProvenanceSet::Ge77, product);
                }
                self.provenance.mark_all(ProvenanceSet::Ge77Sibling, &track.secondaries);
                if record.excitation_energy > 0.0 {
                    self.is_metastable = true;
                }
            }
            CaptureKind::Gadolinium => {
                self.provenance.mark_all(ProvenanceSet::GdSibling, &track.secondaries);
            }
            CaptureKind::Argon | CaptureKind::Other => {}
        }
        self.captures.push(record);
    }

    /// Ge-77m decaying into ground-state Ge-77.
    fn record_isomeric_transition(&mut self, track: &TrackEnd) {
        let Some(ground) = track
            .secondaries
            .iter()
            .find(|s| s.species.is_ge77() && !s.species.is_excited())
        else {
            return;
        };
        self.provenance.mark(ProvenanceSet::Ge77, ground.track_id);
        for secondary in &track.secondaries {
            if secondary.species.is_gamma() {
                self.ge77m_gammas.push(
                    secondary.global_time,
                    secondary.position,
                    secondary.kinetic_energy,
                    secondary.track_id,
                    track.track_id,
                );
            } else if secondary.species.is_electron() {
                self.is_internal_conversion = true;
            }
        }
    }

    /// Closes the event. Returns the assembled row, or `None` when the event
    /// produced no germanium hits and only such events are kept.
    pub fn end_event(&mut self, event: &EventEnd) -> Result<Option<&EventRow>, PipelineError> {
        let event_id = self.open_event()?;
        self.current = None;
        let collection = self.resolve_collection()?;
        let store = self.collections.get(collection).ok_or_else(|| {
            PipelineError::MissingHitCollection(CRYSTAL_HITS_COLLECTION.to_string())
        })?;

        let tube_count = self.config.tube_count;
        let row = &mut self.row;
        row.reset(tube_count);
        row.event_id = event_id;
        row.n_ge77 = self.n_ge77;
        row.neutrons_produced = self.neutrons.produced();

        if store.is_empty() && !self.config.save_all_events {
            return Ok(None);
        }

        store.finalize(&mut row.hits);

        let classifier = self.classifier;
        let tube_of = |element_id: i32| classifier.element_tube(element_id);
        let thresholds = &self.config.thresholds;
        self.ge.reduce(&thresholds.germanium, tube_of, &mut row.ge);
        if self.config.outputs.write_advanced_multiplicity {
            self.ge_without_gd
                .reduce(&thresholds.without_gd, tube_of, &mut row.ge_without_gd);
            self.ge_only_gd
                .reduce(&thresholds.only_gd, tube_of, &mut row.ge_only_gd);
        }

        row.muon_veto = self.water.prompt > self.config.muon_veto_threshold_ev;
        row.water_energy = self.water;
        row.lar_energy.clone_from(&self.lar);
        row.is_metastable = self.is_metastable;
        row.is_internal_conversion = self.is_internal_conversion;
        row.neutron.clone_from(&self.ge77_neutrons);
        self.captures.fill(&mut row.captures);
        row.deposits.clone_from(&self.deposits);
        row.ge77_siblings.clone_from(&self.ge77_sibling_deposits);
        row.gd_siblings.clone_from(&self.gd_sibling_deposits);
        row.ge77m_gammas.clone_from(&self.ge77m_gammas);

        if !event.trajectories.is_empty() {
            filter_trajectories(&row.hits.track_id, &event.trajectories, &mut row.trajectories)?;
        }
        Ok(Some(&self.row))
    }

    /// Neutron production records of the last event, handed over to the run.
    pub fn take_production_records(&mut self) -> Vec<NeutronProductionRecord> {
        std::mem::take(&mut self.production)
    }

    pub fn provenance(&self) -> &ProvenanceTracker {
        &self.provenance
    }

    pub fn captures(&self) -> &CaptureLog {
        &self.captures
    }

    pub fn accumulator(&self) -> &WindowAccumulator {
        &self.ge
    }
}
