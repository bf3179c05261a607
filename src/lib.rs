//! Event-level aggregation and provenance tracking for muon-induced Ge-77
//! production simulations.

pub mod app;
pub mod capture;
pub mod config;
pub mod error;
pub mod event;
pub mod geometry;
pub mod hits;
pub mod logging;
pub mod neutron;
pub mod provenance;
pub mod row;
pub mod run;
pub mod sink;
pub mod trajectory;
pub mod transport;
pub mod units;
pub mod windows;
pub mod worker;

pub use capture::{
    capture_record, classify_capture, is_capture_process, CaptureBucketColumns, CaptureColumns,
    CaptureKind, CaptureLog, CaptureRecord, CAPTURE_PROCESS,
};
pub use config::{
    ConfigError, OutputFlags, ReductionThresholds, SimulationConfig,
    DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_MUON_VETO_THRESHOLD_EV, DEFAULT_WORKERS,
};
pub use error::PipelineError;
pub use event::EventAggregator;
pub use geometry::{
    volume_id, GeometryClassifier, GeometryError, GeometryVariant, Placement, Region,
    DEFAULT_DETECTORS_PER_TUBE, DEFAULT_TUBE_COUNT,
};
pub use hits::{
    CrystalSensitiveDetector, Hit, HitCollections, HitColumns, HitStore, CRYSTAL_HITS_COLLECTION,
};
pub use logging::{
    JsonLineLogger, LogLevel, LogRotationPolicy, LogScope, LogSegment, LoggingError, SharedLogger,
};
pub use neutron::{
    is_argon_crossing, NeutronColumns, NeutronOrigin, NeutronProductionRecord, NeutronTracker,
    RunCounters,
};
pub use provenance::{ProvenanceSet, ProvenanceTracker, SiblingRetention, TrackSet};
pub use row::{
    Deposit, DepositColumns, EventRow, GammaEmissionColumns, SiblingDepositColumns, WaterEnergy,
};
pub use run::{
    auxiliary_path, RunAggregator, RunSummary, CREATION_POSITION_SUFFIX, CROSSING_SUFFIX,
};
pub use sink::{JsonLinesSink, MemorySink, RowSink, SharedSink, SinkError};
pub use trajectory::{
    back_trace, filter_trajectories, Trajectory, TrajectoryColumns, TrajectoryIndex,
};
pub use transport::{
    dispatch, read_events, EventEnd, EventReader, RecordedEvent, Secondary, Species, StepRecord,
    TrackEnd, TrackStart, TransportCallback, TransportError, TransportObserver, Vec3, PDG_ELECTRON,
    PDG_GAMMA, PDG_NEUTRON,
};
pub use windows::{
    DetectorEnergyMap, EnergyClassColumns, TimeWindow, TubeEnergyColumns, WindowAccumulator,
    WindowColumns, WindowThresholds, DEFAULT_GE_THRESHOLD_EV, DELAYED_END, DELAYED_LONG_END,
    PROMPT_END,
};
pub use worker::{run_events, run_stream, WorkerContext};
