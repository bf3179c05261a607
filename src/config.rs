use crate::capture::CAPTURE_PROCESS;
use crate::geometry::{GeometryVariant, DEFAULT_DETECTORS_PER_TUBE, DEFAULT_TUBE_COUNT};
use crate::logging::LogLevel;
use crate::provenance::SiblingRetention;
use crate::windows::{WindowThresholds, DEFAULT_GE_THRESHOLD_EV};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Water-tank energy (eV) above which the prompt window is vetoed as a muon.
pub const DEFAULT_MUON_VETO_THRESHOLD_EV: f64 = 120.0e6;
/// Default worker count.
pub const DEFAULT_WORKERS: usize = 4;
/// Complete events buffered between the reader and the workers.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 64;

/// Thresholds applied when reducing each energy class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionThresholds {
    /// All germanium deposits.
    pub germanium: WindowThresholds,
    /// Germanium deposits not descended from a gadolinium capture.
    pub without_gd: WindowThresholds,
    /// Germanium deposits descended from a gadolinium capture.
    pub only_gd: WindowThresholds,
}

impl Default for ReductionThresholds {
    fn default() -> Self {
        Self {
            germanium: WindowThresholds::uniform(DEFAULT_GE_THRESHOLD_EV),
            without_gd: WindowThresholds::unfiltered(),
            only_gd: WindowThresholds::unfiltered(),
        }
    }
}

/// Switches for optional outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFlags {
    /// Dump every neutron produced in the argon at end of run.
    pub write_neutron_production_info: bool,
    /// Write the crossing / production counters file.
    pub write_general_neutron_info: bool,
    /// Fill the with/without-gadolinium energy classes.
    pub write_advanced_multiplicity: bool,
    /// Record every germanium and argon deposit individually.
    pub individual_deposition_info: bool,
    /// Record deposits of Ge-77 siblings.
    pub individual_ge_deposition_info: bool,
    /// Record deposits of gadolinium-capture siblings.
    pub individual_gd_deposition_info: bool,
    /// Keep deposits later than one second instead of dropping them.
    pub allow_long_time_emission_readout: bool,
}

/// Static configuration of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub geometry: GeometryVariant,
    pub detectors_per_tube: i32,
    pub tube_count: usize,
    /// Write rows for events without Ge-77 hits.
    pub save_all_events: bool,
    pub thresholds: ReductionThresholds,
    pub muon_veto_threshold_ev: f64,
    pub ge77_sibling_retention: SiblingRetention,
    pub gd_sibling_retention: SiblingRetention,
    pub capture_process_names: Vec<String>,
    pub outputs: OutputFlags,
    pub workers: usize,
    pub event_queue_capacity: usize,
    pub log_level: LogLevel,
    /// Progress line every N events; zero disables it.
    pub progress_interval: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryVariant::default(),
            detectors_per_tube: DEFAULT_DETECTORS_PER_TUBE,
            tube_count: DEFAULT_TUBE_COUNT,
            save_all_events: false,
            thresholds: ReductionThresholds::default(),
            muon_veto_threshold_ev: DEFAULT_MUON_VETO_THRESHOLD_EV,
            ge77_sibling_retention: SiblingRetention::Persist,
            gd_sibling_retention: SiblingRetention::ReleaseOnTrackEnd,
            capture_process_names: vec![CAPTURE_PROCESS.to_string()],
            outputs: OutputFlags::default(),
            workers: DEFAULT_WORKERS,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            log_level: LogLevel::Info,
            progress_interval: 100,
        }
    }
}

impl SimulationConfig {
    /// Loads a YAML (`.yaml`/`.yml`) or JSON document and validates it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let payload = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let config = if is_yaml {
            Self::from_yaml(&payload)?
        } else {
            Self::from_json(&payload)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(payload: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(payload).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn from_json(payload: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(payload).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detectors_per_tube <= 0 {
            return Err(ConfigError::Invalid(
                "detectors_per_tube must be positive".into(),
            ));
        }
        if self.tube_count == 0 {
            return Err(ConfigError::Invalid("tube_count must be positive".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be positive".into()));
        }
        if self.event_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_queue_capacity must be positive".into(),
            ));
        }
        if self.capture_process_names.is_empty() {
            return Err(ConfigError::Invalid(
                "capture_process_names must name at least one process".into(),
            ));
        }
        let thresholds = [
            ("germanium", &self.thresholds.germanium),
            ("without_gd", &self.thresholds.without_gd),
            ("only_gd", &self.thresholds.only_gd),
        ];
        for (class, windows) in thresholds {
            if windows.iter().any(|value| value.is_nan() || value < 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "thresholds.{class} must be non-negative"
                )));
            }
        }
        if self.muon_veto_threshold_ev.is_nan() || self.muon_veto_threshold_ev < 0.0 {
            return Err(ConfigError::Invalid(
                "muon_veto_threshold_ev must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config document: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}
