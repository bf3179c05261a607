use crate::config::SimulationConfig;
use crate::error::PipelineError;
use crate::logging::{LogScope, SharedLogger};
use crate::neutron::{NeutronProductionRecord, RunCounters};
use crate::row::EventRow;
use crate::sink::SharedSink;
use crate::worker::WorkerContext;
use serde::Serialize;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Suffix of the crossing/production counters file.
pub const CROSSING_SUFFIX: &str = "_NCrossing.txt";
/// Suffix of the per-neutron production dump.
pub const CREATION_POSITION_SUFFIX: &str = "_NCreationPosition.txt";

const MODULE: &str = "run";

/// Counters reported when a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunSummary {
    pub events_processed: u64,
    pub events_written: u64,
    pub crossing_neutrons: u64,
    pub neutrons_in_argon: u64,
    pub dropped_late_deposits: u64,
    pub production_records: usize,
}

/// Text file owned for the duration of a run; buffered contents are flushed
/// when the handle drops.
#[derive(Debug)]
struct AuxiliaryFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl AuxiliaryFile {
    fn create(path: PathBuf) -> Result<Self, PipelineError> {
        let file = File::create(&path).map_err(|source| PipelineError::Output {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    fn write_line(&mut self, line: &str) -> Result<(), PipelineError> {
        writeln!(self.writer, "{line}")
            .and_then(|_| self.writer.flush())
            .map_err(|source| PipelineError::Output {
                path: self.path.display().to_string(),
                source,
            })
    }
}

impl Drop for AuxiliaryFile {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Appends `suffix` to the file name of `base`.
pub fn auxiliary_path(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Owns everything shared by the workers of one run.
#[derive(Debug)]
pub struct RunAggregator {
    config: Arc<SimulationConfig>,
    sink: SharedSink,
    logger: SharedLogger,
    counters: Arc<RunCounters>,
    production: Arc<Mutex<Vec<NeutronProductionRecord>>>,
    output_base: PathBuf,
    crossing_file: Option<AuxiliaryFile>,
    creation_file: Option<AuxiliaryFile>,
}

impl RunAggregator {
    /// Declares the row schema on the sink; nothing is written before this.
    pub fn new(
        config: Arc<SimulationConfig>,
        sink: SharedSink,
        logger: SharedLogger,
        output_base: impl Into<PathBuf>,
    ) -> Result<Self, PipelineError> {
        sink.declare_columns(&EventRow::schema())?;
        Ok(Self {
            config,
            sink,
            logger,
            counters: Arc::new(RunCounters::default()),
            production: Arc::new(Mutex::new(Vec::new())),
            output_base: output_base.into(),
            crossing_file: None,
            creation_file: None,
        })
    }

    pub fn config(&self) -> &Arc<SimulationConfig> {
        &self.config
    }

    pub fn counters(&self) -> &Arc<RunCounters> {
        &self.counters
    }

    pub fn logger(&self) -> &SharedLogger {
        &self.logger
    }

    /// Resets run counters, opens the sink and truncates the enabled
    /// auxiliary outputs.
    pub fn begin_run(&mut self) -> Result<(), PipelineError> {
        self.counters.reset();
        self.sink.open()?;
        self.production
            .lock()
            .map_err(|_| PipelineError::Poisoned("production records"))?
            .clear();
        let outputs = self.config.outputs;
        self.crossing_file = if outputs.write_general_neutron_info {
            Some(AuxiliaryFile::create(auxiliary_path(
                &self.output_base,
                CROSSING_SUFFIX,
            ))?)
        } else {
            None
        };
        self.creation_file = if outputs.write_neutron_production_info {
            Some(AuxiliaryFile::create(auxiliary_path(
                &self.output_base,
                CREATION_POSITION_SUFFIX,
            ))?)
        } else {
            None
        };
        self.logger.info(
            LogScope::module(MODULE),
            &format!("run started with {} workers", self.config.workers),
        );
        Ok(())
    }

    /// Builds the context owned by worker `worker`.
    pub fn worker_context(&self, worker: usize) -> WorkerContext {
        WorkerContext::new(
            worker,
            self.config.clone(),
            self.counters.clone(),
            self.sink.clone(),
            self.logger.clone(),
            self.production.clone(),
        )
    }

    /// Closes the sink, reports the counters and writes the auxiliary files.
    /// The auxiliary handles are closed on return.
    pub fn end_run(&mut self) -> Result<RunSummary, PipelineError> {
        self.sink.close()?;
        let mut records = std::mem::take(
            &mut *self
                .production
                .lock()
                .map_err(|_| PipelineError::Poisoned("production records"))?,
        );
        records.sort_by_key(|record| record.event_id);
        let summary = RunSummary {
            events_processed: self.counters.events_processed(),
            events_written: self.counters.events_written(),
            crossing_neutrons: self.counters.crossing_neutrons(),
            neutrons_in_argon: self.counters.neutrons_in_argon(),
            dropped_late_deposits: self.counters.dropped_late_deposits(),
            production_records: records.len(),
        };
        let scope = LogScope::module(MODULE);
        self.logger.info(
            scope,
            &format!("NumberOfNeutronCrossings: {}", summary.crossing_neutrons),
        );
        self.logger.info(
            scope,
            &format!("TotalNumberOfNeutronInLAr: {}", summary.neutrons_in_argon),
        );
        self.logger.info(
            scope,
            &format!(
                "events processed {} written {}",
                summary.events_processed, summary.events_written
            ),
        );

        if let Some(mut file) = self.crossing_file.take() {
            file.write_line(&format!(
                "{} {}",
                summary.crossing_neutrons, summary.neutrons_in_argon
            ))?;
        }
        if let Some(mut file) = self.creation_file.take() {
            for record in &records {
                file.write_line(&record.to_string())?;
            }
        }
        Ok(summary)
    }
}
