use crate::config::ConfigError;
use crate::geometry::GeometryError;
use crate::logging::LoggingError;
use crate::sink::SinkError;
use crate::transport::TransportError;
use thiserror::Error;

/// Run-aborting conditions raised by the aggregation pipeline.
///
/// None of these are retried: each one points at miswired collaborators or
/// exhausted input, and the run stops with a diagnostic.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("hit collection '{0}' is not registered")]
    MissingHitCollection(String),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("callback received outside of an open event")]
    EventNotOpen,
    #[error("event {open} is still open")]
    EventAlreadyOpen { open: i64 },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to write auxiliary output {path}: {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to spawn worker {worker}: {source}")]
    WorkerSpawn {
        worker: usize,
        source: std::io::Error,
    },
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}
