use crate::row::EventRow;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Error surfaced when a sink cannot accept a row.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize row: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("row written before columns were declared")]
    Undeclared,
    #[error("row written while the sink is closed")]
    Closed,
    #[error("sink lock poisoned")]
    Poisoned,
}

/// Contract implemented by row storage backends.
///
/// The run opens the sink when it begins and closes it when it ends.
/// Backends without a physical target keep the default no-op lifecycle.
pub trait RowSink: Send {
    fn declare_columns(&mut self, columns: &[String]) -> Result<(), SinkError>;
    fn write_row(&mut self, row: &EventRow) -> Result<(), SinkError>;
    fn flush(&mut self) -> Result<(), SinkError>;

    fn open(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.flush()
    }
}

#[derive(serde::Serialize)]
struct Header<'a> {
    columns: &'a [String],
}

/// JSON-lines file: a header object naming the columns, then one flat
/// object per row keyed by dotted column name.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    columns: Option<Vec<String>>,
    rows: u64,
}

impl JsonLinesSink {
    /// Targets `path` without touching the filesystem until [`RowSink::open`].
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
            columns: None,
            rows: 0,
        }
    }

    /// Creates (or truncates) the output file right away.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let mut sink = Self::new(path);
        sink.open()?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn write_header(writer: &mut BufWriter<File>, columns: &[String]) -> Result<(), SinkError> {
        serde_json::to_writer(&mut *writer, &Header { columns })?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl RowSink for JsonLinesSink {
    fn declare_columns(&mut self, columns: &[String]) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.as_mut() {
            Self::write_header(writer, columns)?;
        }
        self.columns = Some(columns.to_vec());
        Ok(())
    }

    fn write_row(&mut self, row: &EventRow) -> Result<(), SinkError> {
        if self.columns.is_none() {
            return Err(SinkError::Undeclared);
        }
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        let flat = row.flatten()?;
        serde_json::to_writer(&mut *writer, &flat)?;
        writer.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Creates (or truncates) the file and writes the header if the columns
    /// are already known.
    fn open(&mut self) -> Result<(), SinkError> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        if let Some(columns) = &self.columns {
            Self::write_header(&mut writer, columns)?;
        }
        self.writer = Some(writer);
        self.rows = 0;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Rows captured in memory, inspectable through a cloned handle.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryRows>>,
}

#[derive(Debug, Default)]
struct MemoryRows {
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
    flushes: u64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|rows| rows.columns.clone())
            .unwrap_or_default()
    }

    /// Flattened rows in write order.
    pub fn rows(&self) -> Vec<Map<String, Value>> {
        self.inner
            .lock()
            .map(|rows| rows.rows.clone())
            .unwrap_or_default()
    }

    pub fn flushes(&self) -> u64 {
        self.inner.lock().map(|rows| rows.flushes).unwrap_or(0)
    }
}

impl RowSink for MemorySink {
    fn declare_columns(&mut self, columns: &[String]) -> Result<(), SinkError> {
        let mut inner = self.inner.lock().map_err(|_| SinkError::Poisoned)?;
        inner.columns = columns.to_vec();
        Ok(())
    }

    fn write_row(&mut self, row: &EventRow) -> Result<(), SinkError> {
        let mut inner = self.inner.lock().map_err(|_| SinkError::Poisoned)?;
        if inner.columns.is_empty() {
            return Err(SinkError::Undeclared);
        }
        inner.rows.push(row.flatten()?);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let mut inner = self.inner.lock().map_err(|_| SinkError::Poisoned)?;
        inner.flushes += 1;
        Ok(())
    }
}

/// Lock-protected sink shared by all workers of a run.
#[derive(Clone)]
pub struct SharedSink {
    inner: Arc<Mutex<Box<dyn RowSink>>>,
}

impl SharedSink {
    pub fn new(sink: impl RowSink + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    pub fn declare_columns(&self, columns: &[String]) -> Result<(), SinkError> {
        self.inner
            .lock()
            .map_err(|_| SinkError::Poisoned)?
            .declare_columns(columns)
    }

    pub fn write_row(&self, row: &EventRow) -> Result<(), SinkError> {
        self.inner
            .lock()
            .map_err(|_| SinkError::Poisoned)?
            .write_row(row)
    }

    pub fn flush(&self) -> Result<(), SinkError> {
        self.inner.lock().map_err(|_| SinkError::Poisoned)?.flush()
    }

    pub fn open(&self) -> Result<(), SinkError> {
        self.inner.lock().map_err(|_| SinkError::Poisoned)?.open()
    }

    pub fn close(&self) -> Result<(), SinkError> {
        self.inner.lock().map_err(|_| SinkError::Poisoned)?.close()
    }
}

impl std::fmt::Debug for SharedSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSink").finish_non_exhaustive()
    }
}
