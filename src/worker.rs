//! Worker contexts and the event-replay pool.
//!
//! Each worker thread owns one [`WorkerContext`] for its whole lifetime and
//! processes one event at a time to completion. Complete events reach the
//! workers through a bounded queue fed by the reading thread. Workers share
//! only the sink, the logger, the run counters and the production-record list.

use crate::config::SimulationConfig;
use crate::error::PipelineError;
use crate::event::EventAggregator;
use crate::logging::{LogScope, SharedLogger};
use crate::neutron::{NeutronProductionRecord, RunCounters};
use crate::run::RunAggregator;
use crate::sink::SharedSink;
use crate::transport::{
    dispatch, EventEnd, RecordedEvent, StepRecord, TrackEnd, TrackStart, TransportError,
    TransportObserver,
};
use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const MODULE: &str = "worker";

/// Per-thread pipeline state bridged to the transport callbacks.
#[derive(Debug)]
pub struct WorkerContext {
    worker: usize,
    aggregator: EventAggregator,
    counters: Arc<RunCounters>,
    sink: SharedSink,
    logger: SharedLogger,
    production: Arc<Mutex<Vec<NeutronProductionRecord>>>,
    progress_interval: u64,
}

impl WorkerContext {
    pub fn new(
        worker: usize,
        config: Arc<SimulationConfig>,
        counters: Arc<RunCounters>,
        sink: SharedSink,
        logger: SharedLogger,
        production: Arc<Mutex<Vec<NeutronProductionRecord>>>,
    ) -> Self {
        let progress_interval = config.progress_interval;
        Self {
            worker,
            aggregator: EventAggregator::new(config, counters.clone()),
            counters,
            sink,
            logger,
            production,
            progress_interval,
        }
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn aggregator(&self) -> &EventAggregator {
        &self.aggregator
    }

    /// Replays one recorded event. A failure discards the in-flight event.
    pub fn replay(&mut self, event: &RecordedEvent) -> Result<(), PipelineError> {
        for callback in &event.callbacks {
            if let Err(err) = dispatch(self, callback) {
                self.aggregator.abort_event();
                self.logger.error(
                    LogScope::module(MODULE)
                        .worker(self.worker)
                        .event(event.event_id),
                    &err.to_string(),
                );
                return Err(err);
            }
        }
        Ok(())
    }
}

impl TransportObserver for WorkerContext {
    type Error = PipelineError;

    fn on_event_begin(&mut self, event_id: i64) -> Result<(), PipelineError> {
        if self.progress_interval > 0 && event_id % self.progress_interval as i64 == 0 {
            self.logger.info(
                LogScope::module(MODULE).worker(self.worker).event(event_id),
                &format!("Event: {event_id}"),
            );
        }
        self.aggregator.begin_event(event_id)
    }

    fn on_track_start(&mut self, track: &TrackStart) -> Result<(), PipelineError> {
        self.aggregator.on_track_start(track)
    }

    fn on_step(&mut self, step: &StepRecord) -> Result<(), PipelineError> {
        self.aggregator.on_step(step)
    }

    fn on_track_end(&mut self, track: &TrackEnd) -> Result<(), PipelineError> {
        self.aggregator.on_track_end(track)
    }

    fn on_event_end(&mut self, event: &EventEnd) -> Result<(), PipelineError> {
        let written = match self.aggregator.end_event(event)? {
            Some(row) => {
                self.sink.write_row(row)?;
                true
            }
            None => false,
        };
        self.counters.record_event(written);
        let records = self.aggregator.take_production_records();
        if !records.is_empty() {
            self.production
                .lock()
                .map_err(|_| PipelineError::Poisoned("production records"))?
                .extend(records);
        }
        Ok(())
    }
}

/// Sleep between polls of an empty or saturated queue.
const QUEUE_POLL: Duration = Duration::from_micros(200);

/// Replays an in-memory batch of events.
pub fn run_events(
    run: &RunAggregator,
    events: &[RecordedEvent],
    workers: usize,
) -> Result<(), PipelineError> {
    let capacity = events.len().max(1);
    let source = events.iter().cloned().map(Ok::<_, TransportError>);
    run_stream(run, source, workers, capacity)
}

/// Feeds events from `source` through a bounded queue to `workers` threads.
///
/// The calling thread reads; at most `capacity` complete events wait in the
/// queue. A worker failure stops every worker from taking further events and
/// is returned. A source failure lets the workers drain the events already
/// queued, then surfaces as [`PipelineError::Transport`]. Rows already written
/// stay written.
pub fn run_stream<I>(
    run: &RunAggregator,
    source: I,
    workers: usize,
    capacity: usize,
) -> Result<(), PipelineError>
where
    I: IntoIterator<Item = Result<RecordedEvent, TransportError>>,
{
    let workers = workers.max(1);
    let queue = ArrayQueue::new(capacity.max(1));
    let stop = AtomicBool::new(false);
    let source_done = AtomicBool::new(false);

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let mut context = run.worker_context(worker);
            let queue = &queue;
            let stop = &stop;
            let source_done = &source_done;
            let handle = thread::Builder::new()
                .name(format!("legend_sim_worker_{worker}"))
                .spawn_scoped(scope, move || -> Result<(), PipelineError> {
                    while !stop.load(Ordering::Acquire) {
                        let Some(event) = queue.pop() else {
                            if source_done.load(Ordering::Acquire) && queue.is_empty() {
                                break;
                            }
                            thread::sleep(QUEUE_POLL);
                            continue;
                        };
                        if let Err(err) = context.replay(&event) {
                            stop.store(true, Ordering::Release);
                            return Err(err);
                        }
                    }
                    Ok(())
                })
                .map_err(|source| PipelineError::WorkerSpawn { worker, source });
            match handle {
                Ok(handle) => handles.push((worker, handle)),
                Err(err) => {
                    stop.store(true, Ordering::Release);
                    return Err(err);
                }
            }
        }

        let mut source_error = None;
        'read: for item in source {
            let mut event = match item {
                Ok(event) => event,
                Err(err) => {
                    source_error = Some(err);
                    break;
                }
            };
            loop {
                if stop.load(Ordering::Acquire)
                    || handles.iter().all(|(_, handle)| handle.is_finished())
                {
                    break 'read;
                }
                match queue.push(event) {
                    Ok(()) => break,
                    Err(rejected) => {
                        event = rejected;
                        thread::sleep(QUEUE_POLL);
                    }
                }
            }
        }
        source_done.store(true, Ordering::Release);

        let mut first_error = None;
        for (worker, handle) in handles {
            let outcome = match handle.join() {
                Ok(result) => result,
                Err(_) => Err(PipelineError::WorkerPanicked { worker }),
            };
            if let Err(err) = outcome {
                first_error.get_or_insert(err);
            }
        }
        match (first_error, source_error) {
            (Some(err), _) => Err(err),
            (None, Some(err)) => Err(err.into()),
            (None, None) => Ok(()),
        }
    })
}
