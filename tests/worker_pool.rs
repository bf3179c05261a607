use legend_sim::units::{MEV, US};
use legend_sim::{
    run_events, run_stream, EventEnd, MemorySink, PipelineError, RecordedEvent, RunAggregator,
    Secondary, SharedLogger, SharedSink, SimulationConfig, Species, StepRecord, TrackEnd,
    TrackStart, TransportCallback, TransportError, Vec3,
};
use std::sync::Arc;

fn neutron_start(track_id: i32) -> TrackStart {
    TrackStart {
        track_id,
        parent_id: 1,
        species: Species::neutron(),
        parent_pdg: 13,
        vertex_position: Vec3::new(1000.0, 0.0, 0.0),
        vertex_momentum: Vec3::new(0.0, 1.5, 0.0),
        kinetic_energy: 2.0,
        global_time: 10.0,
        vertex_volume: "Lar_phys".into(),
    }
}

fn ge77_step(track_id: i32) -> StepRecord {
    StepRecord {
        track_id,
        parent_id: 40,
        species: Species::ion(32, 77, 0.0),
        global_time: 25.0 * US,
        energy_deposit: 0.02 * MEV,
        weight: 1.0,
        pre_position: Vec3::new(0.0, 120.0, 0.0),
        post_position: Vec3::new(0.0, 120.0, 0.0),
        pre_volume: "Ge_phys".into(),
        post_volume: Some("Ge_phys".into()),
        copy_number: 5,
        process: "ionIoni".into(),
    }
}

/// Neutron captured on Ge-76 whose Ge-77 product deposits in a crystal.
fn ge77_event(event_id: i64) -> RecordedEvent {
    let capture = TrackEnd {
        track_id: 40,
        parent_id: 1,
        species: Species::neutron(),
        process: "nCapture".into(),
        global_time: 20.0 * US,
        position: Vec3::new(0.0, 120.0, 0.0),
        secondaries: vec![Secondary {
            track_id: 50,
            species: Species::ion(32, 77, 0.0),
            position: Vec3::new(0.0, 120.0, 0.0),
            momentum: Vec3::default(),
            kinetic_energy: 0.0,
            global_time: 20.0 * US,
        }],
    };
    let mut ge77 = neutron_start(50);
    ge77.parent_id = 40;
    ge77.species = Species::ion(32, 77, 0.0);
    ge77.vertex_volume = "Ge_phys".into();
    RecordedEvent {
        event_id,
        callbacks: vec![
            TransportCallback::BeginEvent { event_id },
            TransportCallback::TrackStart(neutron_start(40)),
            TransportCallback::TrackEnd(capture),
            TransportCallback::TrackStart(ge77),
            TransportCallback::Step(ge77_step(50)),
            TransportCallback::EndEvent(EventEnd {
                event_id,
                trajectories: Vec::new(),
            }),
        ],
    }
}

fn empty_event(event_id: i64) -> RecordedEvent {
    RecordedEvent {
        event_id,
        callbacks: vec![
            TransportCallback::BeginEvent { event_id },
            TransportCallback::EndEvent(EventEnd {
                event_id,
                trajectories: Vec::new(),
            }),
        ],
    }
}

fn run_aggregator(config: SimulationConfig, sink: &MemorySink) -> RunAggregator {
    RunAggregator::new(
        Arc::new(config),
        SharedSink::new(sink.clone()),
        SharedLogger::default(),
        std::env::temp_dir().join("legend-sim-worker-pool"),
    )
    .expect("run aggregator")
}

fn written_event_ids(sink: &MemorySink) -> Vec<i64> {
    let mut ids: Vec<i64> = sink
        .rows()
        .iter()
        .filter_map(|row| row.get("event_id").and_then(|value| value.as_i64()))
        .collect();
    ids.sort_unstable();
    ids
}

#[test]
fn every_event_is_processed_exactly_once() {
    let sink = MemorySink::new();
    let mut run = run_aggregator(SimulationConfig::default(), &sink);
    run.begin_run().unwrap();

    let events: Vec<RecordedEvent> = (0..24)
        .map(|id| if id % 3 == 0 { ge77_event(id) } else { empty_event(id) })
        .collect();
    run_events(&run, &events, 4).unwrap();
    let summary = run.end_run().unwrap();

    assert_eq!(summary.events_processed, 24);
    assert_eq!(summary.events_written, 8);
    assert_eq!(written_event_ids(&sink), (0..24i64).step_by(3).collect::<Vec<_>>());
    assert_eq!(summary.neutrons_in_argon, 8);
    assert_eq!(sink.flushes(), 1);
}

#[test]
fn rows_carry_the_per_event_aggregates() {
    let sink = MemorySink::new();
    let mut run = run_aggregator(SimulationConfig::default(), &sink);
    run.begin_run().unwrap();
    run_events(&run, &[ge77_event(7)], 3).unwrap();
    run.end_run().unwrap();

    let rows = sink.rows();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["event_id"], 7);
    assert_eq!(row["n_ge77"], 1);
    assert_eq!(row["neutrons_produced"], 1);
    for key in row.keys() {
        assert!(
            sink.columns().contains(key),
            "column {key} missing from the declared schema"
        );
    }
}

#[test]
fn save_all_writes_empty_events() {
    let sink = MemorySink::new();
    let config = SimulationConfig {
        save_all_events: true,
        ..SimulationConfig::default()
    };
    let mut run = run_aggregator(config, &sink);
    run.begin_run().unwrap();
    let events: Vec<RecordedEvent> = (0..5).map(empty_event).collect();
    run_events(&run, &events, 2).unwrap();
    let summary = run.end_run().unwrap();
    assert_eq!(summary.events_written, 5);
    assert_eq!(written_event_ids(&sink), vec![0, 1, 2, 3, 4]);
}

#[test]
fn a_failing_event_stops_the_run() {
    let sink = MemorySink::new();
    let mut run = run_aggregator(SimulationConfig::default(), &sink);
    run.begin_run().unwrap();

    let broken = RecordedEvent {
        event_id: 3,
        callbacks: vec![
            TransportCallback::BeginEvent { event_id: 3 },
            TransportCallback::BeginEvent { event_id: 4 },
        ],
    };
    let err = run_events(&run, &[broken], 1).unwrap_err();
    assert!(matches!(err, PipelineError::EventAlreadyOpen { open: 3 }));
    assert_eq!(run.counters().events_processed(), 0);
    assert!(sink.rows().is_empty());
}

#[test]
fn no_events_is_a_no_op() {
    let sink = MemorySink::new();
    let mut run = run_aggregator(SimulationConfig::default(), &sink);
    run.begin_run().unwrap();
    run_events(&run, &[], 8).unwrap();
    let summary = run.end_run().unwrap();
    assert_eq!(summary.events_processed, 0);
    assert!(!sink.columns().is_empty());
}

#[test]
fn a_single_slot_queue_still_delivers_every_event() {
    let sink = MemorySink::new();
    let mut run = run_aggregator(SimulationConfig::default(), &sink);
    run.begin_run().unwrap();

    let source = (0..40).map(|id| {
        Ok::<_, TransportError>(if id % 2 == 0 { ge77_event(id) } else { empty_event(id) })
    });
    run_stream(&run, source, 3, 1).unwrap();
    let summary = run.end_run().unwrap();

    assert_eq!(summary.events_processed, 40);
    assert_eq!(written_event_ids(&sink), (0..40i64).step_by(2).collect::<Vec<_>>());
}

#[test]
fn exhausted_source_keeps_rows_of_completed_events() {
    let sink = MemorySink::new();
    let mut run = run_aggregator(SimulationConfig::default(), &sink);
    run.begin_run().unwrap();

    let source = vec![
        Ok(ge77_event(0)),
        Ok(ge77_event(1)),
        Err(TransportError::SourceExhausted { event_id: 2 }),
        Ok(ge77_event(3)),
    ];
    let err = run_stream(&run, source, 2, 1).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Transport(TransportError::SourceExhausted { event_id: 2 })
    ));
    assert_eq!(run.counters().events_processed(), 2);
    assert_eq!(written_event_ids(&sink), vec![0, 1]);
}

#[test]
fn worker_failure_wins_over_the_remaining_source() {
    let sink = MemorySink::new();
    let mut run = run_aggregator(SimulationConfig::default(), &sink);
    run.begin_run().unwrap();

    let broken = RecordedEvent {
        event_id: 5,
        callbacks: vec![TransportCallback::EndEvent(EventEnd {
            event_id: 5,
            trajectories: Vec::new(),
        })],
    };
    let source = std::iter::once(Ok::<_, TransportError>(broken))
        .chain((6..200).map(|id| Ok(empty_event(id))));
    let err = run_stream(&run, source, 1, 2).unwrap_err();
    assert!(matches!(err, PipelineError::EventNotOpen));
    assert!(sink.rows().is_empty());
}
