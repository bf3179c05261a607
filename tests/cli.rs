use legend_sim::app::{run_with, Args, Invocation};
use legend_sim::{auxiliary_path, CROSSING_SUFFIX};

fn args(list: &[&str]) -> anyhow::Result<Args> {
    match Args::parse_from(list.iter().map(|arg| arg.to_string()))? {
        Invocation::Run(args) => Ok(args),
        Invocation::Help => anyhow::bail!("unexpected help request"),
    }
}

const EVENTS: &str = r#"{"kind":"begin_event","event_id":0}
{"kind":"track_start","track_id":2,"parent_id":1,"species":{"name":"neutron","pdg":2112},"parent_pdg":13,"vertex_position":{"x":1000.0,"y":0.0,"z":0.0},"vertex_momentum":{"x":0.0,"y":1.0,"z":0.0},"kinetic_energy":1.0,"global_time":0.0,"vertex_volume":"Lar_phys"}
{"kind":"end_event","event_id":0}
{"kind":"begin_event","event_id":1}
{"kind":"end_event","event_id":1}
"#;

#[test]
fn parses_every_flag() {
    let parsed = args(&[
        "--config", "run.yaml", "--input", "in.jsonl", "--output", "out.jsonl", "--workers",
        "3", "--log", "run.log",
    ])
    .unwrap();
    assert_eq!(parsed.config.as_deref(), Some(std::path::Path::new("run.yaml")));
    assert_eq!(parsed.input, std::path::PathBuf::from("in.jsonl"));
    assert_eq!(parsed.output, std::path::PathBuf::from("out.jsonl"));
    assert_eq!(parsed.workers, Some(3));
    assert_eq!(parsed.log.as_deref(), Some(std::path::Path::new("run.log")));
}

#[test]
fn rejects_bad_arguments() {
    assert!(args(&[]).is_err(), "input is mandatory");
    assert!(args(&["--input"]).is_err());
    assert!(args(&["--input", "a", "--workers", "many"]).is_err());
    assert!(args(&["--input", "a", "--frobnicate"]).is_err());
    let defaulted = args(&["--input", "a"]).unwrap();
    assert_eq!(defaulted.output, std::path::PathBuf::from("legend-sim-output.jsonl"));
}

#[test]
fn help_is_reported_instead_of_exiting() {
    let parsed = Args::parse_from(["--input", "a", "--help"].map(String::from)).unwrap();
    assert_eq!(parsed, Invocation::Help);
    let short = Args::parse_from(["-h".to_string()]).unwrap();
    assert_eq!(short, Invocation::Help);
}

#[test]
fn runs_a_recorded_stream_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("events.jsonl");
    std::fs::write(&input, EVENTS).unwrap();
    let config = dir.path().join("run.yaml");
    std::fs::write(
        &config,
        "save_all_events: true\noutputs:\n  write_general_neutron_info: true\n",
    )
    .unwrap();
    let output = dir.path().join("rows.jsonl");
    let log = dir.path().join("run.log");

    let summary = run_with(&Args {
        config: Some(config),
        input,
        output: output.clone(),
        workers: Some(2),
        log: Some(log.clone()),
    })
    .unwrap();
    assert_eq!(summary.events_processed, 2);
    assert_eq!(summary.events_written, 2);
    assert_eq!(summary.neutrons_in_argon, 1);

    let rows = std::fs::read_to_string(&output).unwrap();
    assert_eq!(rows.lines().count(), 3, "header plus one row per event");
    let counters =
        std::fs::read_to_string(auxiliary_path(&output.with_extension(""), CROSSING_SUFFIX))
            .unwrap();
    assert_eq!(counters, "0 1\n");
    let log = std::fs::read_to_string(&log).unwrap();
    assert!(log.contains("TotalNumberOfNeutronInLAr: 1"));
}

#[test]
fn unfinished_stream_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("events.jsonl");
    std::fs::write(&input, "{\"kind\":\"begin_event\",\"event_id\":0}\n").unwrap();
    let output = dir.path().join("rows.jsonl");
    let err = run_with(&Args {
        config: None,
        input,
        output: output.clone(),
        workers: None,
        log: None,
    })
    .unwrap_err();
    assert!(format!("{err:#}").contains("exhausted"));
    let rows = std::fs::read_to_string(&output).unwrap();
    assert_eq!(rows.lines().count(), 1, "only the header was written");
}

#[test]
fn missing_input_leaves_no_output_behind() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("rows.jsonl");
    let err = run_with(&Args {
        config: None,
        input: dir.path().join("absent.jsonl"),
        output: output.clone(),
        workers: None,
        log: None,
    })
    .unwrap_err();
    assert!(format!("{err:#}").contains("failed to open input"));
    assert!(!output.exists());
}
