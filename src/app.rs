use crate::config::SimulationConfig;
use crate::logging::{JsonLineLogger, LogRotationPolicy, LogScope, SharedLogger};
use crate::run::{RunAggregator, RunSummary};
use crate::sink::{JsonLinesSink, SharedSink};
use crate::transport::EventReader;
use crate::worker::run_stream;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

const USAGE: &str = "usage: legend-sim --config <file> --input <callbacks.jsonl> \
[--output <path>] [--workers N] [--log <path>]";

/// Command-line arguments of the `legend-sim` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub input: PathBuf,
    pub output: PathBuf,
    pub workers: Option<usize>,
    pub log: Option<PathBuf>,
}

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(Args),
    Help,
}

impl Args {
    fn parse() -> Result<Invocation> {
        Self::parse_from(env::args().skip(1))
    }

    /// Parses arguments without the program name.
    pub fn parse_from<I>(args: I) -> Result<Invocation>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = None;
        let mut input = None;
        let mut output = None;
        let mut workers = None;
        let mut log = None;
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => {
                    let path = iter
                        .next()
                        .ok_or_else(|| anyhow!("--config requires a path"))?;
                    config = Some(PathBuf::from(path));
                }
                "--input" => {
                    let path = iter
                        .next()
                        .ok_or_else(|| anyhow!("--input requires a path"))?;
                    input = Some(PathBuf::from(path));
                }
                "--output" => {
                    let path = iter
                        .next()
                        .ok_or_else(|| anyhow!("--output requires a path"))?;
                    output = Some(PathBuf::from(path));
                }
                "--workers" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow!("--workers requires a count"))?;
                    let count: usize = value
                        .parse()
                        .with_context(|| format!("invalid worker count '{value}'"))?;
                    workers = Some(count);
                }
                "--log" => {
                    let path = iter.next().ok_or_else(|| anyhow!("--log requires a path"))?;
                    log = Some(PathBuf::from(path));
                }
                "--help" | "-h" => return Ok(Invocation::Help),
                other => bail!("unknown argument: {other}\n{USAGE}"),
            }
        }
        let input = input.ok_or_else(|| anyhow!("--input is required\n{USAGE}"))?;
        Ok(Invocation::Run(Self {
            config,
            input,
            output: output.unwrap_or_else(|| PathBuf::from("legend-sim-output.jsonl")),
            workers,
            log,
        }))
    }
}

/// Application entrypoint: parse arguments, run, print the summary.
pub fn run() -> Result<()> {
    let args = match Args::parse()? {
        Invocation::Run(args) => args,
        Invocation::Help => {
            println!("{USAGE}");
            return Ok(());
        }
    };
    let summary = run_with(&args)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Loads configuration, replays the recorded callbacks and writes every
/// output of the run.
pub fn run_with(args: &Args) -> Result<RunSummary> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.validate()?;
    let config = Arc::new(config);

    let mut logger = JsonLineLogger::new(LogRotationPolicy::default());
    logger.set_level(config.log_level);
    logger.set_echo_stderr(args.log.is_none());
    let logger = SharedLogger::new(logger);

    let input = File::open(&args.input)
        .with_context(|| format!("failed to open input {}", args.input.display()))?;
    let events = EventReader::new(BufReader::new(input));
    logger.info(
        LogScope::module("app"),
        &format!("streaming events from {}", args.input.display()),
    );

    let sink = JsonLinesSink::new(&args.output);
    let mut run = RunAggregator::new(
        config.clone(),
        SharedSink::new(sink),
        logger.clone(),
        args.output.with_extension(""),
    )?;
    run.begin_run()
        .with_context(|| format!("failed to open output {}", args.output.display()))?;
    let outcome = run_stream(&run, events, config.workers, config.event_queue_capacity)
        .with_context(|| format!("failed to replay {}", args.input.display()))
        .and_then(|_| Ok(run.end_run()?));

    if let Some(path) = &args.log {
        let file = File::create(path)
            .with_context(|| format!("failed to create log {}", path.display()))?;
        logger.with(|logger| logger.write_to(file))??;
    }
    outcome
}
