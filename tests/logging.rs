use legend_sim::{JsonLineLogger, LogLevel, LogRotationPolicy, LogScope, SharedLogger};
use serde_json::Value;

fn lines(logger: &JsonLineLogger) -> Vec<String> {
    logger
        .segments()
        .flat_map(|segment| segment.lines().iter().cloned())
        .collect()
}

#[test]
fn json_logger_serializes_entries() {
    let policy = LogRotationPolicy {
        max_bytes: 256,
        max_files: 2,
    };
    let mut logger = JsonLineLogger::new(policy);
    logger
        .log(
            100,
            LogLevel::Info,
            LogScope::module("event").worker(2).event(17),
            "first entry",
        )
        .unwrap();
    let lines = lines(&logger);
    assert_eq!(lines.len(), 1);
    let parsed: Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(parsed["ts"], 100);
    assert_eq!(parsed["level"], "INFO");
    assert_eq!(parsed["module"], "event");
    assert_eq!(parsed["worker"], 2);
    assert_eq!(parsed["event_id"], 17);
    assert_eq!(parsed["message"], "first entry");
}

#[test]
fn scope_without_worker_omits_fields() {
    let mut logger = JsonLineLogger::new(LogRotationPolicy::default());
    logger
        .log(0, LogLevel::Warn, LogScope::module("run"), "summary")
        .unwrap();
    let parsed: Value = serde_json::from_str(&lines(&logger)[0]).unwrap();
    assert!(parsed.get("worker").is_none());
    assert!(parsed.get("event_id").is_none());
}

#[test]
fn loglevel_override_filters_entries() {
    let policy = LogRotationPolicy {
        max_bytes: 512,
        max_files: 1,
    };
    let mut logger = JsonLineLogger::new(policy);
    logger.set_level(LogLevel::Warn);
    logger
        .log(0, LogLevel::Info, LogScope::module("run"), "info suppressed")
        .unwrap();
    logger
        .log(1, LogLevel::Warn, LogScope::module("run"), "warn visible")
        .unwrap();
    let lines = lines(&logger);
    assert_eq!(lines.len(), 1);
    let parsed: Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(parsed["level"], "WARN");
    assert_eq!(parsed["message"], "warn visible");
}

#[test]
fn rotation_discards_old_segments() {
    let policy = LogRotationPolicy {
        max_bytes: 64,
        max_files: 2,
    };
    let mut logger = JsonLineLogger::new(policy);
    for idx in 0..10 {
        logger
            .log(0, LogLevel::Info, LogScope::module("worker").event(idx), "payload")
            .unwrap();
    }
    let segments: Vec<_> = logger.segments().collect();
    assert!(segments.len() <= 3, "active + rotated segments retained");
    assert!(segments.iter().any(|segment| !segment.lines().is_empty()));
}

#[test]
fn shared_logger_persists_lines_in_order() {
    let logger = SharedLogger::default();
    logger.info(LogScope::module("run"), "one");
    logger.warn(LogScope::module("run"), "two");
    let mut buffer = Vec::new();
    logger
        .with(|inner| inner.write_to(&mut buffer))
        .unwrap()
        .unwrap();
    let text = String::from_utf8(buffer).unwrap();
    let messages: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["message"], "one");
    assert_eq!(messages[1]["level"], "WARN");
}

#[test]
fn log_level_parses_lowercase_names() {
    let level: LogLevel = serde_json::from_str("\"debug\"").unwrap();
    assert_eq!(level, LogLevel::Debug);
    assert_eq!(level.to_string(), "DEBUG");
}
