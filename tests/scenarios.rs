//! End-to-end behavior of loggers and the built-in appenders through the public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ringlog::appender::network::MAX_COUNT_MARKER;
use ringlog::appender::{
    Appender, AppenderFactory, AppenderInit, BufferHost, DisplayAppender, NetworkAppender,
    Transport,
};
use ringlog::logging::{LoggerRegistry, DISPLAY_APPENDER, NETWORK_APPENDER};
use ringlog::{AppenderError, LogEntry, Logger};
use serde_json::json;

#[derive(Default)]
struct RecordingTransport {
    posts: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    fn bodies(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn post(&self, url: &str, body: String) {
        self.posts.lock().unwrap().push((url.to_string(), body));
    }
}

fn setup() -> (LoggerRegistry, Arc<RecordingTransport>, Arc<BufferHost>) {
    let transport = Arc::new(RecordingTransport::default());
    let host = Arc::new(BufferHost::default());
    let registry = LoggerRegistry::with_hosts(transport.clone(), host.clone());
    (registry, transport, host)
}

fn ids(logger: &Logger) -> Vec<u64> {
    logger.entries().iter().map(|e| e.id).collect()
}

#[test]
fn test_bounded_history_keeps_call_order() {
    let (registry, _, _) = setup();
    for n in [0usize, 1, 7, 10] {
        let logger = registry.get_logger_sized(&format!("n{}", n), 10);
        for i in 0..n {
            logger.log(format!("m{}", i));
        }
        let entries = logger.entries();
        assert_eq!(entries.len(), n.min(10));
        assert_eq!(ids(&logger), (1..=n as u64).collect::<Vec<_>>());
    }
}

#[test]
fn test_wraparound_keeps_last_capacity_entries() {
    let (registry, _, _) = setup();
    let logger = registry.get_logger_sized("wrap", 4);
    for i in 0..(4 + 6) {
        logger.log(format!("m{}", i));
    }
    assert_eq!(ids(&logger), vec![7, 8, 9, 10]);
    // A second snapshot after normalization is unchanged
    assert_eq!(ids(&logger), vec![7, 8, 9, 10]);
}

#[test]
fn test_app_logger_scenario() {
    let (registry, _, _) = setup();
    let logger = registry.get_logger_sized("app", 3);
    for message in ["a", "b", "c", "d"] {
        logger.log(message);
    }

    let entries: Vec<(u64, String)> = logger
        .entries()
        .into_iter()
        .map(|e| (e.id, e.message))
        .collect();
    assert_eq!(
        entries,
        vec![
            (2, "b".to_string()),
            (3, "c".to_string()),
            (4, "d".to_string())
        ]
    );
}

#[test]
fn test_same_name_returns_same_logger() {
    let (registry, _, _) = setup();
    let first = registry.get_logger_sized("svc", 2);
    let second = registry.get_logger_sized("svc", 50);
    assert!(first.ptr_eq(&second));
    assert_eq!(second.capacity(), 2);

    let default = registry.get_logger("");
    assert!(default.ptr_eq(&registry.default_logger()));
}

#[test]
fn test_idempotent_attach_runs_factory_once() {
    let (registry, transport, _) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let inner = transport.clone();
    let factory: AppenderFactory = Arc::new(
        move |_logger: &Logger, init: &AppenderInit, _name: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            let config = ringlog::appender::parse_init("x", init)?;
            Ok(Arc::new(NetworkAppender::new(config, inner.clone())) as Arc<dyn Appender>)
        },
    );
    registry.register("x", factory);

    let logger = registry.get_logger("attach");
    let a = logger.use_appender("x", AppenderInit::None).unwrap();
    let b = logger
        .use_appender("x", AppenderInit::Args(json!({ "max_count": 1 })))
        .unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_register_only_affects_later_attaches() {
    let (registry, transport, _) = setup();
    let logger = registry.get_logger("late");
    let before = logger
        .use_appender_as::<NetworkAppender>(NETWORK_APPENDER, AppenderInit::None)
        .unwrap()
        .unwrap();

    let replaced = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&replaced);
    let inner = transport.clone();
    registry.register(
        NETWORK_APPENDER,
        Arc::new(move |_logger: &Logger, _init: &AppenderInit, _name: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NetworkAppender::new(Default::default(), inner.clone()))
                as Arc<dyn Appender>)
        }),
    );

    let after = logger
        .use_appender_as::<NetworkAppender>(NETWORK_APPENDER, AppenderInit::None)
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(replaced.load(Ordering::SeqCst), 0);

    registry
        .get_logger("fresh")
        .use_appender(NETWORK_APPENDER, AppenderInit::None)
        .unwrap();
    assert_eq!(replaced.load(Ordering::SeqCst), 1);
}

#[test]
fn test_replay_on_attach_renders_history() {
    let (registry, _, host) = setup();
    let logger = registry.get_logger("replay");
    logger.set_no_timestamp(true);
    for i in 1..=5 {
        logger.log(format!("message {}", i));
    }

    let display = logger
        .use_appender_as::<DisplayAppender>(DISPLAY_APPENDER, AppenderInit::None)
        .unwrap()
        .unwrap();
    display.show().unwrap();

    let surface = host.surface("replay").unwrap();
    assert_eq!(
        surface.lines(),
        (1..=5)
            .map(|i| format!("{}. message {}", i, i))
            .collect::<Vec<_>>()
    );
}

#[test]
fn test_clear_hides_earlier_entries_only_in_view() {
    let (registry, _, host) = setup();
    let logger = registry.get_logger_with_appender(
        "clear",
        None,
        DISPLAY_APPENDER,
        AppenderInit::Args(json!(true)),
    );
    logger.set_no_timestamp(true);
    logger.log("before 1");
    logger.log("before 2");

    let display = logger
        .use_appender_as::<DisplayAppender>(DISPLAY_APPENDER, AppenderInit::None)
        .unwrap()
        .unwrap();
    display.clear().unwrap();
    logger.log("after");

    let surface = host.surface("clear").unwrap();
    assert_eq!(surface.text(), "3. after\n");
    assert_eq!(ids(&logger), vec![1, 2, 3]);
    assert_eq!(display.first_idx(), 2);
}

#[test]
fn test_network_quota_and_marker() {
    let (registry, transport, _) = setup();
    let logger = registry.get_logger_with_appender(
        "quota",
        None,
        NETWORK_APPENDER,
        AppenderInit::Args(json!({ "url": "http://collector/ingest", "max_count": 3 })),
    );
    for i in 1..=5 {
        logger.log(format!("event {}", i));
    }

    assert_eq!(
        transport.bodies(),
        vec![
            "event 1".to_string(),
            "event 2".to_string(),
            format!("{}event 3", MAX_COUNT_MARKER),
        ]
    );
    assert!(transport
        .posts
        .lock()
        .unwrap()
        .iter()
        .all(|(url, _)| url == "http://collector/ingest"));
}

#[test]
fn test_network_include_and_exclude() {
    let (registry, transport, _) = setup();
    let included = registry.get_logger_with_appender(
        "include",
        None,
        NETWORK_APPENDER,
        AppenderInit::Args(json!({ "include": ["ERROR"] })),
    );
    included.log("ERROR: disk full");
    included.log("INFO: ok");
    assert_eq!(transport.bodies(), vec!["ERROR: disk full".to_string()]);

    let excluded = registry.get_logger_with_appender(
        "exclude",
        None,
        NETWORK_APPENDER,
        AppenderInit::Args(json!({ "exclude": ["DEBUG"] })),
    );
    excluded.log("DEBUG: x");
    excluded.log("WARN: y");
    assert_eq!(
        transport.bodies(),
        vec!["ERROR: disk full".to_string(), "WARN: y".to_string()]
    );
}

#[test]
fn test_failing_appender_does_not_stop_others() {
    struct Failing;
    impl Appender for Failing {
        fn notify(&self, _entry: &LogEntry) -> ringlog::Result<()> {
            Err(AppenderError::Surface("view is gone".to_string()))
        }
    }

    let (registry, transport, _) = setup();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    registry.set_error_handler(move |failure| {
        sink.lock()
            .unwrap()
            .push((failure.appender.to_string(), failure.error.to_string()));
    });

    let logger = registry.get_logger("isolated");
    logger
        .use_appender("failing", AppenderInit::instance(Failing))
        .unwrap();
    logger
        .use_appender(NETWORK_APPENDER, AppenderInit::None)
        .unwrap();
    logger.log("still delivered");

    assert_eq!(transport.bodies(), vec!["still delivered".to_string()]);
    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "failing");
}

#[test]
fn test_unknown_type_reports_invalid_appender() {
    let (registry, _, _) = setup();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    registry.set_error_handler(move |failure| {
        sink.lock().unwrap().push(matches!(
            failure.error,
            AppenderError::InvalidAppender { .. }
        ));
    });

    let logger = registry.get_logger("unknown");
    logger.use_appender("nonesuch", AppenderInit::None).unwrap();
    logger.log("one");
    logger.log("two");

    assert_eq!(*failures.lock().unwrap(), vec![true, true]);
    assert_eq!(logger.entries().len(), 2);
}

#[test]
fn test_invalid_init_is_reported_not_attached() {
    let (registry, _, _) = setup();
    let reported = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reported);
    registry.set_error_handler(move |_failure| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let logger = registry.get_logger_with_appender(
        "bad-init",
        None,
        NETWORK_APPENDER,
        AppenderInit::Args(json!({ "max_count": "lots" })),
    );
    assert_eq!(reported.load(Ordering::SeqCst), 1);
    assert!(logger.appender_names().is_empty());
}

#[test]
fn test_debounced_filter_applies_once() {
    let (registry, _, host) = setup();
    let logger = registry.get_logger_with_appender(
        "filtered",
        None,
        DISPLAY_APPENDER,
        AppenderInit::Args(json!({ "show": true })),
    );
    logger.set_no_timestamp(true);
    let display = logger
        .use_appender_as::<DisplayAppender>(DISPLAY_APPENDER, AppenderInit::None)
        .unwrap()
        .unwrap();
    logger.log("Warning: low battery");
    logger.log("all good");

    let surface = host.surface("filtered").unwrap();
    let redraws = surface.redraws();
    let start = Instant::now();
    display.on_filter_input_at("w", start);
    display.on_filter_input_at("wa", start + Duration::from_millis(50));
    display.on_filter_input_at("war(", start + Duration::from_millis(100));
    display.on_filter_input_at("warn", start + Duration::from_millis(150));

    assert!(!display.poll_filter(start + Duration::from_millis(300)).unwrap());
    assert!(display.poll_filter(start + Duration::from_millis(350)).unwrap());
    assert_eq!(surface.redraws(), redraws + 1);
    assert_eq!(surface.text(), "1. Warning: low battery\n");
    assert_eq!(display.filter_pattern(), "warn");
}
