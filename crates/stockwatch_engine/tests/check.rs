use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use stockwatch_engine::{
    CheckError, CheckOutcome, CheckRunner, CheckSettings, Clock, Delivery, Dispatch, FailureKind,
    FetchError, FetchMetadata, FetchOutput, Fetcher, LocateError, LogNotifier, Notifier,
    NotifyError, RetryPolicy, Stage, TargetConfig, ThrottleMap, ThrottleStore,
};
use tempfile::TempDir;

const NOW: f64 = 1_700_000_000.0;
const PAGE: &str = "https://shop.example.com/product/1/";
const IN_STOCK: &str = "<html><body><div><button>Add to Cart</button></div></body></html>";
/// "Add to shopping cart" as shown on a Japanese shop.
const ADD_TO_CART_JA: &str = "\u{30b7}\u{30e7}\u{30c3}\u{30d4}\u{30f3}\u{30b0}\u{30ab}\u{30fc}\u{30c8}\u{306b}\u{5165}\u{308c}\u{308b}";
const SOLD_OUT: &str = "<html><body><div><button>Sold out</button></div></body></html>";

fn init_logging() {
    stockwatch_logging::initialize_for_tests();
}

/// Serves one canned response and remembers what was asked for.
struct StaticFetcher {
    response: Result<Vec<u8>, FetchError>,
    requests: Mutex<Vec<(String, Duration, u32)>>,
}

impl StaticFetcher {
    fn body(body: &str) -> Self {
        Self::bytes(body.as_bytes().to_vec())
    }

    fn bytes(body: Vec<u8>) -> Self {
        Self {
            response: Ok(body),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing(err: FetchError) -> Self {
        Self {
            response: Err(err),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<(String, Duration, u32)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<FetchOutput, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), timeout, policy.max_attempts));
        let body = self.response.clone()?;
        Ok(FetchOutput {
            metadata: FetchMetadata {
                requested_url: url.to_string(),
                final_url: url.to_string(),
                status: 200,
                content_type: Some("text/html; charset=utf-8".into()),
                byte_len: body.len() as u64,
            },
            bytes: body,
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    fail: bool,
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        _target: &TargetConfig,
        recipients: &[String],
    ) -> Result<Dispatch, NotifyError> {
        self.calls.lock().unwrap().push(recipients.to_vec());
        if self.fail {
            Err(NotifyError::Transport("smtp server unreachable".into()))
        } else {
            Ok(Dispatch::Delivered)
        }
    }
}

fn fixed_clock(now: f64) -> Clock {
    Arc::new(move || now)
}

fn target(recipients: &[&str]) -> TargetConfig {
    TargetConfig::new(
        "Shop",
        "Console",
        PAGE,
        vec!["div".into(), "button".into()],
        "Add to Cart",
        recipients.iter().map(|s| s.to_string()).collect(),
    )
}

struct Harness {
    _temp: TempDir,
    store: Arc<ThrottleStore>,
    fetcher: Arc<StaticFetcher>,
    notifier: Arc<RecordingNotifier>,
    runner: CheckRunner,
}

fn harness(fetcher: StaticFetcher, notifier: RecordingNotifier) -> Harness {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = Arc::new(ThrottleStore::open(temp.path().join("notice_cache.json")));
    let fetcher = Arc::new(fetcher);
    let notifier = Arc::new(notifier);
    let runner = CheckRunner::new(fetcher.clone(), notifier.clone(), store.clone())
        .with_settings(CheckSettings {
            proxy_prefix: Some("https://proxy.example.net/".into()),
            ..CheckSettings::default()
        })
        .with_clock(fixed_clock(NOW));
    Harness {
        _temp: temp,
        store,
        fetcher,
        notifier,
        runner,
    }
}

#[tokio::test]
async fn found_and_never_notified_sends_once_and_records() {
    let h = harness(StaticFetcher::body(IN_STOCK), RecordingNotifier::default());

    let report = h.runner.run(&target(&["a@example.com"])).await;

    assert_eq!(
        report.outcome,
        CheckOutcome::Found {
            eligible: vec!["a@example.com".into()],
            skipped: vec![],
            delivery: Delivery::Sent,
        }
    );
    assert_eq!(h.notifier.calls(), vec![vec!["a@example.com".to_string()]]);
    assert_eq!(h.store.last_notified("a@example.com", PAGE), Some(NOW));
}

#[tokio::test]
async fn found_within_cooldown_skips_notifier_and_leaves_store() {
    let h = harness(StaticFetcher::body(IN_STOCK), RecordingNotifier::default());
    h.store
        .record(&["a@example.com".to_string()], PAGE, NOW - 100.0)
        .unwrap();
    let before = h.store.snapshot().unwrap();

    let report = h.runner.run(&target(&["a@example.com"]).with_cooldown(1800)).await;

    assert_eq!(
        report.outcome,
        CheckOutcome::Found {
            eligible: vec![],
            skipped: vec!["a@example.com".into()],
            delivery: Delivery::NoneDue,
        }
    );
    assert!(h.notifier.calls().is_empty());
    assert_eq!(h.store.snapshot().unwrap(), before);
}

#[tokio::test]
async fn only_due_recipients_are_notified() {
    let h = harness(StaticFetcher::body(IN_STOCK), RecordingNotifier::default());
    h.store
        .record(&["b@example.com".to_string()], PAGE, NOW - 10.0)
        .unwrap();

    let report = h.runner.run(&target(&["a@example.com", "b@example.com"])).await;

    assert!(report.is_found());
    assert_eq!(h.notifier.calls(), vec![vec!["a@example.com".to_string()]]);
    assert_eq!(h.store.last_notified("a@example.com", PAGE), Some(NOW));
    assert_eq!(h.store.last_notified("b@example.com", PAGE), Some(NOW - 10.0));
}

#[tokio::test]
async fn not_found_touches_nothing() {
    let h = harness(StaticFetcher::body(SOLD_OUT), RecordingNotifier::default());

    let report = h.runner.run(&target(&["a@example.com"])).await;

    assert_eq!(report.outcome, CheckOutcome::NotFound);
    assert!(h.notifier.calls().is_empty());
    assert_eq!(h.store.snapshot().unwrap(), ThrottleMap::new());
}

#[tokio::test]
async fn failed_notification_does_not_poison_the_throttle() {
    let h = harness(StaticFetcher::body(IN_STOCK), RecordingNotifier::failing());

    let report = h.runner.run(&target(&["a@example.com"])).await;

    assert_eq!(
        report.outcome,
        CheckOutcome::Found {
            eligible: vec!["a@example.com".into()],
            skipped: vec![],
            delivery: Delivery::Failed(NotifyError::Transport("smtp server unreachable".into())),
        }
    );
    assert_eq!(h.store.last_notified("a@example.com", PAGE), None);

    // The next pass tries the same recipient again.
    h.runner.run(&target(&["a@example.com"])).await;
    assert_eq!(h.notifier.calls().len(), 2);
}

#[tokio::test]
async fn fetch_failure_is_reported_with_target_identity() {
    let h = harness(
        StaticFetcher::failing(FetchError::new(FailureKind::HttpStatus(404), "404 Not Found")),
        RecordingNotifier::default(),
    );

    let report = h.runner.run(&target(&["a@example.com"])).await;

    assert_eq!(report.site, "Shop");
    assert_eq!(report.label, "Console");
    assert_eq!(report.element_path, vec!["div", "button"]);
    assert_eq!(report.monitor_text, "Add to Cart");
    match &report.outcome {
        CheckOutcome::Failed(err @ CheckError::Fetch(fetch)) => {
            assert_eq!(fetch.kind, FailureKind::HttpStatus(404));
            assert_eq!(err.stage(), Stage::Fetching);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(h.notifier.calls().is_empty());
}

#[tokio::test]
async fn invalid_selector_fails_at_locating() {
    let h = harness(StaticFetcher::body(IN_STOCK), RecordingNotifier::default());
    let mut broken = target(&["a@example.com"]);
    broken.element_path = vec!["div".into(), "[[".into()];

    let report = h.runner.run(&broken).await;

    match &report.outcome {
        CheckOutcome::Failed(err @ CheckError::Locate(LocateError::InvalidSelector { .. })) => {
            assert_eq!(err.stage(), Stage::Locating);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn proxy_targets_fetch_through_prefix_but_throttle_on_page_url() {
    let h = harness(StaticFetcher::body(IN_STOCK), RecordingNotifier::default());
    let proxied = target(&["a@example.com"])
        .with_proxy(true)
        .with_fetch_policy(7, 2);

    h.runner.run(&proxied).await;

    assert_eq!(
        h.fetcher.requests(),
        vec![(
            format!("https://proxy.example.net/{PAGE}"),
            Duration::from_secs(7),
            2
        )]
    );
    assert_eq!(h.store.last_notified("a@example.com", PAGE), Some(NOW));
}

#[tokio::test]
async fn proxy_target_without_prefix_fails_before_fetching() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(StaticFetcher::body(IN_STOCK));
    let runner = CheckRunner::new(
        fetcher.clone(),
        Arc::new(RecordingNotifier::default()),
        Arc::new(ThrottleStore::open(temp.path().join("notice_cache.json"))),
    );

    let report = runner.run(&target(&["a@example.com"]).with_proxy(true)).await;

    assert!(matches!(report.outcome, CheckOutcome::Failed(CheckError::Config(_))));
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn unwritable_store_reports_sent_but_unrecorded() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not_a_dir");
    std::fs::write(&blocker, "x").unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let runner = CheckRunner::new(
        Arc::new(StaticFetcher::body(IN_STOCK)),
        notifier.clone(),
        Arc::new(ThrottleStore::open(blocker.join("notice_cache.json"))),
    )
    .with_clock(fixed_clock(NOW));

    let report = runner.run(&target(&["a@example.com"])).await;

    assert!(matches!(
        report.outcome,
        CheckOutcome::Found {
            delivery: Delivery::SentUnrecorded(_),
            ..
        }
    ));
    assert_eq!(notifier.calls().len(), 1);
}

#[tokio::test]
async fn stray_invalid_byte_in_utf8_page_still_finds_marker() {
    let mut page = "<html><body><p>\u{4fa1}\u{683c} ".as_bytes().to_vec();
    page.push(0xFF);
    let rest = format!("</p><div><button>{ADD_TO_CART_JA}</button></div></body></html>");
    page.extend_from_slice(rest.as_bytes());
    let h = harness(StaticFetcher::bytes(page), RecordingNotifier::default());
    let japanese = TargetConfig::new(
        "Yodobashi",
        "Console",
        "https://www.yodobashi.com/product/100000001/",
        vec!["div".into(), "button".into()],
        ADD_TO_CART_JA,
        vec!["a@example.com".into()],
    );

    let report = h.runner.run(&japanese).await;

    assert_eq!(
        report.outcome,
        CheckOutcome::Found {
            eligible: vec!["a@example.com".into()],
            skipped: vec![],
            delivery: Delivery::Sent,
        }
    );
}

#[tokio::test]
async fn log_only_notifier_leaves_store_untouched() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = Arc::new(ThrottleStore::open(temp.path().join("notice_cache.json")));
    let runner = CheckRunner::new(
        Arc::new(StaticFetcher::body(IN_STOCK)),
        Arc::new(LogNotifier),
        store.clone(),
    )
    .with_clock(fixed_clock(NOW));

    let report = runner.run(&target(&["a@example.com"])).await;

    assert_eq!(
        report.outcome,
        CheckOutcome::Found {
            eligible: vec!["a@example.com".into()],
            skipped: vec![],
            delivery: Delivery::LoggedOnly,
        }
    );
    assert_eq!(store.snapshot().unwrap(), ThrottleMap::new());

    // Nothing was recorded, so the recipient is still due next pass.
    assert!(store.should_notify("a@example.com", PAGE, 1800, NOW + 1.0));
}
