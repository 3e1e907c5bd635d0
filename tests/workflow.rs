//! End-to-end workflow tests against a mock analysis vendor.
//!
//! Every test drives the real pipeline — upload to an in-memory blob store,
//! HTTP submission, the bounded poll loop, normalization — with only the
//! vendor faked by a `wiremock` server. Poll intervals are shrunk to
//! milliseconds so the full 30-attempt scenarios still run in well under a
//! second.

use receipt2ledger::{
    capture, capture_and_persist, CanonicalReceipt, CaptureConfig, CaptureProgressCallback,
    InMemoryRepository, InMemoryStorage, ReceiptError,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static INIT: Once = Once::new();

/// Initializes tracing for tests.
fn setup_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt::init();
    });
}

const SUBMIT_PATH: &str = "/formrecognizer/documentModels/prebuilt-receipt:analyze";
const OPERATION_PATH: &str = "/operations/cap-1";

fn config_for(server: &MockServer, storage: Arc<InMemoryStorage>, attempts: u32) -> CaptureConfig {
    CaptureConfig::builder()
        .endpoint(server.uri())
        .api_key("test-key")
        .storage(storage)
        .poll_interval(Duration::from_millis(5))
        .max_poll_attempts(attempts)
        .build()
        .expect("valid config")
}

/// Mount the one good submission outcome: 202 + operation-location.
async fn mount_submit_accepted(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .and(header("Ocp-Apim-Subscription-Key", "test-key"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("operation-location", format!("{}{}", server.uri(), OPERATION_PATH).as_str()),
        )
        .mount(server)
        .await;
}

fn running_body() -> serde_json::Value {
    serde_json::json!({ "status": "running" })
}

fn succeeded_body() -> serde_json::Value {
    serde_json::json!({
        "status": "succeeded",
        "analyzeResult": {
            "documents": [{
                "fields": {
                    "MerchantName": { "valueString": "Trader Joe's", "content": "TRADER JOES #55" },
                    "Total": { "content": "₩-5,500" },
                    "TransactionDate": { "valueDate": "2024-01-02" }
                }
            }]
        }
    })
}

// ── Happy path ───────────────────────────────────────────────────────────

#[tokio::test]
async fn capture_normalizes_after_a_few_polls() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    mount_submit_accepted(&server).await;

    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_body()))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(succeeded_body()))
        .mount(&server)
        .await;

    let storage = Arc::new(InMemoryStorage::new("https://cdn.test"));
    let config = config_for(&server, Arc::clone(&storage), 30);

    // --- 2. Act ---
    let output = capture(b"fake-jpeg-bytes", "image/jpeg", "groceries.jpg", &config)
        .await
        .expect("capture should succeed");

    // --- 3. Assert ---
    assert_eq!(output.receipt.store_name, "Trader Joe's");
    assert_eq!(output.receipt.total_amount, Decimal::from_str("5500").unwrap());
    assert_eq!(
        output.receipt.transaction_date.map(|d| d.to_string()),
        Some("2024-01-02".to_string())
    );
    // The receipt embeds the permanent URL, never the signed one.
    assert!(output.receipt.source_image_url.starts_with("https://cdn.test/receipts/"));
    assert!(!output.receipt.source_image_url.contains("sig="));
    assert_eq!(output.stats.poll_attempts, 3);
    assert!(storage.has_blob(&output.image_key));
}

#[tokio::test]
async fn submission_sends_signed_url_not_permanent() {
    setup_tracing();
    let server = MockServer::start().await;
    mount_submit_accepted(&server).await;
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(succeeded_body()))
        .mount(&server)
        .await;

    let storage = Arc::new(InMemoryStorage::new("https://cdn.test"));
    let config = config_for(&server, storage, 5);
    capture(b"bytes", "image/png", "a.png", &config).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let submit = requests
        .iter()
        .find(|r| r.url.path() == SUBMIT_PATH)
        .expect("submit request");
    let body = String::from_utf8_lossy(&submit.body);
    assert!(body.contains("urlSource"));
    assert!(body.contains("sig="), "vendor should get the signed URL");
}

// ── Poll budget boundaries ───────────────────────────────────────────────

/// Vendor stays `running` for 29 polls and succeeds on the 30th.
async fn mount_succeeds_on_attempt_30(server: &MockServer) {
    mount_submit_accepted(server).await;
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_body()))
        .up_to_n_times(29)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(succeeded_body()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn success_on_final_attempt_within_budget() {
    setup_tracing();
    let server = MockServer::start().await;
    mount_succeeds_on_attempt_30(&server).await;

    let config = config_for(&server, Arc::new(InMemoryStorage::new("https://cdn.test")), 30);
    let output = capture(b"bytes", "image/jpeg", "r.jpg", &config)
        .await
        .expect("attempt 30 of 30 should still succeed");
    assert_eq!(output.stats.poll_attempts, 30);
}

#[tokio::test]
async fn one_attempt_short_of_success_times_out() {
    setup_tracing();
    let server = MockServer::start().await;
    mount_succeeds_on_attempt_30(&server).await;

    let config = config_for(&server, Arc::new(InMemoryStorage::new("https://cdn.test")), 29);
    let err = capture(b"bytes", "image/jpeg", "r.jpg", &config)
        .await
        .expect_err("budget of 29 must time out");
    match err {
        ReceiptError::AnalysisTimeout { attempts, .. } => assert_eq!(attempts, 29),
        other => panic!("expected AnalysisTimeout, got {other:?}"),
    }
    assert_eq!(err.terminal_state(), "timed_out");
}

// ── Terminal vendor failures ─────────────────────────────────────────────

#[tokio::test]
async fn vendor_failed_terminates_without_consuming_budget() {
    setup_tracing();
    let server = MockServer::start().await;
    mount_submit_accepted(&server).await;

    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_body()))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    // Attempt 3 reports failed; the loop must stop right there.
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "failed",
            "error": { "code": "InvalidImage", "message": "image too blurry" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server, Arc::new(InMemoryStorage::new("https://cdn.test")), 30);
    let err = capture(b"bytes", "image/jpeg", "r.jpg", &config)
        .await
        .expect_err("vendor failure is terminal");
    match &err {
        ReceiptError::AnalysisFailed { detail } => {
            assert!(detail.contains("InvalidImage"));
            assert!(detail.contains("too blurry"));
        }
        other => panic!("expected AnalysisFailed, got {other:?}"),
    }

    let polls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == OPERATION_PATH)
        .count();
    assert_eq!(polls, 3, "no polls after the terminal vendor state");
}

#[tokio::test]
async fn poll_http_error_terminates_immediately() {
    setup_tracing();
    let server = MockServer::start().await;
    mount_submit_accepted(&server).await;
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("subscription key rejected"))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server, Arc::new(InMemoryStorage::new("https://cdn.test")), 30);
    let err = capture(b"bytes", "image/jpeg", "r.jpg", &config).await.unwrap_err();
    match err {
        ReceiptError::AnalysisPollError { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("rejected"));
        }
        other => panic!("expected AnalysisPollError, got {other:?}"),
    }
}

#[tokio::test]
async fn poll_transport_errors_consume_the_budget_then_time_out() {
    setup_tracing();
    let server = MockServer::start().await;
    // Port 1 is never listening, so every poll GET dies in transit. Each
    // failed send is inconclusive and costs one attempt of the budget.
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("operation-location", "http://127.0.0.1:1/operations/cap-1"),
        )
        .mount(&server)
        .await;

    let config = config_for(&server, Arc::new(InMemoryStorage::new("https://cdn.test")), 3);
    let err = capture(b"bytes", "image/jpeg", "r.jpg", &config)
        .await
        .expect_err("a vendor that never answers must time out");
    match err {
        ReceiptError::AnalysisTimeout { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected AnalysisTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_poll_body_is_inconclusive() {
    setup_tracing();
    let server = MockServer::start().await;
    mount_submit_accepted(&server).await;

    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<gateway warming up>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(succeeded_body()))
        .mount(&server)
        .await;

    let config = config_for(&server, Arc::new(InMemoryStorage::new("https://cdn.test")), 30);
    let output = capture(b"bytes", "image/jpeg", "r.jpg", &config)
        .await
        .expect("one bad body only consumes an attempt");
    assert_eq!(output.stats.poll_attempts, 2);
}

// ── Submission failures ──────────────────────────────────────────────────

#[tokio::test]
async fn http_200_on_submit_never_polls() {
    setup_tracing();
    let server = MockServer::start().await;
    // A well-formed body with the wrong status code is still a failure.
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(succeeded_body()))
        .mount(&server)
        .await;

    let config = config_for(&server, Arc::new(InMemoryStorage::new("https://cdn.test")), 30);
    let err = capture(b"bytes", "image/jpeg", "r.jpg", &config).await.unwrap_err();
    match err {
        ReceiptError::AnalysisSubmissionFailed { status, .. } => assert_eq!(status, Some(200)),
        other => panic!("expected AnalysisSubmissionFailed, got {other:?}"),
    }

    let polls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == OPERATION_PATH)
        .count();
    assert_eq!(polls, 0, "a failed submission must never enter the poll loop");
}

#[tokio::test]
async fn missing_operation_location_is_submission_failure() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let config = config_for(&server, Arc::new(InMemoryStorage::new("https://cdn.test")), 30);
    let err = capture(b"bytes", "image/jpeg", "r.jpg", &config).await.unwrap_err();
    match err {
        ReceiptError::AnalysisSubmissionFailed { status, body } => {
            assert_eq!(status, Some(202));
            assert!(body.contains("operation-location"));
        }
        other => panic!("expected AnalysisSubmissionFailed, got {other:?}"),
    }
}

// ── Storage failures ─────────────────────────────────────────────────────

#[tokio::test]
async fn storage_unavailable_aborts_before_submission() {
    setup_tracing();
    let server = MockServer::start().await;

    let storage = Arc::new(InMemoryStorage::new("https://cdn.test"));
    storage.set_unavailable(true);
    let config = config_for(&server, storage, 30);

    let err = capture(b"bytes", "image/jpeg", "r.jpg", &config).await.unwrap_err();
    assert!(matches!(err, ReceiptError::StorageUnavailable { .. }));
    assert!(
        server.received_requests().await.unwrap().is_empty(),
        "nothing reaches the vendor when storage is down"
    );
}

// ── Empty extraction ─────────────────────────────────────────────────────

#[tokio::test]
async fn zero_documents_yields_default_receipt() {
    setup_tracing();
    let server = MockServer::start().await;
    mount_submit_accepted(&server).await;
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "succeeded",
            "analyzeResult": { "documents": [] }
        })))
        .mount(&server)
        .await;

    let config = config_for(&server, Arc::new(InMemoryStorage::new("https://cdn.test")), 5);
    let output = capture(b"bytes", "image/png", "blank.png", &config).await.unwrap();

    let expected = CanonicalReceipt::empty(output.receipt.source_image_url.clone());
    assert_eq!(output.receipt, expected);
    assert!(output.receipt.source_image_url.starts_with("https://cdn.test/"));
}

// ── Progress events ──────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl RecordingCallback {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
    fn push(&self, e: impl Into<String>) {
        self.events.lock().unwrap().push(e.into());
    }
}

impl CaptureProgressCallback for RecordingCallback {
    fn on_upload_start(&self, _byte_len: usize) {
        self.push("upload_start");
    }
    fn on_uploaded(&self, _key: &str) {
        self.push("uploaded");
    }
    fn on_submitted(&self, _operation_url: &str) {
        self.push("submitted");
    }
    fn on_poll_attempt(&self, attempt: u32, _budget: u32) {
        self.push(format!("poll:{attempt}"));
    }
    fn on_analyzed(&self, _poll_attempts: u32) {
        self.push("analyzed");
    }
    fn on_complete(&self, terminal_state: &str) {
        self.push(format!("complete:{terminal_state}"));
    }
}

#[tokio::test]
async fn progress_events_follow_the_state_machine() {
    setup_tracing();
    let server = MockServer::start().await;
    mount_submit_accepted(&server).await;
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_body()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(succeeded_body()))
        .mount(&server)
        .await;

    let recorder = Arc::new(RecordingCallback::default());
    let config = CaptureConfig::builder()
        .endpoint(server.uri())
        .api_key("test-key")
        .storage(Arc::new(InMemoryStorage::new("https://cdn.test")))
        .poll_interval(Duration::from_millis(5))
        .max_poll_attempts(10)
        .progress_callback(Arc::clone(&recorder) as Arc<dyn CaptureProgressCallback>)
        .build()
        .unwrap();

    capture(b"bytes", "image/jpeg", "r.jpg", &config).await.unwrap();

    assert_eq!(
        recorder.events(),
        vec![
            "upload_start",
            "uploaded",
            "submitted",
            "poll:1",
            "poll:2",
            "analyzed",
            "complete:normalized"
        ]
    );
}

#[tokio::test]
async fn progress_reports_failed_terminal_state() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let recorder = Arc::new(RecordingCallback::default());
    let config = CaptureConfig::builder()
        .endpoint(server.uri())
        .api_key("test-key")
        .storage(Arc::new(InMemoryStorage::new("https://cdn.test")))
        .progress_callback(Arc::clone(&recorder) as Arc<dyn CaptureProgressCallback>)
        .build()
        .unwrap();

    let _ = capture(b"bytes", "image/jpeg", "r.jpg", &config).await.unwrap_err();
    assert_eq!(
        recorder.events().last().map(String::as_str),
        Some("complete:submission_failed")
    );
}

// ── Persistence boundary ─────────────────────────────────────────────────

#[tokio::test]
async fn capture_and_persist_files_the_receipt() {
    setup_tracing();
    let server = MockServer::start().await;
    mount_submit_accepted(&server).await;
    Mock::given(method("GET"))
        .and(path(OPERATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(succeeded_body()))
        .mount(&server)
        .await;

    let config = config_for(&server, Arc::new(InMemoryStorage::new("https://cdn.test")), 5);
    let repo = InMemoryRepository::new();

    let stored = capture_and_persist(
        b"bytes",
        "image/jpeg",
        "coffee.jpg",
        "user-7",
        "groceries",
        &config,
        &repo,
    )
    .await
    .expect("capture and persist");

    assert_eq!(stored.user_id, "user-7");
    assert_eq!(stored.category, "groceries");
    assert_eq!(stored.receipt.store_name, "Trader Joe's");
    assert_eq!(repo.len(), 1);
}

// ── Input validation (no vendor involved) ────────────────────────────────

#[tokio::test]
async fn rejected_input_never_touches_the_network() {
    setup_tracing();
    let server = MockServer::start().await;
    let config = config_for(&server, Arc::new(InMemoryStorage::new("https://cdn.test")), 5);

    let err = capture(b"", "image/jpeg", "r.jpg", &config).await.unwrap_err();
    assert!(matches!(err, ReceiptError::EmptyImage));

    let err = capture(b"pdf", "application/pdf", "r.pdf", &config).await.unwrap_err();
    assert!(matches!(err, ReceiptError::UnsupportedImageType { .. }));

    assert!(server.received_requests().await.unwrap().is_empty());
}
