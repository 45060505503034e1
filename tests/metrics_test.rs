//! Metrics emitted by the gateway, captured with
//! `metrics_util::debugging::DebuggingRecorder`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use bananaai::providers::{ImageProvider, RetryConfig, TextProvider};
use bananaai::ratelimit::RateLimitConfig;
use bananaai::telemetry;
use bananaai::{
    AssistRequest, ClientKey, ExpandOptions, Gateway, GenerateRequest, GeneratedImage,
    ImageOptions, OperationClass, Outcome, TextExpansion,
};

// ============================================================================
// Mock providers
// ============================================================================

struct OkText;

#[async_trait]
impl TextProvider for OkText {
    fn name(&self) -> &str {
        "ok"
    }

    async fn expand(&self, _s: &str, _u: &str, _o: &ExpandOptions) -> Outcome<TextExpansion> {
        Outcome::Success(TextExpansion {
            text: "expanded".into(),
            model: "m".into(),
            truncated: false,
        })
    }
}

struct EmptyImage;

#[async_trait]
impl ImageProvider for EmptyImage {
    fn name(&self) -> &str {
        "empty"
    }

    fn model(&self) -> &str {
        "empty-model"
    }

    async fn generate_image(&self, _p: &str, _o: &ImageOptions) -> Outcome<GeneratedImage> {
        Outcome::Empty
    }
}

fn gateway() -> Gateway {
    Gateway::builder()
        .text_provider(Arc::new(OkText))
        .image_provider(Arc::new(EmptyImage))
        .rate_limit(RateLimitConfig::new().limit(OperationClass::Assist, 2))
        .retry(RetryConfig::new().base_delay(Duration::from_millis(1)))
        .build()
        .unwrap()
}

// ============================================================================
// Snapshot helpers
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Counter value for `name` carrying the label `label=value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(c) => *c,
            _ => 0,
        })
        .sum()
}

fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Run async gateway calls inside a local recorder scope.
fn record<F, Fut>(f: F) -> SnapshotVec
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(f()))
    });
    snapshotter.snapshot().into_vec()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cache_hit_and_miss_are_counted() {
    let snapshot = record(|| async {
        let gw = gateway();
        let client = ClientKey::from("c");
        gw.assist(&client, AssistRequest::new("a")).await.unwrap();
        gw.assist(&client, AssistRequest::new("a")).await.unwrap();
    });

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "ok"),
        2
    );
    assert!(has_histogram(&snapshot, telemetry::PROVIDER_DURATION_SECONDS));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn denial_is_counted_but_not_as_request() {
    let snapshot = record(|| async {
        let gw = gateway();
        let client = ClientKey::from("c");
        for i in 0..3 {
            let _ = gw.assist(&client, AssistRequest::new(format!("p{i}"))).await;
        }
    });

    assert_eq!(
        counter_with_label(&snapshot, telemetry::RATE_LIMITED_TOTAL, "operation", "assist"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn degraded_generation_records_retries_and_fallback() {
    let snapshot = record(|| async {
        let gw = gateway();
        let response = gw
            .generate(&ClientKey::from("c"), GenerateRequest::new("p"))
            .await
            .unwrap();
        assert!(response.image.degraded);
    });

    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 2);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::PROVIDER_OUTCOMES_TOTAL, "outcome", "empty"),
        3
    );
    assert_eq!(counter_total(&snapshot, telemetry::DEGRADED_TOTAL), 1);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    let gw = gateway();
    gw.assist(&ClientKey::from("c"), AssistRequest::new("a"))
        .await
        .unwrap();
}
