use std::time::Duration;

use bananaai::ratelimit::{Admission, RateLimitConfig, RateLimiter};
use bananaai::{ClientKey, OperationClass};
use tokio::time::Instant;

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn limiter(limit: u32) -> RateLimiter {
    RateLimiter::new(
        RateLimitConfig::new()
            .window(secs(60))
            .limit(OperationClass::Assist, limit),
    )
}

#[test]
fn fourth_request_in_window_is_denied_with_wait_hint() {
    let limiter = limiter(3);
    let client = ClientKey::from("10.0.0.1");
    let start = Instant::now();

    for t in 0..3 {
        let admission = limiter.check_and_record_at(&client, OperationClass::Assist, start + secs(t));
        assert_eq!(admission, Admission::Allowed, "request at t={t}");
    }

    let denied = limiter.check_and_record_at(&client, OperationClass::Assist, start + secs(3));
    assert_eq!(denied, Admission::Denied { retry_after: secs(57) });
    assert_eq!(denied.retry_after_secs(), Some(57.0));
}

#[test]
fn oldest_request_ageing_out_readmits() {
    let limiter = limiter(2);
    let client = ClientKey::from("c");
    let start = Instant::now();

    assert!(limiter.check_and_record_at(&client, OperationClass::Assist, start).is_allowed());
    assert!(
        limiter
            .check_and_record_at(&client, OperationClass::Assist, start + secs(10))
            .is_allowed()
    );
    assert!(
        !limiter
            .check_and_record_at(&client, OperationClass::Assist, start + secs(59))
            .is_allowed()
    );
    // Exactly one window after the first request it no longer counts.
    assert!(
        limiter
            .check_and_record_at(&client, OperationClass::Assist, start + secs(60))
            .is_allowed()
    );
    // The one admitted at +60s and the one at +10s fill the window again.
    let denied = limiter.check_and_record_at(&client, OperationClass::Assist, start + secs(61));
    assert_eq!(denied.retry_after(), Some(secs(9)));
}

#[test]
fn evenly_spaced_requests_are_never_denied() {
    let limiter = limiter(10);
    let client = ClientKey::from("steady");
    let start = Instant::now();

    // 10 per minute, one every 6s, for ten minutes.
    for i in 0..100 {
        let at = start + secs(6 * i);
        assert!(
            limiter.check_and_record_at(&client, OperationClass::Assist, at).is_allowed(),
            "request {i} denied"
        );
    }
}

#[test]
fn burst_across_minute_boundary_is_denied() {
    let limiter = limiter(5);
    let client = ClientKey::from("burst");
    let start = Instant::now();

    for _ in 0..5 {
        assert!(
            limiter
                .check_and_record_at(&client, OperationClass::Assist, start + secs(59))
                .is_allowed()
        );
    }
    // A fixed per-minute bucket would reset here; the sliding window does not.
    assert!(
        !limiter
            .check_and_record_at(&client, OperationClass::Assist, start + secs(61))
            .is_allowed()
    );
}

#[test]
fn clients_and_classes_are_isolated() {
    let limiter = RateLimiter::new(
        RateLimitConfig::new()
            .limit(OperationClass::Assist, 1)
            .limit(OperationClass::Upload, 1),
    );
    let a = ClientKey::from("a");
    let b = ClientKey::from("b");
    let now = Instant::now();

    assert!(limiter.check_and_record_at(&a, OperationClass::Assist, now).is_allowed());
    assert!(!limiter.check_and_record_at(&a, OperationClass::Assist, now).is_allowed());
    assert!(limiter.check_and_record_at(&b, OperationClass::Assist, now).is_allowed());
    assert!(limiter.check_and_record_at(&a, OperationClass::Upload, now).is_allowed());
}

#[test]
fn default_limits_match_operation_classes() {
    let config = RateLimitConfig::default();
    assert_eq!(config.window, secs(60));
    assert_eq!(config.limit_for(OperationClass::Assist), 10);
    assert_eq!(config.limit_for(OperationClass::Upload), 5);
    assert_eq!(config.limit_for(OperationClass::Generate), 10);
}

#[test]
fn concurrent_requests_never_exceed_limit() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    let limiter = Arc::new(limiter(25));
    let admitted = Arc::new(AtomicU32::new(0));
    let now = Instant::now();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let admitted = Arc::clone(&admitted);
            std::thread::spawn(move || {
                let client = ClientKey::from("shared");
                for _ in 0..20 {
                    if limiter
                        .check_and_record_at(&client, OperationClass::Assist, now)
                        .is_allowed()
                    {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::Relaxed), 25);
}

#[tokio::test(start_paused = true)]
async fn wall_clock_admission_reopens_after_window() {
    let limiter = limiter(1);
    let client = ClientKey::from("paused");

    assert!(limiter.check_and_record(&client, OperationClass::Assist).is_allowed());
    assert!(!limiter.check_and_record(&client, OperationClass::Assist).is_allowed());

    tokio::time::advance(secs(60)).await;
    assert!(limiter.check_and_record(&client, OperationClass::Assist).is_allowed());
}
