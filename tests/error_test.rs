use std::time::Duration;

use bananaai::BananaError;

#[test]
fn caller_facing_status_codes() {
    assert_eq!(BananaError::Validation("x".into()).status_code(), 400);
    assert_eq!(
        BananaError::RateLimited {
            retry_after: Duration::from_secs(3)
        }
        .status_code(),
        429
    );
    assert_eq!(
        BananaError::ContentPolicy {
            reason: "SAFETY".into()
        }
        .status_code(),
        422
    );
    assert_eq!(BananaError::ServiceUnavailable("x".into()).status_code(), 503);
    assert_eq!(BananaError::Internal("x".into()).status_code(), 500);
    assert_eq!(BananaError::Configuration("x".into()).status_code(), 500);
}

#[test]
fn validation_message_is_passed_through() {
    let err = BananaError::Validation("Prompt is required".into());
    assert_eq!(err.public_message(), "Prompt is required");
    assert_eq!(err.to_string(), "validation error: Prompt is required");
}

#[test]
fn internal_details_are_not_public() {
    let io = BananaError::from(std::io::Error::other("/srv/uploads: permission denied"));
    assert_eq!(io.status_code(), 500);
    assert_eq!(io.public_message(), "Internal server error");
    assert!(io.to_string().contains("permission denied"));

    let unavailable = BananaError::ServiceUnavailable("401 API key not valid".into());
    assert_eq!(unavailable.public_message(), "Service temporarily unavailable");
}

#[test]
fn retry_after_only_for_rate_limit() {
    let limited = BananaError::RateLimited {
        retry_after: Duration::from_millis(1500),
    };
    assert_eq!(limited.retry_after(), Some(Duration::from_millis(1500)));
    assert_eq!(limited.public_message(), "Rate limit exceeded");
    assert_eq!(BananaError::Internal("x".into()).retry_after(), None);
}

#[test]
fn json_errors_convert() {
    let err: BananaError = serde_json::from_str::<serde_json::Value>("{")
        .unwrap_err()
        .into();
    assert!(matches!(err, BananaError::Json(_)));
}
