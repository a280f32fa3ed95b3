/*!
 * Tests for error classification and conversion
 */

use srtnotes::errors::{AppError, EnrichmentError, ProviderError, SubtitleError};

/// Test HTTP status classification
#[test]
fn test_from_status_shouldClassifyRateLimitAndAuth() {
    assert!(ProviderError::from_status(429, "slow down").is_rate_limited());
    assert!(matches!(ProviderError::from_status(401, "no"), ProviderError::AuthenticationError(_)));
    assert!(matches!(ProviderError::from_status(403, "no"), ProviderError::AuthenticationError(_)));
    assert_eq!(
        ProviderError::from_status(503, "down"),
        ProviderError::ApiError { status_code: 503, message: "down".to_string() }
    );
}

/// Test which errors abort a whole stage
#[test]
fn test_is_stage_fatal_shouldOnlyFlagAuthAndStageFailures() {
    let auth = EnrichmentError::from(ProviderError::AuthenticationError("bad key".to_string()));
    let server = EnrichmentError::from(ProviderError::from_status(500, "boom"));
    let limited = EnrichmentError::from(ProviderError::RateLimitExceeded("budget".to_string()));

    assert!(auth.is_stage_fatal());
    assert!(EnrichmentError::StageFailed("no key".to_string()).is_stage_fatal());
    assert!(!server.is_stage_fatal());
    assert!(!limited.is_stage_fatal());
    assert!(!EnrichmentError::Cancelled.is_stage_fatal());
}

/// Test error messages
#[test]
fn test_error_display_shouldIncludeDetails() {
    let error = SubtitleError::MalformedRecord { line: 12, reason: "expected a time line".to_string() };
    assert_eq!(error.to_string(), "Malformed subtitle record at line 12: expected a time line");

    let error = EnrichmentError::from(ProviderError::ApiError { status_code: 500, message: "boom".to_string() });
    assert_eq!(error.to_string(), "Remote call failed: API responded with error: 500 - boom");
}

/// Test conversions into the application error
#[test]
fn test_app_error_conversions_shouldWrapSources() {
    let app: AppError = SubtitleError::InvalidTargetLength.into();
    assert!(matches!(app, AppError::Subtitle(_)));

    let app: AppError = EnrichmentError::Cancelled.into();
    assert!(matches!(app, AppError::Enrichment(EnrichmentError::Cancelled)));

    let app: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
    assert!(matches!(app, AppError::File(_)));

    let app: AppError = anyhow::anyhow!("inner").context("outer").into();
    assert_eq!(app.to_string(), "Unknown error: outer: inner");
}
