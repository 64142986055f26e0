use super::*;

#[derive(Debug, thiserror::Error)]
enum Sample {
    #[error("thing {0} not found")]
    Missing(u32),
    #[error("backend hiccup")]
    Flaky,
}

impl ErrorCode for Sample {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing(_) => "E_SAMPLE_MISSING",
            Self::Flaky => "E_SAMPLE_FLAKY",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Flaky)
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Missing(_) => StatusCode::NOT_FOUND,
            Self::Flaky => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[test]
fn service_error_converts_with_code_and_status() {
    let err: ApiError = Sample::Missing(7).into();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert_eq!(err.code, "E_SAMPLE_MISSING");
    assert_eq!(err.message, "thing 7 not found");
    assert!(!err.retryable);
}

#[test]
fn retryable_flag_survives_conversion() {
    let err: ApiError = Sample::Flaky.into();
    assert!(err.retryable);
    assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn missing_field_is_bad_request() {
    let err = ApiError::missing_field("user_id");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.code, "E_MISSING_FIELD");
    assert_eq!(err.message, "user_id is required");
}

#[test]
fn require_rejects_blank_and_trims() {
    assert!(require("code", None).is_err());
    assert!(require("code", Some("   ")).is_err());
    assert_eq!(require("code", Some("  x = 1 ")).unwrap(), "x = 1");
}

#[tokio::test]
async fn into_response_renders_json_body() {
    let response = ApiError::missing_field("message").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "E_MISSING_FIELD");
    assert_eq!(body["error"], "message is required");
    assert_eq!(body["retryable"], false);
}
