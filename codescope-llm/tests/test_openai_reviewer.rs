//! Integration tests for OpenAiCompatibleReviewer using wiremock

use std::sync::Arc;
use std::time::Duration;

use codescope_core::domain::analysis::{AnalysisId, AnalysisType, RepositoryId, SourceFile};
use codescope_llm::domain::{ModelReviewer, ReviewerError};
use codescope_llm::{
    AiAnalysisCoordinator, CoordinatorConfig, OpenAiCompatibleReviewer, RetryPolicy,
    RetryingReviewer,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_reviewer(mock_server: &MockServer) -> OpenAiCompatibleReviewer {
    OpenAiCompatibleReviewer::new("test-model")
        .with_base_url(mock_server.uri())
        .with_api_key("test-api-key")
}

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn test_review_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(bearer_token("test-api-key"))
        .and(body_partial_json(serde_json::json!({ "model": "test-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("[]")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let reviewer = create_reviewer(&mock_server);
    let text = reviewer.review("Review this").await.unwrap();

    assert_eq!(text, "[]");
    assert_eq!(reviewer.model(), "test-model");
}

#[tokio::test]
async fn test_review_rate_limited_carries_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_string("slow down"),
        )
        .mount(&mock_server)
        .await;

    let error = create_reviewer(&mock_server)
        .review("Review this")
        .await
        .unwrap_err();

    assert!(error.is_retryable());
    assert_eq!(error.retry_after(), Some(Duration::from_secs(7)));
    assert!(error.to_string().contains("Rate limited"));
}

#[tokio::test]
async fn test_review_authentication_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&mock_server)
        .await;

    let error = create_reviewer(&mock_server)
        .review("Review this")
        .await
        .unwrap_err();

    assert!(matches!(error, ReviewerError::Authentication(_)));
    assert!(!error.is_retryable());
}

#[tokio::test]
async fn test_review_without_choices_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
        .mount(&mock_server)
        .await;

    let error = create_reviewer(&mock_server)
        .review("Review this")
        .await
        .unwrap_err();

    assert!(matches!(error, ReviewerError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_retrying_reviewer_recovers_from_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("[]")))
        .mount(&mock_server)
        .await;

    let reviewer = RetryingReviewer::new(
        create_reviewer(&mock_server),
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
        },
    );

    assert_eq!(reviewer.review("Review this").await.unwrap(), "[]");
}

#[tokio::test]
async fn test_coordinator_over_http() {
    let mock_server = MockServer::start().await;
    let findings = r#"```json
[{"title": "SQL injection", "description": "User input concatenated into query",
  "severity": "high", "category": "security", "filePath": "db.py", "lineStart": 4}]
```"#;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(findings)))
        .mount(&mock_server)
        .await;

    let coordinator = AiAnalysisCoordinator::new(
        Arc::new(create_reviewer(&mock_server)),
        CoordinatorConfig::default(),
    );
    let files = vec![SourceFile::new(
        "db.py",
        "Python",
        "def find(name):\n    q = 'SELECT * FROM users WHERE name = ' + name\n    return run(q)\n",
    )];

    let outcome = coordinator
        .analyze_code(
            &files,
            AnalysisType::Security,
            RepositoryId::generate(),
            AnalysisId::generate(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.findings.len(), 1);
    assert_eq!(outcome.findings[0].line_start, Some(4));
    assert_eq!(outcome.scores.security, 80);
    // The summary call gets the same findings array back, so the templated summary is used.
    assert!(outcome.summary.overview.contains("high-severity"));
}
