//! HTTP-level tests for the ML client against a mock service.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::{MlClient, MlClientConfig, UNREACHABLE_MESSAGE};
use crate::types::AnalysisRequest;
use csense_models::AnalysisResult;

// =============================================================================
// Test Helpers
// =============================================================================

fn client_for(base_url: &str) -> MlClient {
    MlClient::new(MlClientConfig {
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

async fn mock_analyze(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

async fn sent_body(server: &MockServer) -> String {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "exactly one attempt expected");
    String::from_utf8_lossy(&requests[0].body).into_owned()
}

fn unused_local_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

// =============================================================================
// Success Responses
// =============================================================================

#[tokio::test]
async fn test_pneumonia_scenario() {
    let server = MockServer::start().await;
    mock_analyze(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "diagnosis": "Pneumonia",
            "confidence": 0.94,
            "class_scores": {"Normal": 0.04, "Pneumonia": 0.94, "COVID-19": 0.02}
        })),
    )
    .await;

    let result = client_for(&server.uri())
        .submit(vec![7u8; 10], "https://store/x.jpg", true)
        .await;

    let diagnosis = result.diagnosis().expect("expected success");
    assert_eq!(diagnosis.label, "Pneumonia");
    assert_eq!(diagnosis.confidence, 0.94);
    assert_eq!(
        diagnosis.class_scores,
        HashMap::from([
            ("Normal".to_string(), 0.04),
            ("Pneumonia".to_string(), 0.94),
            ("COVID-19".to_string(), 0.02),
        ])
    );
    assert!(diagnosis.heatmap_url.is_none());
}

#[tokio::test]
async fn test_heatmap_url_is_returned() {
    let server = MockServer::start().await;
    mock_analyze(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "diagnosis": "COVID-19",
            "confidence": 0.71,
            "class_scores": {"COVID-19": 0.71},
            "heatmap_url": "https://store/heat/x.png"
        })),
    )
    .await;

    let result = client_for(&server.uri())
        .submit(vec![1, 2, 3], "https://store/x.jpg", true)
        .await;

    let diagnosis = result.diagnosis().unwrap();
    assert_eq!(diagnosis.heatmap_url.as_deref(), Some("https://store/heat/x.png"));
}

#[tokio::test]
async fn test_missing_fields_use_defaults() {
    let server = MockServer::start().await;
    mock_analyze(&server, ResponseTemplate::new(200).set_body_json(json!({}))).await;

    let result = client_for(&server.uri())
        .submit(vec![1], "https://store/x.jpg", false)
        .await;

    let diagnosis = result.diagnosis().unwrap();
    assert_eq!(diagnosis.label, "Unknown");
    assert_eq!(diagnosis.confidence, 0.0);
    assert!(diagnosis.class_scores.is_empty());
    assert!(diagnosis.heatmap_url.is_none());
}

#[tokio::test]
async fn test_non_numeric_class_score_dropped() {
    let server = MockServer::start().await;
    mock_analyze(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "diagnosis": "Normal",
            "confidence": 0.9,
            "class_scores": {"Normal": 0.9, "Pneumonia": "low", "COVID-19": 0.1}
        })),
    )
    .await;

    let result = client_for(&server.uri())
        .submit(vec![1], "https://store/x.jpg", false)
        .await;

    let scores = &result.diagnosis().unwrap().class_scores;
    assert_eq!(scores.len(), 2);
    assert_eq!(scores["Normal"], 0.9);
    assert_eq!(scores["COVID-19"], 0.1);
    assert!(!scores.contains_key("Pneumonia"));
}

// =============================================================================
// Request Shape
// =============================================================================

#[tokio::test]
async fn test_request_form_fields() {
    let server = MockServer::start().await;
    mock_analyze(&server, ResponseTemplate::new(200).set_body_json(json!({}))).await;

    client_for(&server.uri())
        .submit(b"JPEGDATA10".to_vec(), "https://store/x.jpg", false)
        .await;

    let body = sent_body(&server).await;
    assert!(body.contains("name=\"image_url\"\r\n\r\nhttps://store/x.jpg\r\n"));
    assert!(body.contains("name=\"heatmap\"\r\n\r\nfalse\r\n"));
    assert!(body.contains("name=\"file\"; filename=\"xray.jpg\""));
    assert!(body.contains("JPEGDATA10"));
}

#[tokio::test]
async fn test_heatmap_true_is_sent_as_literal() {
    let server = MockServer::start().await;
    mock_analyze(&server, ResponseTemplate::new(200).set_body_json(json!({}))).await;

    let request = AnalysisRequest::new(vec![1, 2], "https://store/y.jpg").with_heatmap(true);
    client_for(&server.uri()).analyze(request).await;

    let body = sent_body(&server).await;
    assert!(body.contains("name=\"heatmap\"\r\n\r\ntrue\r\n"));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_server_error_status() {
    let server = MockServer::start().await;
    mock_analyze(&server, ResponseTemplate::new(500).set_body_string("boom")).await;

    let result = client_for(&server.uri())
        .submit(vec![1], "https://store/x.jpg", false)
        .await;

    let message = result.error_message().expect("expected failure");
    assert!(message.contains("500"));
    assert!(message.contains("Check your ML endpoint"));
}

#[tokio::test]
async fn test_non_200_success_status_is_failure() {
    let server = MockServer::start().await;
    mock_analyze(&server, ResponseTemplate::new(202).set_body_json(json!({"diagnosis": "Normal"}))).await;

    let result = client_for(&server.uri())
        .submit(vec![1], "https://store/x.jpg", false)
        .await;

    assert!(result.error_message().unwrap().contains("202"));
}

#[tokio::test]
async fn test_no_retry_on_failure() {
    let server = MockServer::start().await;
    mock_analyze(&server, ResponseTemplate::new(503)).await;

    let result = client_for(&server.uri())
        .submit(vec![1], "https://store/x.jpg", false)
        .await;

    assert!(!result.is_success());
    // expect(1) on the mock is verified when the server drops
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreachable_server() {
    let result = client_for(&unused_local_url())
        .submit(vec![1], "https://store/x.jpg", false)
        .await;

    assert_eq!(
        result,
        AnalysisResult::Failure {
            message: UNREACHABLE_MESSAGE.to_string()
        }
    );
}

#[tokio::test]
async fn test_timeout_failure_mentions_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"diagnosis": "Normal"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = MlClient::new(MlClientConfig {
        base_url: server.uri(),
        timeout: Duration::from_millis(200),
    })
    .unwrap();

    let result = client.submit(vec![1], "https://store/x.jpg", false).await;

    let message = result.error_message().expect("expected failure");
    assert!(message.starts_with("Request timed out"), "{}", message);
    assert!(message.contains("timed out"));
    assert_ne!(message, UNREACHABLE_MESSAGE);
}

#[tokio::test]
async fn test_non_json_body_is_failure() {
    let server = MockServer::start().await;
    mock_analyze(&server, ResponseTemplate::new(200).set_body_string("<html>ok</html>")).await;

    let result = client_for(&server.uri())
        .submit(vec![1], "https://store/x.jpg", false)
        .await;

    assert!(result.error_message().unwrap().starts_with("Invalid response"));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_submissions_are_independent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "diagnosis": "Normal",
            "confidence": 0.99
        })))
        .expect(8)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .submit(vec![i as u8; 16], format!("https://store/{}.jpg", i), i % 2 == 0)
                    .await
            })
        })
        .collect();

    for handle in handles {
        let result = tokio_test::assert_ok!(handle.await);
        assert_eq!(result.diagnosis().unwrap().label, "Normal");
    }
}
