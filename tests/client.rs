use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use mockito::Matcher;
use recontext::{
    GenerationOutcome, GenerationRequest, PredictionPolicy, RecontextClient, RecontextConfig,
    RecontextError, Result, Stage, StaticTokenProvider, SubjectImage, TokenProvider, Translator,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PREDICT_PATH: &str =
    "/v1/projects/test-proj/locations/us-central1/publishers/google/models/imagen-product-recontext-preview-06-30:predict";

fn client(api_base: &str) -> RecontextClient {
    let config = RecontextConfig::new()
        .with_project("test-proj")
        .with_region("us-central1")
        .with_api_base(api_base)
        .with_timeout(Duration::from_secs(5));
    RecontextClient::new(config, Arc::new(StaticTokenProvider::new("test-token"))).unwrap()
}

fn request() -> GenerationRequest {
    GenerationRequest::new("a man in a blue business suit", "a busy street in Tokyo at night")
        .with_image(SubjectImage::new(b"first".to_vec()))
        .with_image(SubjectImage::new(b"second".to_vec()))
}

#[tokio::test]
async fn test_generate_sends_contract_payload() {
    let mut server = mockito::Server::new_async().await;
    let expected = json!({
        "instances": [{
            "prompt": "a busy street in Tokyo at night",
            "productImages": [
                {"image": {"bytesBase64Encoded": BASE64.encode(b"first")}},
                {"image": {"bytesBase64Encoded": BASE64.encode(b"second")}}
            ],
            "productDescription": "a man in a blue business suit"
        }],
        "parameters": {
            "sampleCount": 1,
            "baseSteps": 32,
            "enhancePrompt": true,
            "personGeneration": "allow_adult",
            "seed": 12345
        }
    });
    let mock = server
        .mock("POST", PREDICT_PATH)
        .match_header("authorization", "Bearer test-token")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(expected))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"predictions": [{"bytesBase64Encoded": BASE64.encode(b"result")}]}).to_string())
        .create_async()
        .await;

    let outcome = client(&server.url())
        .generate(request().with_seed(Some(12345)))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(outcome.images().len(), 1);
    assert_eq!(outcome.images()[0].bytes, b"result".to_vec());
}

#[tokio::test]
async fn test_http_error_surfaces_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PREDICT_PATH)
        .with_status(403)
        .with_body(r#"{"error":"denied"}"#)
        .create_async()
        .await;

    let submission = client(&server.url()).submit(request()).await;

    assert_eq!(submission.state, Stage::Failed);
    assert_eq!(submission.failed_at, Some(Stage::Sending));
    assert!(submission.images().is_empty());
    match submission.error() {
        Some(RecontextError::Http {
            status,
            reason,
            body,
        }) => {
            assert_eq!(*status, 403);
            assert_eq!(reason, "Forbidden");
            assert!(body.contains("denied"));
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
    assert!(submission.user_message().contains("HTTP Error: 403 Forbidden"));
    assert!(submission.user_message().contains("denied"));
}

#[tokio::test]
async fn test_empty_predictions_is_warning() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PREDICT_PATH)
        .with_status(200)
        .with_body(r#"{"predictions": []}"#)
        .create_async()
        .await;

    let submission = client(&server.url()).submit(request()).await;

    assert!(submission.is_done());
    assert!(submission.images().is_empty());
    assert!(matches!(
        submission.outcome,
        Ok(GenerationOutcome::Empty { .. })
    ));
    assert!(submission.user_message().contains("no predictions were found"));
}

#[tokio::test]
async fn test_prediction_without_image_is_skipped() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PREDICT_PATH)
        .with_status(200)
        .with_body(
            json!({"predictions": [
                {"bytesBase64Encoded": BASE64.encode(b"X")},
                {"no_image_field": true}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let outcome = client(&server.url()).generate(request()).await.unwrap();
    assert_eq!(outcome.images().len(), 1);
    assert_eq!(outcome.images()[0].bytes, b"X".to_vec());

    let strict = client(&server.url())
        .with_translator(Translator::new().with_prediction_policy(PredictionPolicy::RejectMissing));
    let err = strict.generate(request()).await.unwrap_err();
    assert!(matches!(err, RecontextError::Decode(_)));
}

#[tokio::test]
async fn test_more_than_three_images_are_truncated() {
    let mut server = mockito::Server::new_async().await;
    let images: Vec<_> = (0..3)
        .map(|i| json!({"image": {"bytesBase64Encoded": BASE64.encode([i as u8])}}))
        .collect();
    let mock = server
        .mock("POST", PREDICT_PATH)
        .match_body(Matcher::Json(json!({
            "instances": [{
                "prompt": "on a wooden desk",
                "productImages": images,
                "productDescription": "a mug"
            }],
            "parameters": {
                "sampleCount": 1,
                "baseSteps": 32,
                "enhancePrompt": true,
                "personGeneration": "allow_adult"
            }
        })))
        .with_status(200)
        .with_body(r#"{"predictions": []}"#)
        .create_async()
        .await;

    let request = GenerationRequest::new("a mug", "on a wooden desk")
        .with_images((0..5).map(|i| SubjectImage::new(vec![i as u8])));
    client(&server.url()).generate(request).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_field_makes_no_http_call() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = client(&server.url());
    for request in [
        GenerationRequest::new("a mug", "on a desk"),
        GenerationRequest::new("", "on a desk").with_image(SubjectImage::new(vec![1])),
        GenerationRequest::new("a mug", "").with_image(SubjectImage::new(vec![1])),
    ] {
        let submission = client.submit(request).await;
        assert_eq!(submission.failed_at, Some(Stage::Validating));
        assert!(submission.error().unwrap().is_validation());
    }

    let no_project = RecontextClient::new(
        RecontextConfig::new().with_api_base(server.url()),
        Arc::new(StaticTokenProvider::new("test-token")),
    )
    .unwrap();
    let err = no_project.generate(request()).await.unwrap_err();
    assert!(err.is_validation());

    mock.assert_async().await;
}

struct FailingTokens(AtomicUsize);

#[async_trait::async_trait]
impl TokenProvider for FailingTokens {
    async fn access_token(&self) -> Result<String> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Err(RecontextError::Auth("refresh failed".into()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[tokio::test]
async fn test_auth_failure_stops_before_sending() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let tokens = Arc::new(FailingTokens(AtomicUsize::new(0)));
    let config = RecontextConfig::new()
        .with_project("test-proj")
        .with_api_base(server.url());
    let client = RecontextClient::new(config, tokens.clone()).unwrap();

    let submission = client.submit(request()).await;
    assert_eq!(submission.failed_at, Some(Stage::Authenticating));
    assert!(matches!(submission.error(), Some(RecontextError::Auth(_))));
    assert_eq!(tokens.0.load(Ordering::SeqCst), 1);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_response_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PREDICT_PATH)
        .with_status(200)
        .with_body("<html>oops</html>")
        .create_async()
        .await;

    let submission = client(&server.url()).submit(request()).await;
    assert_eq!(submission.failed_at, Some(Stage::Decoding));
    assert!(matches!(submission.error(), Some(RecontextError::Decode(_))));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_request_error() {
    // Nothing listens on port 9 (discard) on test machines.
    let err = client("http://127.0.0.1:9")
        .generate(request())
        .await
        .unwrap_err();
    assert!(matches!(err, RecontextError::Request(_)));
}
