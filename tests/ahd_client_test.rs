//! Integration tests for the Health Discovery client against a fake server

use ahd2fhir::adapters::ahd::{AhdClient, TextAnalyzer};
use ahd2fhir::config::{secret_string, AhdConfig, RetryConfig};
use ahd2fhir::domain::{AhdError, Annotation, AnnotationKind};
use base64::{engine::general_purpose, Engine as _};
use mockito::Matcher;
use serde_json::json;

const PIPELINE_PATH: &str =
    "/health-discovery/rest/v1/textanalysis/projects/nlp/pipelines/discharge";
const DIAGNOSIS: &str = "de.averbis.types.health.Diagnosis";

fn config(server_url: &str) -> AhdConfig {
    AhdConfig {
        url: format!("{server_url}/health-discovery"),
        api_token: Some(secret_string("test-token".to_string())),
        username: None,
        password: None,
        project: "nlp".to_string(),
        pipeline: "discharge".to_string(),
        api_version: "v1".to_string(),
        timeout_seconds: 5,
        tls_verify: true,
        retry: RetryConfig::default(),
    }
}

fn analysis_body() -> String {
    json!({
        "payload": [
            {
                "type": DIAGNOSIS,
                "id": 17,
                "begin": 12,
                "end": 20,
                "coveredText": "Diabetes",
                "conceptId": "E14.9",
                "dictCanon": "Diabetes mellitus",
                "source": "ICD10GM_2021"
            },
            {"type": "de.averbis.types.health.Laboratory", "begin": 0, "end": 3}
        ],
        "errorMessages": []
    })
    .to_string()
}

#[tokio::test]
async fn test_analyse_text_sends_text_and_parses_annotations() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", format!("{PIPELINE_PATH}/analyseText").as_str())
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("language".into(), "de".into()),
            Matcher::UrlEncoded("annotationTypes".into(), DIAGNOSIS.into()),
        ]))
        .match_header("api-token", "test-token")
        .match_header("content-type", "text/plain; charset=utf-8")
        .match_body("Patient hat Diabetes.")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(analysis_body())
        .create_async()
        .await;

    let client = AhdClient::new(&config(&server.url())).unwrap();
    let annotations = client
        .analyse_text("Patient hat Diabetes.", Some("de"), DIAGNOSIS)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(annotations.len(), 2);
    assert_eq!(annotations[0].kind(), Some(AnnotationKind::Diagnosis));
    assert!(matches!(
        &annotations[1],
        Annotation::Other { type_name } if type_name.ends_with("Laboratory")
    ));
}

#[tokio::test]
async fn test_analyse_html_uses_html_endpoint_without_language() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", format!("{PIPELINE_PATH}/analyseHtml").as_str())
        .match_query(Matcher::UrlEncoded("annotationTypes".into(), DIAGNOSIS.into()))
        .match_header("content-type", "text/html; charset=utf-8")
        .with_status(200)
        .with_body(r#"{"payload": [], "errorMessages": []}"#)
        .create_async()
        .await;

    let client = AhdClient::new(&config(&server.url())).unwrap();
    let annotations = client
        .analyse_html("<p>Keine Befunde</p>", None, DIAGNOSIS)
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(annotations.is_empty());
}

#[tokio::test]
async fn test_basic_auth_when_no_token() {
    let mut server = mockito::Server::new_async().await;
    let expected = format!(
        "Basic {}",
        general_purpose::STANDARD.encode("ahd2fhir:s3cret")
    );
    let mock = server
        .mock("POST", format!("{PIPELINE_PATH}/analyseText").as_str())
        .match_query(Matcher::Any)
        .match_header("authorization", expected.as_str())
        .match_header("api-token", Matcher::Missing)
        .with_status(200)
        .with_body(r#"{"payload": []}"#)
        .create_async()
        .await;

    let mut config = config(&server.url());
    config.api_token = None;
    config.username = Some("ahd2fhir".to_string());
    config.password = Some(secret_string("s3cret".to_string()));

    let client = AhdClient::new(&config).unwrap();
    client.analyse_text("text", None, DIAGNOSIS).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_classification() {
    let mut server = mockito::Server::new_async().await;
    let client = AhdClient::new(&config(&server.url())).unwrap();

    let cases = [
        (401, "unauthorized"),
        (403, "forbidden"),
        (404, "pipeline not found"),
        (503, "pipeline not started"),
    ];

    for (status, body) in cases {
        let mock = server
            .mock("POST", format!("{PIPELINE_PATH}/analyseText").as_str())
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body(body)
            .create_async()
            .await;

        let err = client.analyse_text("text", None, DIAGNOSIS).await.unwrap_err();
        match status {
            401 | 403 => assert!(matches!(err, AhdError::AuthenticationFailed(_)), "{err:?}"),
            404 => assert!(
                matches!(
                    err,
                    AhdError::ClientError { status: 404, ref message } if message == body
                ),
                "{err:?}"
            ),
            _ => assert!(matches!(err, AhdError::ServerError { status: 503, .. }), "{err:?}"),
        }

        mock.remove_async().await;
    }
}

#[tokio::test]
async fn test_error_messages_and_bad_json_are_invalid_responses() {
    let mut server = mockito::Server::new_async().await;
    let client = AhdClient::new(&config(&server.url())).unwrap();

    let mock = server
        .mock("POST", format!("{PIPELINE_PATH}/analyseText").as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"payload": null, "errorMessages": ["Pipeline discharge is not started"]}"#)
        .create_async()
        .await;
    let err = client.analyse_text("text", None, DIAGNOSIS).await.unwrap_err();
    assert!(matches!(err, AhdError::InvalidResponse(ref m) if m.contains("not started")));
    mock.remove_async().await;

    let mock = server
        .mock("POST", format!("{PIPELINE_PATH}/analyseText").as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>proxy error</html>")
        .create_async()
        .await;
    let err = client.analyse_text("text", None, DIAGNOSIS).await.unwrap_err();
    assert!(matches!(err, AhdError::InvalidResponse(_)));
    mock.remove_async().await;
}

#[tokio::test]
async fn test_unreachable_server_is_connection_failure() {
    // nothing listens on port 9 (discard) in the test environment
    let client = AhdClient::new(&config("http://127.0.0.1:9")).unwrap();
    let err = client.analyse_text("text", None, DIAGNOSIS).await.unwrap_err();
    assert!(
        matches!(err, AhdError::ConnectionFailed(_) | AhdError::Timeout(_)),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_build_info() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/health-discovery/rest/v1/buildInfo")
        .match_header("api-token", "test-token")
        .with_status(200)
        .with_body(
            r#"{"payload": {"specVersion": "6.10.0", "buildNumber": "1234"}, "errorMessages": []}"#,
        )
        .create_async()
        .await;

    let client = AhdClient::new(&config(&server.url())).unwrap();
    let info = client.build_info().await.unwrap();

    mock.assert_async().await;
    assert_eq!(info["specVersion"], "6.10.0");
}
