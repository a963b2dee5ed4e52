//! Integration tests for the IMDS client using wiremock

use node_bootstrap::BootstrapError;
use node_bootstrap::metadata::imds::Imds;
use node_bootstrap::metadata::{MetadataSource, resolve_context};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IDENTITY_DOCUMENT: &str = r#"{
  "accountId" : "123456789012",
  "architecture" : "x86_64",
  "availabilityZone" : "eu-west-1a",
  "imageId" : "ami-0abcdef1234567890",
  "instanceId" : "i-1234567890abcdef0",
  "instanceType" : "m5.large",
  "pendingTime" : "2024-01-01T00:00:00Z",
  "privateIp" : "10.0.1.5",
  "region" : "eu-west-1",
  "version" : "2017-09-30"
}"#;

async fn mount_token(server: &MockServer) {
    Mock::given(method("PUT"))
        .and(path("/latest/api/token"))
        .and(header_exists("X-aws-ec2-metadata-token-ttl-seconds"))
        .respond_with(ResponseTemplate::new(200).set_body_string("test-token"))
        .mount(server)
        .await;
}

async fn mount_get(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("X-aws-ec2-metadata-token", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Resolve the full instance context over IMDSv2
#[tokio::test]
async fn test_resolve_context_imdsv2() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_get(&server, "/latest/meta-data/placement/availability-zone", "eu-west-1a").await;
    mount_get(&server, "/latest/meta-data/instance-id", "i-1234567890abcdef0\n").await;
    mount_get(&server, "/latest/dynamic/instance-identity/document", IDENTITY_DOCUMENT).await;

    let imds = Imds::with_base_url(server.uri()).unwrap();
    let context = resolve_context(&imds).await.unwrap();

    assert_eq!(context.availability_zone, "eu-west-1a");
    assert_eq!(context.instance_id, "i-1234567890abcdef0");
    assert_eq!(context.private_ip, "10.0.1.5");
}

/// Without a token endpoint the client falls back to IMDSv1
#[tokio::test]
async fn test_imdsv1_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/latest/api/token"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/latest/meta-data/instance-id"))
        .respond_with(ResponseTemplate::new(200).set_body_string("i-v1only"))
        .mount(&server)
        .await;

    let imds = Imds::with_base_url(server.uri()).unwrap();
    assert_eq!(imds.instance_id().await.unwrap(), "i-v1only");
}

/// A missing metadata path is a metadata error
#[tokio::test]
async fn test_missing_path_is_metadata_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/latest/meta-data/placement/availability-zone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let imds = Imds::with_base_url(server.uri()).unwrap();
    let result = imds.availability_zone().await;

    match result {
        Err(BootstrapError::Metadata(message)) => assert!(message.contains("404")),
        other => panic!("Expected Metadata error, got {:?}", other),
    }
}

/// A garbled identity document is rejected
#[tokio::test]
async fn test_invalid_identity_document() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_get(&server, "/latest/dynamic/instance-identity/document", "not json").await;

    let imds = Imds::with_base_url(server.uri()).unwrap();
    let result = imds.identity_document().await;

    assert!(matches!(result, Err(BootstrapError::Metadata(_))));
}

/// An unreachable endpoint fails instead of hanging
#[tokio::test]
async fn test_unreachable_endpoint() {
    let imds = Imds::with_base_url("http://127.0.0.1:9").unwrap();
    let result = imds.instance_id().await;

    assert!(matches!(result, Err(BootstrapError::Metadata(_))));
}
