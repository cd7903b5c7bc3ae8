mod common;

use std::time::Duration;

use axum::http::Method;
use cfpurge::{
    application::cdn::{PurgeDispatcher, PurgeError},
    domain::credentials::CdnCredentials,
    infra::cloudflare::CloudflareClient,
};
use httpmock::MockServer;
use serde_json::json;
use url::Url;

use common::{EMAIL, KEY, PURGE_PATH, ZONE, success_body};

fn client(server: &MockServer) -> CloudflareClient {
    CloudflareClient::new(&common::settings(server).cloudflare).expect("cloudflare client")
}

fn creds() -> CdnCredentials {
    CdnCredentials::new(ZONE, EMAIL, KEY).expect("credentials")
}

#[tokio::test]
async fn purge_urls_sends_authenticated_delete() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("DELETE")
            .path(PURGE_PATH)
            .header("content-type", "application/json")
            .header("x-auth-email", EMAIL)
            .header("x-auth-key", KEY)
            .json_body(json!({ "files": ["https://ex.com/b", "https://ex.com/a"] }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(success_body());
    });

    let ack = client(&server)
        .purge_urls(
            &creds(),
            &[
                "https://ex.com/b".to_string(),
                "https://ex.com/a".to_string(),
                "https://ex.com/b".to_string(),
            ],
        )
        .await
        .expect("purge accepted");

    mock.assert();
    assert_eq!(ack.status, 200);
    assert_eq!(ack.purge_id.as_deref(), Some("purge-123"));
    assert!(ack.body.contains("\"success\":true"));
}

#[tokio::test]
async fn purge_everything_sends_flag_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("DELETE")
            .path(PURGE_PATH)
            .json_body(json!({ "purge_everything": true }));
        then.status(200).json_body(success_body());
    });

    client(&server)
        .purge_everything(&creds())
        .await
        .expect("purge accepted");

    mock.assert();
}

#[tokio::test]
async fn configured_method_is_used() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path(PURGE_PATH);
        then.status(200).json_body(success_body());
    });

    let mut settings = common::settings(&server).cloudflare;
    settings.purge_method = Method::POST;
    let client = CloudflareClient::new(&settings).expect("cloudflare client");

    client
        .purge_everything(&creds())
        .await
        .expect("purge accepted");
    mock.assert();
}

#[tokio::test]
async fn empty_url_list_fails_before_any_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.path(PURGE_PATH);
        then.status(200).json_body(success_body());
    });

    let err = client(&server)
        .purge_urls(&creds(), &[])
        .await
        .expect_err("empty purge must be rejected");

    assert!(matches!(err, PurgeError::InvalidInput(_)));
    mock.assert_hits(0);
}

#[tokio::test]
async fn rejected_purge_reports_status_and_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("DELETE").path(PURGE_PATH);
        then.status(403).json_body(json!({
            "success": false,
            "errors": [{ "code": 10000, "message": "Authentication error" }],
            "messages": [],
            "result": null
        }));
    });

    let err = client(&server)
        .purge_everything(&creds())
        .await
        .expect_err("403 must fail");

    match err {
        PurgeError::Api { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("Authentication error"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unsuccessful_envelope_is_an_api_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("DELETE").path(PURGE_PATH);
        then.status(200).json_body(json!({
            "success": false,
            "errors": [{ "code": 1012, "message": "Request must contain one of files" }],
            "messages": []
        }));
    });

    let err = client(&server)
        .purge_urls(&creds(), &["https://ex.com/".to_string()])
        .await
        .expect_err("success=false must fail");

    assert_eq!(err.status(), Some(200));
    assert_eq!(err.kind(), "api");
}

#[tokio::test]
async fn unreachable_api_is_a_transport_error() {
    let server = MockServer::start();
    let mut settings = common::settings(&server).cloudflare;
    settings.api_base_url = Url::parse("http://127.0.0.1:9/client/v4").expect("url");
    let client = CloudflareClient::new(&settings).expect("cloudflare client");

    let err = client
        .purge_everything(&creds())
        .await
        .expect_err("nothing listens on the discard port");

    assert!(matches!(err, PurgeError::Transport { .. }));
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn slow_api_times_out_as_transport_error() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("DELETE").path(PURGE_PATH);
        then.status(200)
            .delay(Duration::from_secs(3))
            .json_body(success_body());
    });

    let mut settings = common::settings(&server).cloudflare;
    settings.timeout = Duration::from_secs(1);
    let client = CloudflareClient::new(&settings).expect("cloudflare client");

    let err = client
        .purge_everything(&creds())
        .await
        .expect_err("response arrives after the timeout");

    mock.assert();
    match err {
        PurgeError::Transport { message } => assert!(message.contains("timed out"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
}
