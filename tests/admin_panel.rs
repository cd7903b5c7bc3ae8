mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use cfpurge::{application::error::ErrorReport, infra::http::build_admin_router};
use httpmock::MockServer;
use serde_json::json;
use tower::ServiceExt;

use common::{PURGE_PATH, success_body};

fn router(server: &MockServer) -> Router {
    admin(server).0
}

/// Router plus the form token it expects on `POST /purge`.
fn admin(server: &MockServer) -> (Router, String) {
    let state = common::admin_state(common::settings(server));
    let token = state.csrf_token.to_string();
    (build_admin_router(state), token)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

fn purge_form(body: String) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/purge")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("request should build")
}

async fn html(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
}

#[tokio::test]
async fn overview_masks_the_api_key() {
    let server = MockServer::start();
    let response = router(&server)
        .oneshot(get("/"))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let page = html(response).await;
    assert!(page.contains("z1"));
    assert!(page.contains("ops@ex.com"));
    assert!(page.contains("1234"));
    assert!(!page.contains("global-key-1234"));
    assert!(page.contains("action=\"/purge\""));
}

#[tokio::test]
async fn overview_embeds_the_form_token() {
    let server = MockServer::start();
    let (app, token) = admin(&server);

    let page = html(app.oneshot(get("/")).await.expect("router should respond")).await;
    assert!(page.contains(&format!("name=\"csrf_token\" value=\"{token}\"")));
}

#[tokio::test]
async fn purge_without_a_valid_form_token_is_forbidden() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.path(PURGE_PATH);
        then.status(200).json_body(success_body());
    });
    let app = router(&server);

    for body in ["confirm=1", "confirm=1&csrf_token=forged"] {
        let response = app
            .clone()
            .oneshot(purge_form(body.to_string()))
            .await
            .expect("router should respond");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
    mock.assert_hits(0);
}

#[tokio::test]
async fn overview_shows_flash_messages() {
    let server = MockServer::start();
    let app = router(&server);

    let page = html(
        app.clone()
            .oneshot(get("/?purge_success=1"))
            .await
            .expect("router should respond"),
    )
    .await;
    assert!(page.contains("Cloudflare cache cleared."));

    let page = html(
        app.oneshot(get("/?purge_success=0"))
            .await
            .expect("router should respond"),
    )
    .await;
    assert!(page.contains("did not succeed"));
}

#[tokio::test]
async fn confirmed_purge_redirects_with_success_flag() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("DELETE")
            .path(PURGE_PATH)
            .json_body(json!({ "purge_everything": true }));
        then.status(200).json_body(success_body());
    });

    let (app, token) = admin(&server);
    let response = app
        .oneshot(purge_form(format!("confirm=1&csrf_token={token}")))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/?purge_success=1");
    mock.assert();
}

#[tokio::test]
async fn failed_purge_redirects_with_failure_flag() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.path(PURGE_PATH);
        then.status(403).body("forbidden");
    });

    let (app, token) = admin(&server);
    let response = app
        .oneshot(purge_form(format!("confirm=1&csrf_token={token}")))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/?purge_success=0");
}

#[tokio::test]
async fn unconfirmed_purge_does_nothing() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.path(PURGE_PATH);
        then.status(200).json_body(success_body());
    });

    let (app, token) = admin(&server);
    let response = app
        .oneshot(purge_form(format!("csrf_token={token}")))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    mock.assert_hits(0);
}
