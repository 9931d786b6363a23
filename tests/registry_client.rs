//! Registry client against an in-process distribution API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dregu::docker_config::Credentials;
use dregu::registry::{Catalog, RegistryClient};
use serde_json::json;

const TOKEN: &str = "t0k3n";

#[derive(Clone, Copy)]
enum Challenge {
    Bearer,
    Basic,
}

#[derive(Clone)]
struct FakeRegistry {
    challenge: Challenge,
    base_url: String,
    token_requests: Arc<AtomicUsize>,
}

fn alice() -> Credentials {
    Credentials {
        username: "alice".to_string(),
        password: "pw".to_string(),
    }
}

fn unauthorized(challenge: String) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        Json(json!({"errors": [{"code": "UNAUTHORIZED", "message": "authentication required"}]})),
    )
        .into_response()
}

async fn registry(State(fake): State<FakeRegistry>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or("").to_string();
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
        .to_string();

    if path == "/token" {
        fake.token_requests.fetch_add(1, Ordering::SeqCst);
        if authorization != format!("Basic {}", STANDARD.encode("alice:pw")) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        return Json(json!({"token": TOKEN, "expires_in": 300})).into_response();
    }

    match fake.challenge {
        Challenge::Bearer if authorization == format!("Bearer {TOKEN}") => {}
        Challenge::Bearer => {
            return unauthorized(format!(
                r#"Bearer realm="{}/token",service="fake-registry""#,
                fake.base_url
            ));
        }
        Challenge::Basic => return unauthorized(r#"Basic realm="fake-registry""#.to_string()),
    }

    match path.as_str() {
        "/v2/" => Json(json!({})).into_response(),
        "/v2/_catalog" if query.is_empty() => (
            [(header::LINK, r#"</v2/_catalog?last=b&n=2>; rel="next""#)],
            Json(json!({"repositories": ["a", "b"]})),
        )
            .into_response(),
        "/v2/_catalog" => Json(json!({"repositories": ["c"]})).into_response(),
        "/v2/a/tags/list" => Json(json!({"name": "a", "tags": ["2.0", "1.0"]})).into_response(),
        "/v2/empty/tags/list" => Json(json!({"name": "empty", "tags": null})).into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"errors": [{"code": "NAME_UNKNOWN", "message": "repository name not known to registry"}]})),
        )
            .into_response(),
    }
}

/// Serve the fake registry on a local port and return its base url.
async fn serve(challenge: Challenge) -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let token_requests = Arc::new(AtomicUsize::new(0));

    let app = Router::new().fallback(registry).with_state(FakeRegistry {
        challenge,
        base_url: base_url.clone(),
        token_requests: token_requests.clone(),
    });
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    (base_url, token_requests)
}

#[tokio::test]
async fn catalog_pages_behind_bearer_challenge() {
    let (url, token_requests) = serve(Challenge::Bearer).await;

    let mut client = RegistryClient::connect(&url, Some(alice())).await.unwrap();
    assert_eq!(token_requests.load(Ordering::SeqCst), 1);

    let repositories = client.repositories().await.unwrap();
    assert_eq!(repositories, vec!["a", "b", "c"]);
    assert_eq!(token_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tags_of_repository() {
    let (url, _) = serve(Challenge::Bearer).await;
    let mut client = RegistryClient::connect(&url, Some(alice())).await.unwrap();

    assert_eq!(client.tags("a").await.unwrap(), vec!["2.0", "1.0"]);
    assert!(client.tags("empty").await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_repository_reports_registry_error() {
    let (url, _) = serve(Challenge::Bearer).await;
    let mut client = RegistryClient::connect(&url, Some(alice())).await.unwrap();

    let err = client.tags("zzz").await.unwrap_err().to_string();
    assert!(err.contains("list tags of zzz"), "{err}");
    assert!(err.contains("NAME_UNKNOWN"), "{err}");
}

#[tokio::test]
async fn rejected_token_request_fails_connect() {
    let (url, _) = serve(Challenge::Bearer).await;
    let wrong = Credentials {
        username: "alice".to_string(),
        password: "wrong".to_string(),
    };

    let err = RegistryClient::connect(&url, Some(wrong))
        .await
        .err()
        .unwrap()
        .to_string();
    assert!(err.starts_with(&format!("could not connect to docker registry at {url}")), "{err}");
    assert!(err.contains("Failed to authenticate with registry"), "{err}");
}

#[tokio::test]
async fn basic_challenge_on_connect_is_access_denied() {
    let (url, token_requests) = serve(Challenge::Basic).await;

    let err = RegistryClient::connect(&url, None)
        .await
        .err()
        .unwrap()
        .to_string();
    assert!(err.starts_with(&format!("could not connect to docker registry at {url}")), "{err}");
    assert!(err.contains("access denied"), "{err}");
    assert_eq!(token_requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn listing_through_registry_client() {
    let (url, _) = serve(Challenge::Bearer).await;
    let mut client = RegistryClient::connect(&url, Some(alice())).await.unwrap();

    let lines = dregu::list::list(&mut client, "a", false).await.unwrap();
    assert_eq!(console::strip_ansi_codes(&lines[0]), "a: [ 1.0, 2.0 ]");
}
