//! Broker behaviour against local authorization servers.

use std::collections::HashMap;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::Form;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use halo_core::{
    ConfigStore, ConnectorConfig, ConnectorEvent, ConnectorsFile, EventBus, JsonConfigStore,
    OAuthCredential,
};
use halo_oauth::{callback, OAuthBroker, OAuthError, RefreshOutcome};
use serde_json::json;

const REDIRECT_URI: &str = "http://localhost:43110/oauth/callback";

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, router).into_future());
    format!("http://{addr}")
}

/// Serve the full discovery + registration + token surface at one base URL.
///
/// Returns the base URL and the token-endpoint hit counter.
async fn spawn_auth_server(token_delay_ms: u64, token_status: u16) -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));

    let resource_meta = {
        let base = base.clone();
        move || async move {
            Json(json!({
                "resource": base,
                "authorization_servers": [base],
                "scopes_supported": ["mcp.read", "mcp.write"]
            }))
        }
    };
    let server_meta = {
        let base = base.clone();
        move || async move {
            Json(json!({
                "issuer": base,
                "authorization_endpoint": format!("{base}/authorize"),
                "token_endpoint": format!("{base}/token"),
                "registration_endpoint": format!("{base}/register")
            }))
        }
    };
    let register = || async {
        Json(json!({
            "client_id": "issued-client-id",
            "client_secret": "spurious-secret"
        }))
    };
    let token = {
        let hits = Arc::clone(&hits);
        move |Form(params): Form<HashMap<String, String>>| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(token_delay_ms)).await;

                if token_status != 200 {
                    let status = axum::http::StatusCode::from_u16(token_status).unwrap();
                    return (status, Json(json!({"error": "invalid_grant"})));
                }

                assert!(params.contains_key("grant_type"));
                if params["grant_type"] == "authorization_code" {
                    assert!(params.contains_key("code_verifier"));
                    assert_eq!(params["redirect_uri"], REDIRECT_URI);
                }
                (
                    axum::http::StatusCode::OK,
                    Json(json!({
                        "access_token": "fresh-access-token",
                        "token_type": "Bearer",
                        "expires_in": 7200,
                        "refresh_token": "fresh-refresh-token",
                        "scope": "mcp.read mcp.write"
                    })),
                )
            }
        }
    };

    let router = Router::new()
        .route("/.well-known/oauth-protected-resource", get(resource_meta))
        .route("/.well-known/oauth-authorization-server", get(server_meta))
        .route("/register", post(register))
        .route("/token", post(token));

    tokio::spawn(axum::serve(listener, router).into_future());
    (base, hits)
}

fn store_with(connectors: Vec<(&str, ConnectorConfig)>) -> (tempfile::TempDir, Arc<JsonConfigStore>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let mut file = ConnectorsFile::default();
    for (name, config) in connectors {
        file.connectors.insert(name.to_string(), config);
    }
    std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

    (dir, Arc::new(JsonConfigStore::open(path).unwrap()))
}

fn credential(token_url: &str, expires_at: DateTime<Utc>, refresh: Option<&str>) -> OAuthCredential {
    OAuthCredential {
        access_token: "old-access-token".to_string(),
        refresh_token: refresh.map(String::from),
        expires_at,
        token_type: "Bearer".to_string(),
        token_url: format!("{token_url}/token"),
        client_id: "issued-client-id".to_string(),
        resource: None,
        scope: Some("mcp.read".to_string()),
    }
}

#[tokio::test]
async fn full_flow_ends_with_a_persisted_credential() {
    let (base, _) = spawn_auth_server(0, 200).await;
    let (_dir, store) = store_with(vec![("linear", ConnectorConfig::network(&base))]);
    let events = EventBus::new();
    let mut rx = events.subscribe();
    let broker = OAuthBroker::new(store.clone(), events, REDIRECT_URI).unwrap();

    let flow = broker.start_flow("linear").await.unwrap();
    assert_eq!(flow.connector, "linear");
    assert_eq!(broker.pending_flows(), 1);

    let auth_url = url::Url::parse(&flow.authorization_url).unwrap();
    let query: HashMap<_, _> = auth_url.query_pairs().into_owned().collect();
    assert_eq!(query["response_type"], "code");
    assert_eq!(query["client_id"], "issued-client-id");
    assert_eq!(query["redirect_uri"], REDIRECT_URI);
    assert_eq!(query["state"], flow.state);
    assert_eq!(query["code_challenge_method"], "S256");
    assert!(query.contains_key("code_challenge"));
    assert_eq!(query["scope"], "mcp.read mcp.write");

    let connector = broker.handle_callback(&flow.state, "auth-code-1").await.unwrap();
    assert_eq!(connector, "linear");
    assert_eq!(broker.pending_flows(), 0);

    let stored = store.load().unwrap();
    let oauth = stored.get("linear").unwrap().oauth.clone().unwrap();
    assert_eq!(oauth.access_token, "fresh-access-token");
    assert_eq!(oauth.refresh_token.as_deref(), Some("fresh-refresh-token"));
    assert!(oauth.token_url.ends_with("/token"));
    assert!(!oauth.is_expired(Utc::now()));

    match rx.recv().await.unwrap().as_ref() {
        ConnectorEvent::AuthorizationCompleted {
            connector, success, ..
        } => {
            assert_eq!(connector, "linear");
            assert!(*success);
        }
        other => panic!("unexpected event {other:?}"),
    }

    // The flow is single use.
    let err = broker.handle_callback(&flow.state, "auth-code-1").await.unwrap_err();
    assert!(matches!(err, OAuthError::UnknownFlow));
}

#[tokio::test]
async fn malformed_state_is_rejected_before_any_lookup() {
    let (_dir, store) = store_with(vec![]);
    let broker = OAuthBroker::new(store, EventBus::new(), REDIRECT_URI).unwrap();

    for bad in ["", "short", "has spaces in it which is not allowed!!"] {
        let err = broker.handle_callback(bad, "code").await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidState), "accepted {bad:?}");
    }
}

#[tokio::test]
async fn missing_registration_endpoint_is_a_hard_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let resource_meta = {
        let base = base.clone();
        move || async move { Json(json!({"authorization_servers": [base]})) }
    };
    let server_meta = {
        let base = base.clone();
        move || async move {
            Json(json!({
                "issuer": base,
                "authorization_endpoint": format!("{base}/authorize"),
                "token_endpoint": format!("{base}/token")
            }))
        }
    };
    let router = Router::new()
        .route("/.well-known/oauth-protected-resource", get(resource_meta))
        .route("/.well-known/oauth-authorization-server", get(server_meta));
    tokio::spawn(axum::serve(listener, router).into_future());

    let (_dir, store) = store_with(vec![("linear", ConnectorConfig::network(&base))]);
    let broker = OAuthBroker::new(store, EventBus::new(), REDIRECT_URI).unwrap();

    let err = broker.start_flow("linear").await.unwrap_err();
    assert!(matches!(err, OAuthError::RegistrationUnsupported { .. }));
    assert_eq!(broker.pending_flows(), 0);
}

#[tokio::test]
async fn empty_authorization_server_list_fails_discovery() {
    let router = Router::new().route(
        "/.well-known/oauth-protected-resource",
        get(|| async { Json(json!({"authorization_servers": []})) }),
    );
    let base = spawn(router).await;

    let (_dir, store) = store_with(vec![("linear", ConnectorConfig::network(&base))]);
    let broker = OAuthBroker::new(store, EventBus::new(), REDIRECT_URI).unwrap();

    let err = broker.start_flow("linear").await.unwrap_err();
    assert!(matches!(err, OAuthError::NoAuthorizationServer { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_refreshes_share_one_token_request() {
    let (base, hits) = spawn_auth_server(200, 200).await;
    let config = ConnectorConfig::network(&base)
        .with_oauth(credential(&base, Utc::now() + Duration::minutes(1), Some("rt-1")));
    let (_dir, store) = store_with(vec![("linear", config)]);
    let broker = OAuthBroker::new(store.clone(), EventBus::new(), REDIRECT_URI).unwrap();

    let (first, second, third) = futures::join!(
        broker.refresh("linear"),
        broker.refresh("linear"),
        broker.refresh("linear")
    );
    assert_eq!(first.unwrap(), RefreshOutcome::Refreshed);
    assert_eq!(second.unwrap(), RefreshOutcome::Refreshed);
    assert_eq!(third.unwrap(), RefreshOutcome::Refreshed);
    assert_eq!(hits.load(Ordering::SeqCst), 1, "duplicate token request issued");

    let oauth = store.load().unwrap().get("linear").unwrap().oauth.clone().unwrap();
    assert_eq!(oauth.access_token, "fresh-access-token");
    assert_eq!(oauth.refresh_token.as_deref(), Some("fresh-refresh-token"));
}

#[tokio::test]
async fn a_later_refresh_posts_the_rotated_token() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let seen: Arc<std::sync::Mutex<Vec<String>>> = Arc::default();

    // Rotates the refresh token on every grant and records what it saw.
    let token = {
        let seen = Arc::clone(&seen);
        move |Form(params): Form<HashMap<String, String>>| {
            let seen = Arc::clone(&seen);
            async move {
                let mut seen = seen.lock().unwrap();
                seen.push(params["refresh_token"].clone());
                Json(json!({
                    "access_token": format!("at-{}", seen.len()),
                    "token_type": "Bearer",
                    "expires_in": 7200,
                    "refresh_token": format!("rt-{}", seen.len() + 1)
                }))
            }
        }
    };
    let router = Router::new().route("/token", post(token));
    tokio::spawn(axum::serve(listener, router).into_future());

    let config = ConnectorConfig::network(&base)
        .with_oauth(credential(&base, Utc::now() + Duration::minutes(1), Some("rt-1")));
    let (_dir, store) = store_with(vec![("linear", config)]);
    let broker = OAuthBroker::new(store.clone(), EventBus::new(), REDIRECT_URI).unwrap();

    assert_eq!(broker.refresh("linear").await.unwrap(), RefreshOutcome::Refreshed);
    assert_eq!(broker.refresh("linear").await.unwrap(), RefreshOutcome::Refreshed);

    // Each completed flight cleared its single-flight entry, and the second
    // request carried the token rotated in by the first.
    assert_eq!(*seen.lock().unwrap(), vec!["rt-1".to_string(), "rt-2".to_string()]);

    let oauth = store.load().unwrap().get("linear").unwrap().oauth.clone().unwrap();
    assert_eq!(oauth.refresh_token.as_deref(), Some("rt-3"));
}

#[tokio::test]
async fn rejected_refresh_clears_the_credential_and_notifies() {
    let (base, _) = spawn_auth_server(0, 401).await;
    let config = ConnectorConfig::network(&base)
        .with_oauth(credential(&base, Utc::now() + Duration::minutes(1), Some("rt-1")));
    let (_dir, store) = store_with(vec![("linear", config)]);
    let events = EventBus::new();
    let mut rx = events.subscribe();
    let broker = OAuthBroker::new(store.clone(), events, REDIRECT_URI).unwrap();

    let outcome = broker.refresh("linear").await.unwrap();
    assert_eq!(outcome, RefreshOutcome::ReauthorizationRequired);
    assert!(store.load().unwrap().get("linear").unwrap().oauth.is_none());

    match rx.recv().await.unwrap().as_ref() {
        ConnectorEvent::ReauthorizationRequired { connectors } => {
            assert_eq!(connectors, &vec!["linear".to_string()]);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn transient_refresh_failure_keeps_the_credential() {
    let (base, _) = spawn_auth_server(0, 503).await;
    let config = ConnectorConfig::network(&base)
        .with_oauth(credential(&base, Utc::now() + Duration::minutes(1), Some("rt-1")));
    let (_dir, store) = store_with(vec![("linear", config)]);
    let broker = OAuthBroker::new(store.clone(), EventBus::new(), REDIRECT_URI).unwrap();

    let outcome = broker.refresh("linear").await.unwrap();
    assert!(matches!(outcome, RefreshOutcome::Failed(_)));

    let oauth = store.load().unwrap().get("linear").unwrap().oauth.clone().unwrap();
    assert_eq!(oauth.access_token, "old-access-token");
}

#[tokio::test]
async fn refresh_without_material_is_a_typed_error() {
    let (_dir, store) = store_with(vec![
        ("plain", ConnectorConfig::network("https://mcp.example.com")),
        (
            "no-refresh",
            ConnectorConfig::network("https://mcp.example.com").with_oauth(credential(
                "https://auth.example.com",
                Utc::now() + Duration::minutes(1),
                None,
            )),
        ),
    ]);
    let broker = OAuthBroker::new(store, EventBus::new(), REDIRECT_URI).unwrap();

    assert!(matches!(
        broker.refresh("plain").await.unwrap_err(),
        OAuthError::NoCredential { .. }
    ));
    assert!(matches!(
        broker.refresh("no-refresh").await.unwrap_err(),
        OAuthError::NoRefreshToken { .. }
    ));
    assert!(matches!(
        broker.refresh("ghost").await.unwrap_err(),
        OAuthError::Core(_)
    ));
}

#[tokio::test]
async fn bulk_refresh_targets_only_credentials_expiring_soon() {
    let (base, hits) = spawn_auth_server(0, 200).await;
    let (_dir, store) = store_with(vec![
        (
            "due",
            ConnectorConfig::network(&base).with_oauth(credential(
                &base,
                Utc::now() + Duration::minutes(1),
                Some("rt-due"),
            )),
        ),
        (
            "fresh",
            ConnectorConfig::network(&base).with_oauth(credential(
                &base,
                Utc::now() + Duration::hours(1),
                Some("rt-fresh"),
            )),
        ),
        (
            "unrefreshable",
            ConnectorConfig::network(&base).with_oauth(credential(
                &base,
                Utc::now() + Duration::minutes(1),
                None,
            )),
        ),
    ]);
    let broker = OAuthBroker::new(store, EventBus::new(), REDIRECT_URI).unwrap();

    let outcomes = broker.refresh_expiring().await.unwrap();
    assert_eq!(outcomes, vec![("due".to_string(), RefreshOutcome::Refreshed)]);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn provider_error_on_the_callback_consumes_the_flow() {
    let (base, _) = spawn_auth_server(0, 200).await;
    let (_dir, store) = store_with(vec![("linear", ConnectorConfig::network(&base))]);
    let events = EventBus::new();
    let mut rx = events.subscribe();
    let broker = OAuthBroker::new(store, events, REDIRECT_URI).unwrap();

    let flow = broker.start_flow("linear").await.unwrap();

    let callback_base = spawn(callback::router(broker.clone())).await;
    let response = reqwest::get(format!(
        "{callback_base}/oauth/callback?state={}&error=access_denied",
        flow.state
    ))
    .await
    .unwrap();
    let body = response.text().await.unwrap();
    assert!(body.contains("Authorization failed"));

    match rx.recv().await.unwrap().as_ref() {
        ConnectorEvent::AuthorizationCompleted {
            connector,
            success,
            error,
        } => {
            assert_eq!(connector, "linear");
            assert!(!*success);
            assert_eq!(error.as_deref(), Some("access_denied"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    // A late "real" callback for the same flow finds nothing.
    let err = broker.handle_callback(&flow.state, "code").await.unwrap_err();
    assert!(matches!(err, OAuthError::UnknownFlow));
}

#[tokio::test]
async fn callback_endpoint_completes_a_flow_end_to_end() {
    let (base, _) = spawn_auth_server(0, 200).await;
    let (_dir, store) = store_with(vec![("linear", ConnectorConfig::network(&base))]);
    let broker = OAuthBroker::new(store.clone(), EventBus::new(), REDIRECT_URI).unwrap();

    let flow = broker.start_flow("linear").await.unwrap();

    let callback_base = spawn(callback::router(broker)).await;
    let response = reqwest::get(format!(
        "{callback_base}/oauth/callback?state={}&code=auth-code-1",
        flow.state
    ))
    .await
    .unwrap();
    assert!(response.text().await.unwrap().contains("Authorization complete"));

    let oauth = store.load().unwrap().get("linear").unwrap().oauth.clone().unwrap();
    assert_eq!(oauth.access_token, "fresh-access-token");
}
