use std::{
    net::{Ipv4Addr, SocketAddr},
    thread::JoinHandle,
    time::Duration,
};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use ff_wrapper::{
    server::{run_self_test, FlagCheckResponse},
    ClientConfig, LifecycleState, ServerConfig, Status, WrapperServer,
};

const API_KEY: &str = "valid-key";
const ENVIRONMENT: &str = "env-1";

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn token() -> String {
    let claims = json!({
        "environment": ENVIRONMENT,
        "environmentIdentifier": "test",
        "clusterIdentifier": "1",
        "accountID": "account-1"
    });
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

fn feature_configs() -> Value {
    json!([
        {
            "feature": "flag1",
            "kind": "boolean",
            "state": "on",
            "variations": [
                {"identifier": "true", "value": "true"},
                {"identifier": "false", "value": "false"}
            ],
            "offVariation": "false",
            "defaultServe": {"variation": "true"},
            "variationToTargetMap": [
                {"variation": "false", "targets": [{"identifier": "excluded", "name": "Excluded"}]}
            ]
        },
        {
            "feature": "beta",
            "kind": "boolean",
            "state": "on",
            "variations": [
                {"identifier": "true", "value": "true"},
                {"identifier": "false", "value": "false"}
            ],
            "offVariation": "false",
            "defaultServe": {"variation": "false"},
            "rules": [
                {
                    "ruleId": "beta-rule",
                    "priority": 1,
                    "clauses": [{"attribute": "", "op": "segmentMatch", "values": ["beta-users"]}],
                    "serve": {"variation": "true"}
                }
            ]
        },
        {
            "feature": "count",
            "kind": "int",
            "state": "on",
            "variations": [{"identifier": "forty-two", "value": "42"}],
            "offVariation": "forty-two",
            "defaultServe": {"variation": "forty-two"}
        },
        {
            "feature": "color",
            "kind": "string",
            "state": "on",
            "variations": [{"identifier": "blue", "value": "blue"}],
            "offVariation": "blue",
            "defaultServe": {"variation": "blue"}
        },
        {
            "feature": "settings",
            "kind": "json",
            "state": "on",
            "variations": [{"identifier": "dark", "value": "{\"theme\": \"dark\"}"}],
            "offVariation": "dark",
            "defaultServe": {"variation": "dark"}
        },
        {"feature": "broken", "kind": "unsupported"}
    ])
}

fn target_segments() -> Value {
    json!([
        {"identifier": "beta-users", "name": "Beta users", "included": [{"identifier": "alice"}]}
    ])
}

/// In-process stand-in for the flag service, served on its own runtime thread.
struct MockFlagService {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MockFlagService {
    fn start() -> MockFlagService {
        let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, shutdown_receiver) = oneshot::channel::<()>();

        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                let router = Router::new()
                    .route("/api/1.0/client/auth", post(authenticate))
                    .route(
                        &format!("/api/1.0/client/env/{ENVIRONMENT}/feature-configs"),
                        get(|| async { Json(feature_configs()) }),
                    )
                    .route(
                        &format!("/api/1.0/client/env/{ENVIRONMENT}/target-segments"),
                        get(|| async { Json(target_segments()) }),
                    );
                axum::serve(listener, router)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_receiver.await;
                    })
                    .await
                    .unwrap();
            });
        });

        MockFlagService {
            addr,
            shutdown: Some(shutdown),
            thread: Some(thread),
        }
    }

    fn config_url(&self) -> String {
        format!("http://{}/api/1.0", self.addr)
    }
}

impl Drop for MockFlagService {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

async fn authenticate(Json(body): Json<Value>) -> Response {
    if body["apiKey"] == API_KEY {
        Json(json!({ "authToken": token() })).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

fn server_config(service: &MockFlagService, api_key: &str) -> ServerConfig {
    ServerConfig::new(0, api_key)
        .bind_address(Ipv4Addr::LOCALHOST.into())
        .startup_timeout(Duration::from_secs(5))
        .client_config(
            ClientConfig::new()
                .config_url(service.config_url())
                .stream_enabled(false),
        )
}

fn check_flag(addr: SocketAddr, kind: &str, key: &str, identifier: &str) -> FlagCheckResponse {
    let response = reqwest::blocking::Client::new()
        .post(format!("http://{addr}/api/1.0/check_flag"))
        .json(&json!({
            "flag_kind": kind,
            "flag_key": key,
            "target": {"target_identifier": identifier, "target_name": identifier}
        }))
        .send()
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    response.json().unwrap()
}

#[test]
fn evaluates_flags_from_flag_service() {
    init();
    let service = MockFlagService::start();
    let mut server = WrapperServer::new(server_config(&service, API_KEY));

    assert!(server.start().unwrap());
    assert!(server.is_active());
    let addr = server.local_addr().unwrap();

    assert_eq!(
        check_flag(addr, "boolean", "flag1", "test"),
        FlagCheckResponse {
            flag_key: "flag1".to_owned(),
            flag_value: "true".to_owned()
        }
    );
    assert_eq!(check_flag(addr, "boolean", "flag1", "excluded").flag_value, "false");
    assert_eq!(check_flag(addr, "boolean", "beta", "alice").flag_value, "true");
    assert_eq!(check_flag(addr, "boolean", "beta", "bob").flag_value, "false");
    assert_eq!(check_flag(addr, "int", "count", "test").flag_value, "42");
    assert_eq!(check_flag(addr, "string", "color", "test").flag_value, "blue");
    assert_eq!(
        serde_json::from_str::<Value>(&check_flag(addr, "json", "settings", "test").flag_value)
            .unwrap(),
        json!({"theme": "dark"})
    );

    // Flags the service does not know, or failed to parse, evaluate to defaults.
    assert_eq!(check_flag(addr, "boolean", "missing", "test").flag_value, "false");
    assert_eq!(check_flag(addr, "int", "broken", "test").flag_value, "0");
    assert_eq!(check_flag(addr, "string", "flag1", "test").flag_value, "");

    assert!(server.stop());
    assert_eq!(server.lifecycle_state(), LifecycleState::Stopped);
}

#[test]
fn self_test_passes_against_running_server() {
    init();
    let service = MockFlagService::start();
    let mut server = WrapperServer::new(server_config(&service, API_KEY));

    assert!(server.start().unwrap());
    run_self_test(server.local_addr().unwrap(), "flag1").unwrap();
    assert!(server.stop());
}

#[test]
fn rejected_key_keeps_listener_up() {
    init();
    let service = MockFlagService::start();
    let mut server = WrapperServer::new(server_config(&service, "invalid-key"));

    assert!(!server.start().unwrap());
    assert!(server.is_not_active());
    let addr = server.local_addr().unwrap();

    let pong: Value = reqwest::blocking::get(format!("http://{addr}/api/1.0/ping"))
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(pong, json!({"ok": true}));

    let version = reqwest::blocking::get(format!("http://{addr}/sdk/version")).unwrap();
    assert_eq!(version.status(), reqwest::StatusCode::OK);

    // The client exists but is not ready, so evaluations fall back to defaults.
    assert_eq!(check_flag(addr, "boolean", "flag1", "test").flag_value, "false");

    assert!(server.stop());
}

#[test]
fn unreachable_service_times_out() {
    init();
    let unused = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let config_url = format!("http://{}/api/1.0", unused.local_addr().unwrap());
    drop(unused);

    let mut server = WrapperServer::new(
        ServerConfig::new(0, API_KEY)
            .bind_address(Ipv4Addr::LOCALHOST.into())
            .startup_timeout(Duration::from_millis(300))
            .client_config(
                ClientConfig::new()
                    .config_url(config_url)
                    .connection_timeout(Duration::from_millis(100)),
            ),
    );

    assert!(!server.start().unwrap());
    assert!(server.is_not_active());

    let addr = server.local_addr().unwrap();
    let response = reqwest::blocking::get(format!("http://{addr}/api/1.0/ping")).unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    assert!(server.stop());
}

#[test]
fn unknown_routes_are_not_found() {
    init();
    let service = MockFlagService::start();
    let mut server = WrapperServer::new(server_config(&service, API_KEY));
    assert!(server.start().unwrap());
    let addr = server.local_addr().unwrap();
    let client = reqwest::blocking::Client::new();

    let response = client
        .get(format!("http://{addr}/api/1.0/flags"))
        .send()
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(response.text().unwrap(), "Not found");

    let response = client
        .get(format!("http://{addr}/api/1.0/check_flag"))
        .send()
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    let response = client
        .post(format!("http://{addr}/api/1.0/check_flag"))
        .body("not json")
        .send()
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.text().unwrap().is_empty());

    assert!(server.stop());
}
