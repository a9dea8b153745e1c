#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode as AxumStatus},
    Router,
};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt;

use schedule_api::auth::hash_password;
use schedule_api::config::AppConfig;
use schedule_api::database::{MemoryStorage, Storage};
use schedule_api::{router, AppState};

static SERVER: OnceLock<TestServer> = OnceLock::new();

/// The real binary, started once per test target on the memory backend
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_schedule-api"));
        cmd.arg("--memory")
            .env("APP_ENV", "development")
            .env("API_PORT", port.to_string())
            .env("STORAGE_BACKEND", "memory")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Router plus its state, wired to a fresh memory backend
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig::development();
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let state = AppState::new(storage, &config);
        let router = router(state.clone(), &config);
        Self { router, state }
    }

    /// Send one request through the router and decode the JSON body
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (AxumStatus, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("X-AccessToken", token);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (AxumStatus, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (AxumStatus, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (AxumStatus, Value) {
        self.send(Method::PUT, uri, Some(token), Some(body)).await
    }

    /// Register through the API and log in; returns the session token
    pub async fn login_new_user(&self, login: &str, password: &str) -> String {
        let (status, _) = self
            .post(
                "/api/registration",
                None,
                json!({"login": login, "password": password, "email": format!("{login}@example.com"), "phone": "555-0100"}),
            )
            .await;
        assert_eq!(status, AxumStatus::OK);
        self.login(login, password).await
    }

    pub async fn login(&self, login: &str, password: &str) -> String {
        let (status, body) = self.post("/api/login", None, json!({"login": login, "password": password})).await;
        assert_eq!(status, AxumStatus::OK, "login failed: {body}");
        body["result"]["sid"].as_str().unwrap().to_string()
    }

    /// Administrators cannot self-register, so they are written straight to storage
    pub async fn login_admin(&self) -> String {
        let values = json!({
            "login": "root",
            "password_hash": hash_password("root-password"),
            "flags": -4,
        });
        self.state
            .storage
            .insert("users", values.as_object().cloned().unwrap())
            .await
            .unwrap();
        self.login("root", "root-password").await
    }
}
