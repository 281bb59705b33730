#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use siquest_api::config::AppConfig;
use siquest_api::database::DatabaseManager;
use siquest_api::{app, AppState};

/// Address nothing listens on; pools built against it fail on first use
pub const UNREACHABLE_DATABASE_URL: &str = "mysql://siquest@127.0.0.1:1/ANSSIQUEST";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

/// Database used by the live tests, when one is configured
pub fn live_database_url() -> Option<String> {
    std::env::var("SIQUEST_TEST_DATABASE_URL").ok().filter(|v| !v.trim().is_empty())
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let database_url = live_database_url().unwrap_or_else(|| UNREACHABLE_DATABASE_URL.to_string());

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_siquest-api"));
        cmd.env("SIQUEST_API_PORT", port.to_string())
            .env("SIQUEST_API_HOST", "127.0.0.1")
            .env("DATABASE_URL", database_url)
            .env("DATABASE_REQUIRE_ON_STARTUP", "false")
            .env("DATABASE_CONNECTION_TIMEOUT", "2")
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
                // Ready once /health answers, whether or not the database is up
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
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(server)
}

/// In-process router over a pool that never connects
pub fn offline_router() -> Result<Router> {
    let mut config = AppConfig::from_env();
    config.database.url = Some(UNREACHABLE_DATABASE_URL.to_string());
    config.database.connection_timeout = 1;
    config.security.cors_origins = vec![
        "http://localhost:3000".to_string(),
        "http://192.168.5.*:3000".to_string(),
    ];
    let pool = DatabaseManager::connect_lazy(&config)?;
    Ok(app(AppState::new(pool, config)))
}

/// Send one request through `router` and decode the JSON body
pub async fn call(router: Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = router.oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    Ok((status, body))
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?)
}

pub fn empty_request(method: &str, uri: &str) -> Result<Request<Body>> {
    Ok(Request::builder().method(method).uri(uri).body(Body::empty())?)
}
