use std::time::Duration;

use anyhow::Context;
use serde_json::{json, Value};

use crate::cli::utils::{output_error, output_success, server_message};
use crate::cli::OutputFormat;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build HTTP client")
}

/// GET /health on a running server
pub async fn health(url: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let response = client()?
        .get(endpoint(url, "/health"))
        .send()
        .await
        .with_context(|| format!("server {} not reachable", url))?;

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if status.is_success() {
        output_success(output_format, &format!("{} is healthy", url), Some(body))
    } else {
        output_error(output_format, &format!("{} is degraded: {}", url, body), Some(status.as_u16()))?;
        anyhow::bail!("health check failed with status {}", status)
    }
}

/// POST /login and print the session token
pub async fn login(url: &str, username: &str, password: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let response = client()?
        .post(endpoint(url, "/login"))
        .json(&json!({"username": username, "password": password}))
        .send()
        .await
        .with_context(|| format!("server {} not reachable", url))?;

    let status = response.status();
    let text = response.text().await.context("failed to read login response")?;
    if !status.is_success() {
        output_error(output_format, &server_message(&text), Some(status.as_u16()))?;
        anyhow::bail!("login failed with status {}", status)
    }

    let body: Value = serde_json::from_str(&text).context("login response is not JSON")?;
    let token = body
        .get("token")
        .and_then(Value::as_str)
        .context("login response without token")?;
    output_success(output_format, "Logged in", Some(json!({"token": token})))
}
