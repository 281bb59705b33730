mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn server_answers_root() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(format!("{}/", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<Value>().await?;
    assert_eq!(body["name"], "SiQuest API");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    Ok(())
}

#[tokio::test]
async fn health_matches_database_availability() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(format!("{}/health", server.base_url)).await?;

    let expected = if common::live_database_url().is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    assert_eq!(res.status(), expected);
    Ok(())
}

#[tokio::test]
async fn menu_rejects_missing_session() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(format!("{}/abilitazioneUtenti/menu", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = res.json::<Value>().await?;
    assert_eq!(body["message"], "Token di sessione mancante");
    Ok(())
}

#[tokio::test]
async fn login_validates_payload() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::Client::new()
        .post(format!("{}/login", server.base_url))
        .json(&json!({"username": "admin"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "Nome utente e password sono obbligatori");
    Ok(())
}
