mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use common::{call, empty_request, json_request, offline_router};

// Everything here is decided before the database is touched, so the router
// runs in-process over a pool that never connects.

#[tokio::test]
async fn root_lists_endpoints() -> Result<()> {
    let (status, body) = call(offline_router()?, empty_request("GET", "/")?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "SiQuest API");
    assert!(body["endpoints"]["crud"].as_str().unwrap_or_default().contains("/crudTabella"));
    Ok(())
}

#[tokio::test]
async fn health_reports_unreachable_database() -> Result<()> {
    let (status, body) = call(offline_router()?, empty_request("GET", "/health")?).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "unavailable");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let requests = vec![
        json_request("POST", "/crudTabella", &json!({"tableName": "ANS_Questionari", "operation": "read"}))?,
        json_request("POST", "/api/dataHandling/crudTabella", &json!({"operation": "read"}))?,
        json_request("POST", "/api/dataHandling/risposteQuestionari", &json!({"tableName": "ANS_RisposteQuestionari"}))?,
        json_request("POST", "/listaRecords", &json!({"tableName": "ANS_RisposteQuestionari"}))?,
        json_request("POST", "/getForeignKeyData", &json!({"tableName": "ANS_Utenti"}))?,
        json_request("POST", "/api/internalUtenti/users", &json!({"operation": "read"}))?,
        json_request("POST", "/api/internalFunzioni/users", &json!({"operation": "read"}))?,
        json_request("POST", "/logout", &json!({}))?,
        empty_request("GET", "/abilitazioneUtenti/menu")?,
        empty_request("GET", "/referenceDataSimple?table=ANS_Utenti&idColumn=UTE_Id_Utenti&displayField=UTE_NomeUtente")?,
        empty_request("GET", "/api/questionari/Degenza/domandeMapping")?,
    ];

    for request in requests {
        let uri = request.uri().to_string();
        let (status, body) = call(offline_router()?, request).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}: {body}");
        assert_eq!(body["message"], "Token di sessione mancante", "{uri}");
        assert_eq!(body["code"], "UNAUTHORIZED", "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn blank_bearer_counts_as_missing() -> Result<()> {
    let request = Request::builder()
        .method("GET")
        .uri("/abilitazioneUtenti/menu")
        .header("authorization", "Bearer ")
        .body(Body::empty())?;
    let (status, body) = call(offline_router()?, request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token di sessione mancante");
    Ok(())
}

#[tokio::test]
async fn session_lookup_failure_is_unavailable() -> Result<()> {
    let request = Request::builder()
        .method("GET")
        .uri("/abilitazioneUtenti/menu")
        .header("authorization", "Bearer 0123456789abcdef")
        .body(Body::empty())?;
    let (status, body) = call(offline_router()?, request).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{body}");
    Ok(())
}

#[tokio::test]
async fn login_requires_both_fields() -> Result<()> {
    for payload in [json!({}), json!({"username": "admin"}), json!({"username": "", "password": "x"})] {
        let (status, body) = call(offline_router()?, json_request("POST", "/login", &payload)?).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        assert_eq!(body["message"], "Nome utente e password sono obbligatori");
    }
    Ok(())
}

#[tokio::test]
async fn account_creation_requires_every_field() -> Result<()> {
    for uri in ["/register", "/utenteIns"] {
        let payload = json!({"username": "mrossi", "password": "segreta"});
        let (status, body) = call(offline_router()?, json_request("POST", uri, &payload)?).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["message"], "Tutti i campi sono obbligatori", "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn answers_are_validated_before_storing() -> Result<()> {
    let cases = [
        (json!({"risposte": []}), "Dati delle risposte mancanti o non validi."),
        (json!({}), "Dati delle risposte mancanti o non validi."),
        (json!({"risposte": "tutte"}), "Dati delle risposte mancanti o non validi."),
        (
            json!({"risposte": [{"RQU_TestoRisposta": "Ottimo"}]}),
            "Risposta 1: RQU_IdRif_DomandeQuestionari mancante",
        ),
    ];
    for (payload, message) in cases {
        let request = json_request("POST", "/api/questionari/7/risposte", &payload)?;
        let (status, body) = call(offline_router()?, request).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        assert_eq!(body["message"], message);
    }
    Ok(())
}

#[tokio::test]
async fn cors_preflight_honours_origin_patterns() -> Result<()> {
    let preflight = |origin: &str| {
        Request::builder()
            .method("OPTIONS")
            .uri("/login")
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .body(Body::empty())
    };

    let response = tower::ServiceExt::oneshot(offline_router()?, preflight("http://192.168.5.40:3000")?).await?;
    assert_eq!(
        response.headers().get("access-control-allow-origin").and_then(|v| v.to_str().ok()),
        Some("http://192.168.5.40:3000")
    );

    let response = tower::ServiceExt::oneshot(offline_router()?, preflight("http://evil.example:3000")?).await?;
    assert!(response.headers().get("access-control-allow-origin").is_none());
    Ok(())
}

#[tokio::test]
async fn unknown_routes_are_not_found() -> Result<()> {
    let (status, _) = call(offline_router()?, empty_request("GET", "/api/nonEsiste")?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
