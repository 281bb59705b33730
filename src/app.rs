//! Application router shared by the server binary and the integration tests.

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::database::DatabaseManager;
use crate::handlers::{protected, public};
use crate::middleware::{cors_layer, require_permission, validate_session_middleware, PermissionGuard};
use crate::services::permission_service::RISPOSTE_QUESTIONARI_FUNCTION;
use crate::state::AppState;
use crate::types::PermissionKind;

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(public::auth::login))
        .route("/register", post(public::auth::register))
        .route("/utenteIns", post(public::auth::utente_ins))
        .route("/check-config", get(public::auth::check_config))
        .route("/api/questionari/:id", get(public::questionnaire::questionnaire_get))
        .route("/api/questionari/:id/risposte", post(public::questionnaire::answers_post))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::{auth, crud, listing, menu, questionnaire};

    let answers = Router::new()
        .route("/api/dataHandling/risposteQuestionari", post(listing::risposte_questionari))
        .route_layer(from_fn_with_state(
            PermissionGuard::new(state.clone(), RISPOSTE_QUESTIONARI_FUNCTION, &[PermissionKind::Access]),
            require_permission,
        ));

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/crudTabella", post(crud::crud_tabella))
        .route("/api/dataHandling/crudTabella", post(crud::crud_tabella))
        .route("/listaRecords", post(listing::lista_records))
        .route("/referenceDataSimple", get(listing::reference_data_simple))
        .route("/getForeignKeyData", post(listing::foreign_key_data))
        .route("/abilitazioneUtenti/menu", get(menu::menu))
        .route("/api/internalUtenti/users", post(crud::users))
        .route("/api/internalFunzioni/users", post(crud::functions))
        // same parameter name as the public questionnaire routes; it carries a description here
        .route("/api/questionari/:id/domandeMapping", get(questionnaire::domande_mapping))
        .merge(answers)
        .route_layer(from_fn_with_state(state, validate_session_middleware))
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "SiQuest API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Questionari di gradimento: CRUD su tabelle, sessioni e permessi",
        "endpoints": {
            "health": "/health (public)",
            "auth": "/login, /register, /utenteIns, /check-config (public); /logout (session)",
            "questionnaires": "/api/questionari/:id, /api/questionari/:id/risposte (public); /api/questionari/:descrizione/domandeMapping (session)",
            "crud": "/crudTabella, /api/dataHandling/crudTabella, /api/internalUtenti/users, /api/internalFunzioni/users (session)",
            "listing": "/api/dataHandling/risposteQuestionari, /listaRecords, /referenceDataSimple, /getForeignKeyData (session)",
            "menu": "/abilitazioneUtenti/menu (session)",
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status": "ok", "timestamp": now, "database": "ok"})),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable",
                    "database_error": e.to_string(),
                })),
            )
        }
    }
}
