// Service info handlers

use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use super::timestamp;
use crate::proxy::server::AppState;

pub const SERVICE_NAME: &str = "API Proxy Service";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn handle_root() -> Json<Value> {
    Json(json!({
        "message": "ClientFlow API Proxy Service is running!",
        "status": "OK",
        "timestamp": timestamp(),
        "service": SERVICE_NAME,
        "version": VERSION,
        "endpoints": {
            "health": "/health",
            "test": "/test",
            "lookup": "/api/lookup",
            "bolagsverket": "/api/bolagsverket",
            "clientflow": "/api/clientflow/dokumentlista"
        }
    }))
}

pub async fn handle_health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": timestamp(),
        "service": SERVICE_NAME,
        "version": VERSION
    }))
}

pub async fn handle_test() -> Json<Value> {
    Json(json!({
        "message": "API is working!",
        "timestamp": timestamp()
    }))
}

/// Registry route smoke test, never calls out
pub async fn handle_bolagsverket_test() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Bolagsverket test endpoint fungerar!",
        "timestamp": timestamp()
    }))
}

/// Which settings are present. Values are never echoed.
pub async fn handle_test_env(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    let presence = |set: bool| if set { "SET" } else { "MISSING" };
    let token_state = state.token_manager.state().as_str();

    Json(json!({
        "environment": {
            "EXTERNAL_API_URL": presence(config.external_api.url.is_some()),
            "EXTERNAL_API_KEY": presence(config.external_api.api_key.is_some()),
            "BOLAGSVERKET_CLIENT_ID": presence(!config.bolagsverket.client_id.is_empty()),
            "BOLAGSVERKET_CLIENT_SECRET": presence(!config.bolagsverket.client_secret.is_empty()),
            "BOLAGSVERKET_ENVIRONMENT": config.bolagsverket.environment.as_str(),
            "PORT": config.port
        },
        "bolagsverketToken": token_state,
        "bolagsverketTokenAcquisitions": state.token_manager.acquisitions(),
        "timestamp": timestamp()
    }))
}
