// Handlers module - API endpoint handlers

pub mod bolagsverket;
pub mod clientflow;
pub mod health;
pub mod lookup;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde_json::Value;

use crate::error::ProxyError;

/// Unwrap a JSON request body; unparseable or empty bodies are rejected
pub(crate) fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ProxyError> {
    let Json(value) = body.map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        ProxyError::InvalidJson
    })?;

    let empty = match &value {
        Value::Null => true,
        Value::Object(o) => o.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(b) => !b,
        Value::Number(_) => false,
    };
    if empty {
        return Err(ProxyError::InvalidJson);
    }
    Ok(value)
}

pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
