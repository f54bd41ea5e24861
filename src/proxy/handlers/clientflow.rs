// ClientFlow front-end routes: the registry document list in a flatter shape

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{info, warn};

use super::bolagsverket::{bearer, upstream_message};
use super::{json_body, timestamp};
use crate::error::{ErrorResponse, ProxyError};
use crate::proxy::common::validation::{extract_first_identifier, IdentifierKind};
use crate::proxy::mappers::dokumentlista;
use crate::proxy::middleware::logging::request_id;
use crate::proxy::server::AppState;
use crate::proxy::upstream::{Outbound, Payload};

/// Body fields accepted for the organisation number, first match wins
pub const ORG_NUMBER_ALIASES: [&str; 5] = [
    "organisationsnummer",
    "orgnr",
    "Orgnr",
    "organization_number",
    "orgNumber",
];

/// `{scheme}://{host}` of this service as the caller reached it
fn public_base(headers: &HeaderMap, fallback_port: u16) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("{}://{}", scheme, host),
        None => format!("{}://localhost:{}", scheme, fallback_port),
    }
}

/// POST /api/clientflow/dokumentlista
pub async fn handle_dokumentlista(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ErrorResponse> {
    const ENDPOINT: &str = "/api/clientflow/dokumentlista";
    let started = Instant::now();

    let body = json_body(body).map_err(|e| e.at(ENDPOINT))?;
    let org_number = extract_first_identifier(&body, &ORG_NUMBER_ALIASES, IdentifierKind::Registry)
        .map_err(|e| e.at(ENDPOINT))?;

    let token = bearer(&state, ENDPOINT).await?;

    info!("Fetching ClientFlow document list for: {}", org_number);
    let opts = Outbound::new(state.config.timeouts.registry())
        .bearer(Some(token.as_str()))
        .request_id(request_id(&headers));
    let response = state
        .upstream
        .post(
            &state.config.bolagsverket.endpoints.dokumentlista,
            &Payload::Json(dokumentlista::request_body(&org_number)),
            &opts,
        )
        .await
        .map_err(|e| e.at(ENDPOINT))?;

    if !response.is_ok() {
        let status = response.status.as_u16();
        warn!("Bolagsverket dokumentlista returned status {}", status);
        return Ok((
            response.status,
            Json(json!({
                "error": "Bolagsverket API fel",
                "message": upstream_message(&response),
                "status": status,
                "duration": started.elapsed().as_millis() as u64
            })),
        )
            .into_response());
    }

    let data = response
        .json()
        .map_err(|e| ProxyError::MalformedResponse(e.to_string()).at(ENDPOINT))?;

    let download_base = format!(
        "{}/api/bolagsverket/dokument",
        public_base(&headers, state.config.port)
    );
    let documents = dokumentlista::format_documents(&data, &download_base);
    info!("ClientFlow document list ready: {} documents", documents.len());

    Ok(Json(json!({
        "success": true,
        "organisationsnummer": org_number,
        "antalDokument": documents.len(),
        "dokument": documents,
        "timestamp": timestamp(),
        "duration": started.elapsed().as_millis() as u64
    }))
    .into_response())
}
