// Bolagsverket handlers
// Every route here needs the registry bearer token from the shared TokenManager.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{info, warn};

use super::{json_body, timestamp};
use crate::error::{ErrorResponse, ProxyError};
use crate::proxy::common::validation::{extract_identifier, IdentifierKind};
use crate::proxy::mappers::organisationer;
use crate::proxy::middleware::logging::request_id;
use crate::proxy::server::AppState;
use crate::proxy::upstream::client::join_segment;
use crate::proxy::upstream::{Outbound, Payload, UpstreamClient, UpstreamResponse};

const SOURCE: &str = "Bolagsverket";

/// Cached registry token; failures surface as 500 before any registry call
pub(crate) async fn bearer(state: &AppState, endpoint: &str) -> Result<String, ErrorResponse> {
    state
        .token_manager
        .get_token()
        .await
        .map_err(|e| ProxyError::from(e).at(endpoint))
}

/// Echo a non-200 registry answer with its own status
fn upstream_failure(response: &UpstreamResponse, body_field: &str) -> Response {
    let status = response.status.as_u16();
    warn!("Bolagsverket API returned status {}", status);

    let mut body = json!({
        "error": "Bolagsverket API fel",
        "message": format!("Bolagsverket API returned status {}", status),
        "status": status
    });
    body[body_field] = Value::String(response.text());
    (response.status, Json(body)).into_response()
}

/// `detail` or `message` from a registry error body, else a generic line
pub(crate) fn upstream_message(response: &UpstreamResponse) -> String {
    response
        .json()
        .ok()
        .and_then(|body| {
            ["detail", "message"]
                .iter()
                .find_map(|key| body.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| format!("Bolagsverket API returned status {}", response.status.as_u16()))
}

/// Body as JSON, or wrapped as raw text when the registry answered with something else
fn json_or_raw(response: &UpstreamResponse) -> (Value, bool) {
    match response.json() {
        Ok(data) => (data, true),
        Err(_) => {
            warn!(
                "Bolagsverket returned non-JSON response: {}",
                response.preview(500)
            );
            let raw = json!({
                "response_text": response.text(),
                "content_type": response.content_type.as_deref().unwrap_or("unknown")
            });
            (raw, false)
        }
    }
}

/// GET /api/bolagsverket/isalive
pub async fn handle_isalive(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ErrorResponse> {
    const ENDPOINT: &str = "/api/bolagsverket/isalive";
    let started = Instant::now();

    let token = bearer(&state, ENDPOINT).await?;
    let bolagsverket = &state.config.bolagsverket;

    info!("Testing Bolagsverket API connection");
    let opts = Outbound::new(state.config.timeouts.short())
        .bearer(Some(token.as_str()))
        .request_id(request_id(&headers));
    let response = state
        .upstream
        .get(&bolagsverket.endpoints.isalive, &opts)
        .await
        .map_err(|e| e.at(ENDPOINT))?;

    info!(
        "Bolagsverket API response status: {}, body: {}...",
        response.status,
        response.preview(500)
    );

    if !response.is_ok() {
        return Ok(upstream_failure(&response, "response_text"));
    }

    let (data, is_json) = json_or_raw(&response);
    let message = if is_json {
        "Bolagsverket API är tillgängligt"
    } else {
        "Bolagsverket API är tillgängligt (icke-JSON svar)"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": data,
        "timestamp": timestamp(),
        "duration": started.elapsed().as_millis() as u64,
        "environment": bolagsverket.environment.as_str(),
        "source": SOURCE
    }))
    .into_response())
}

/// Walk the organisationer encodings until one is not rejected with 400.
///
/// If all of them are, the canonical body is sent one last time and that answer is
/// returned whatever its status. A transport error ends the walk.
pub async fn probe_organisationer(
    upstream: &UpstreamClient,
    url: &str,
    org_number: &str,
    opts: &Outbound<'_>,
) -> Result<UpstreamResponse, ProxyError> {
    for (i, variant) in organisationer::variants(org_number).iter().enumerate() {
        info!(
            "Trying variant {}: {} with {}",
            i + 1,
            variant.label,
            variant.payload.content_type().unwrap_or("no body")
        );

        let response = upstream.post(url, &variant.payload, opts).await?;

        if organisationer::should_stop(response.status) {
            if response.is_ok() {
                info!("Success with variant {}", i + 1);
            } else {
                info!("Non-400 status with variant {}: {}", i + 1, response.status);
            }
            return Ok(response);
        }
        info!("400 status with variant {}, trying next...", i + 1);
    }

    let fallback = organisationer::fallback(org_number);
    info!("All variants rejected, sending {}", fallback.label);
    upstream.post(url, &fallback.payload, opts).await
}

/// POST /api/bolagsverket/organisationer `{organisationsnummer}`
pub async fn handle_organisationer(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ErrorResponse> {
    const ENDPOINT: &str = "/api/bolagsverket/organisationer";

    let body = json_body(body).map_err(|e| e.at(ENDPOINT))?;
    let org_number = extract_identifier(&body, "organisationsnummer", IdentifierKind::Registry)
        .map_err(|e| e.at(ENDPOINT))?;

    let token = bearer(&state, ENDPOINT).await?;

    let opts = Outbound::new(state.config.timeouts.registry())
        .bearer(Some(token.as_str()))
        .request_id(request_id(&headers));
    let response = probe_organisationer(
        &state.upstream,
        &state.config.bolagsverket.endpoints.organisationer,
        &org_number,
        &opts,
    )
    .await
    .map_err(|e| e.at(ENDPOINT))?;

    info!(
        "Bolagsverket organisationer response status: {}, body: {}...",
        response.status,
        response.preview(500)
    );

    if !response.is_ok() {
        return Ok(upstream_failure(&response, "response_text"));
    }

    let (data, is_json) = json_or_raw(&response);
    let mut out = json!({
        "success": true,
        "data": data,
        "timestamp": timestamp(),
        "orgNumber": org_number,
        "source": SOURCE
    });
    if !is_json {
        out["message"] = json!("Bolagsverket API svar (icke-JSON)");
    }
    Ok(Json(out).into_response())
}

/// POST /api/bolagsverket/dokumentlista `{organisationsnummer}`
pub async fn handle_dokumentlista(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ErrorResponse> {
    const ENDPOINT: &str = "/api/bolagsverket/dokumentlista";

    let body = json_body(body).map_err(|e| e.at(ENDPOINT))?;
    let org_number = extract_identifier(&body, "organisationsnummer", IdentifierKind::Registry)
        .map_err(|e| e.at(ENDPOINT))?;

    let token = bearer(&state, ENDPOINT).await?;

    info!("Fetching document list from Bolagsverket for: {}", org_number);
    let opts = Outbound::new(state.config.timeouts.registry())
        .bearer(Some(token.as_str()))
        .request_id(request_id(&headers));
    let response = state
        .upstream
        .post(
            &state.config.bolagsverket.endpoints.dokumentlista,
            &Payload::form(&[("organisationsnummer", org_number.as_str())]),
            &opts,
        )
        .await
        .map_err(|e| e.at(ENDPOINT))?;

    if !response.is_ok() {
        return Ok(upstream_failure(&response, "response"));
    }

    let data = response
        .json()
        .map_err(|e| ProxyError::MalformedResponse(e.to_string()).at(ENDPOINT))?;

    Ok(Json(json!({
        "success": true,
        "data": data,
        "timestamp": timestamp(),
        "orgNumber": org_number,
        "source": SOURCE
    }))
    .into_response())
}

fn dokument_id_or_reject(raw: &str, endpoint: &str) -> Result<String, ErrorResponse> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(
            ProxyError::validation("Dokument ID är obligatoriskt", "Please provide dokument ID")
                .at(endpoint),
        );
    }
    Ok(id.to_string())
}

/// GET /api/bolagsverket/dokument/{id}
pub async fn handle_dokument(
    State(state): State<AppState>,
    Path(dokument_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ErrorResponse> {
    let endpoint = format!("/api/bolagsverket/dokument/{}", dokument_id);
    let dokument_id = dokument_id_or_reject(&dokument_id, &endpoint)?;

    let token = bearer(&state, &endpoint).await?;
    let url = join_segment(&state.config.bolagsverket.endpoints.dokument, &dokument_id)
        .map_err(|e| e.at(endpoint.as_str()))?;

    info!("Fetching document from Bolagsverket: {}", dokument_id);
    let opts = Outbound::new(state.config.timeouts.short())
        .bearer(Some(token.as_str()))
        .request_id(request_id(&headers));
    let response = state
        .upstream
        .get(&url, &opts)
        .await
        .map_err(|e| e.at(endpoint.as_str()))?;

    if !response.is_ok() {
        return Ok(upstream_failure(&response, "response"));
    }

    let data = response
        .json()
        .map_err(|e| ProxyError::MalformedResponse(e.to_string()).at(endpoint.as_str()))?;

    Ok(Json(json!({
        "success": true,
        "data": data,
        "timestamp": timestamp(),
        "dokumentId": dokument_id,
        "source": SOURCE
    }))
    .into_response())
}

/// Attachment name for a downloaded document; anything outside `[A-Za-z0-9._-]` becomes `_`
fn archive_filename(dokument_id: &str) -> String {
    let safe: String = dokument_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("arsredovisning-{}.zip", safe)
}

/// POST /api/bolagsverket/dokument/{id}
///
/// Streams the registry's ZIP archive back as an attachment. Webhook callers post
/// here; any request body is ignored.
pub async fn handle_dokument_download(
    State(state): State<AppState>,
    Path(dokument_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ErrorResponse> {
    let endpoint = format!("/api/bolagsverket/dokument/{}", dokument_id);
    let started = Instant::now();
    let dokument_id = dokument_id_or_reject(&dokument_id, &endpoint)?;

    let token = bearer(&state, &endpoint).await?;
    let url = join_segment(&state.config.bolagsverket.endpoints.dokument, &dokument_id)
        .map_err(|e| e.at(endpoint.as_str()))?;

    info!("Downloading document archive from Bolagsverket: {}", dokument_id);
    let opts = Outbound::new(state.config.timeouts.registry())
        .bearer(Some(token.as_str()))
        .request_id(request_id(&headers))
        .accept("application/zip");
    let response = state
        .upstream
        .get(&url, &opts)
        .await
        .map_err(|e| e.at(endpoint.as_str()))?;

    if !response.is_ok() {
        let status = response.status.as_u16();
        warn!("Bolagsverket document download returned status {}", status);
        return Ok((
            response.status,
            Json(json!({
                "error": "Bolagsverket API fel",
                "message": upstream_message(&response),
                "status": status,
                "duration": started.elapsed().as_millis() as u64,
                "requestId": response.request_id
            })),
        )
            .into_response());
    }

    info!(
        "Document {} downloaded: {} bytes, content type {}",
        dokument_id,
        response.body.len(),
        response.content_type.as_deref().unwrap_or("unknown")
    );

    let disposition = format!("attachment; filename=\"{}\"", archive_filename(&dokument_id));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        response.body,
    )
        .into_response())
}
