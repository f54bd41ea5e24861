// Generic organisation lookup handler

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use tracing::info;

use super::{json_body, timestamp};
use crate::error::ProxyError;
use crate::proxy::common::validation::{extract_identifier, IdentifierKind};
use crate::proxy::server::AppState;
use crate::proxy::upstream::client::join_segment;
use crate::proxy::upstream::Outbound;

/// POST /api/lookup `{orgNumber}`
///
/// Forwards to `{EXTERNAL_API_URL}/{orgNumber}` with the static API key, if any.
/// No token cache is involved here.
pub async fn handle_lookup(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ProxyError> {
    let body = json_body(body)?;
    let org_number = extract_identifier(&body, "orgNumber", IdentifierKind::Organisation)?;

    let base = state.config.external_api.url.as_deref().ok_or_else(|| {
        ProxyError::configuration(
            "Externt API inte konfigurerat",
            "Please set EXTERNAL_API_URL environment variable",
        )
    })?;
    let url = join_segment(base, &org_number)?;

    info!("Making request to external API for org number: {}", org_number);

    let response = state
        .upstream
        .get(
            &url,
            &Outbound::new(state.config.timeouts.short())
                .bearer(state.config.external_api.api_key.as_deref()),
        )
        .await?;

    if !response.is_ok() {
        let status = response.status.as_u16();
        return Ok((
            response.status,
            Json(json!({
                "error": "Externt API fel",
                "message": format!("External API returned status {}", status),
                "status": status
            })),
        )
            .into_response());
    }

    let data = response
        .json()
        .map_err(|e| ProxyError::MalformedResponse(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": data,
        "timestamp": timestamp(),
        "orgNumber": org_number
    }))
    .into_response())
}

#[cfg(test)]
mod tests {
    use crate::models::AppConfig;
    use crate::proxy::server::testing::{harness, post_json, send};
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: Option<String>, key: Option<&str>) -> AppConfig {
        let mut config = AppConfig::new();
        config.external_api.url = url;
        config.external_api.api_key = key.map(|k| k.to_string());
        config.timeouts.short = 1;
        config
    }

    #[tokio::test]
    async fn test_lookup_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/5560000000"))
            .and(header("authorization", "Bearer static-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Acme AB"})))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(
            config(Some(format!("{}/orgs", server.uri())), Some("static-key")),
            |a| a,
        );
        let (status, body) = send(
            &h.state,
            post_json("/api/lookup", &json!({"orgNumber": "556000-0000"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["orgNumber"], "5560000000");
        assert_eq!(body["data"]["name"], "Acme AB");
        // no token cache on this route
        assert_eq!(h.acquirer.calls(), 0);
    }

    #[tokio::test]
    async fn test_lookup_upstream_status_passthrough() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let h = harness(config(Some(server.uri()), None), |a| a);
        let (status, body) = send(
            &h.state,
            post_json("/api/lookup", &json!({"orgNumber": "5560000000"})),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Externt API fel");
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn test_lookup_validation() {
        let h = harness(config(Some("http://127.0.0.1:9".into()), None), |a| a);

        let (status, body) = send(&h.state, post_json("/api/lookup", &json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Ogiltig JSON-data");

        let (status, body) = send(&h.state, post_json("/api/lookup", &json!({"other": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Organisationsnummer är obligatoriskt");

        let (status, body) = send(
            &h.state,
            post_json("/api/lookup", &json!({"orgNumber": "556000000012"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Organization number should be 10-11 digits");
    }

    #[tokio::test]
    async fn test_lookup_unconfigured() {
        let h = harness(config(None, None), |a| a);
        let (status, body) = send(
            &h.state,
            post_json("/api/lookup", &json!({"orgNumber": "5560000000"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Externt API inte konfigurerat");
    }

    #[tokio::test]
    async fn test_lookup_timeout_and_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let h = harness(config(Some(server.uri()), None), |a| a);
        let (status, _) = send(
            &h.state,
            post_json("/api/lookup", &json!({"orgNumber": "5560000000"})),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

        let h = harness(config(Some("http://127.0.0.1:1".into()), None), |a| a);
        let (status, body) = send(
            &h.state,
            post_json("/api/lookup", &json!({"orgNumber": "5560000000"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Externt API otillgängligt");
    }
}
