// Upstream client implementation
// One place for outbound headers, bodies, timeouts and transport error mapping

use axum::body::Bytes;
use axum::http::StatusCode;
use reqwest::{header, Client, Method};
use serde_json::Value;
use std::time::Duration;

use crate::error::ProxyError;
use crate::proxy::middleware::logging::REQUEST_ID_HEADER;

/// Outbound request body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

impl Payload {
    pub fn form(fields: &[(&str, &str)]) -> Self {
        Self::Form(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Json(_) => Some("application/json"),
            Self::Form(_) => Some("application/x-www-form-urlencoded"),
        }
    }
}

/// Upstream answer with the body read fully
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    /// `x-request-id` echoed by the upstream, if any
    pub request_id: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// First `max` characters of the body, for logs
    pub fn preview(&self, max: usize) -> String {
        self.text().chars().take(max).collect()
    }
}

/// Per-call outbound settings
#[derive(Debug, Clone, Copy)]
pub struct Outbound<'a> {
    pub bearer: Option<&'a str>,
    pub request_id: Option<&'a str>,
    pub accept: &'a str,
    pub timeout: Duration,
}

impl<'a> Outbound<'a> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            bearer: None,
            request_id: None,
            accept: "application/json",
            timeout,
        }
    }

    pub fn bearer(mut self, token: Option<&'a str>) -> Self {
        self.bearer = token;
        self
    }

    pub fn request_id(mut self, id: Option<&'a str>) -> Self {
        self.request_id = id;
        self
    }

    pub fn accept(mut self, accept: &'a str) -> Self {
        self.accept = accept;
        self
    }
}

pub struct UpstreamClient {
    http_client: Client,
}

impl UpstreamClient {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }

    /// Send one request. Transport failures map to `Timeout` or `Connectivity`;
    /// every HTTP status, including errors, comes back as `Ok`.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        payload: &Payload,
        opts: &Outbound<'_>,
    ) -> Result<UpstreamResponse, ProxyError> {
        let mut request = self
            .http_client
            .request(method, url)
            .timeout(opts.timeout)
            .header(header::ACCEPT, opts.accept);

        if let Some(token) = opts.bearer {
            request = request.bearer_auth(token);
        }
        if let Some(id) = opts.request_id {
            request = request.header(REQUEST_ID_HEADER, id);
        }

        request = match payload {
            Payload::Empty => request.header(header::CONTENT_TYPE, "application/json"),
            Payload::Json(body) => request.json(body),
            Payload::Form(fields) => request.form(fields),
        };

        let response = request
            .send()
            .await
            .map_err(|e| ProxyError::from_transport(&e))?;

        let status = response.status();
        let header_str = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };
        let content_type = header_str(header::CONTENT_TYPE.as_str());
        let request_id = header_str(REQUEST_ID_HEADER);
        let body = response
            .bytes()
            .await
            .map_err(|e| ProxyError::from_transport(&e))?;

        Ok(UpstreamResponse {
            status,
            content_type,
            request_id,
            body,
        })
    }

    pub async fn get(
        &self,
        url: &str,
        opts: &Outbound<'_>,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.send(Method::GET, url, &Payload::Empty, opts).await
    }

    pub async fn post(
        &self,
        url: &str,
        payload: &Payload,
        opts: &Outbound<'_>,
    ) -> Result<UpstreamResponse, ProxyError> {
        self.send(Method::POST, url, payload, opts).await
    }
}

/// Append one percent-encoded path segment to `base`
pub fn join_segment(base: &str, segment: &str) -> Result<String, ProxyError> {
    let mut url = url::Url::parse(base)
        .map_err(|e| ProxyError::Internal(format!("Invalid upstream URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| ProxyError::Internal(format!("Upstream URL cannot be a base: {}", base)))?
        .pop_if_empty()
        .push(segment);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_string, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> UpstreamClient {
        UpstreamClient::new(Client::new())
    }

    #[test]
    fn test_join_segment() {
        assert_eq!(
            join_segment("https://gw.example/v1/dokument", "abc-123").unwrap(),
            "https://gw.example/v1/dokument/abc-123"
        );
        assert_eq!(
            join_segment("https://gw.example/v1/dokument/", "a b").unwrap(),
            "https://gw.example/v1/dokument/a%20b"
        );
    }

    #[tokio::test]
    async fn test_bearer_and_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/organisationer"))
            .and(header_eq("authorization", "Bearer tok"))
            .and(header_eq("content-type", "application/json"))
            .and(body_json(serde_json::json!({"organisationsnummer": "5560000000"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .expect(1)
            .mount(&server)
            .await;

        let response = client()
            .post(
                &format!("{}/organisationer", server.uri()),
                &Payload::Json(serde_json::json!({"organisationsnummer": "5560000000"})),
                &Outbound::new(Duration::from_secs(5)).bearer(Some("tok")),
            )
            .await
            .unwrap();
        assert!(response.is_ok());
        assert_eq!(response.json().unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn test_form_body_and_error_status_passthrough() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_eq("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("organisationsnummer=5560000000"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let response = client()
            .post(
                &server.uri(),
                &Payload::form(&[("organisationsnummer", "5560000000")]),
                &Outbound::new(Duration::from_secs(5)),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.text(), "not found");
    }

    #[tokio::test]
    async fn test_request_id_and_binary_body() {
        let server = MockServer::start().await;
        let zip = vec![0x50, 0x4b, 0x03, 0x04, 0xff, 0x00];
        Mock::given(method("GET"))
            .and(header_eq("accept", "application/zip"))
            .and(header_eq("x-request-id", "req-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-request-id", "up-9")
                    .set_body_bytes(zip.clone()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = client()
            .get(
                &server.uri(),
                &Outbound::new(Duration::from_secs(5))
                    .request_id(Some("req-1"))
                    .accept("application/zip"),
            )
            .await
            .unwrap();
        assert_eq!(response.body.as_ref(), zip.as_slice());
        assert_eq!(response.request_id.as_deref(), Some("up-9"));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = client()
            .get(&server.uri(), &Outbound::new(Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Timeout));
    }

    #[tokio::test]
    async fn test_refused_maps_to_connectivity() {
        let err = client()
            .get("http://127.0.0.1:1/", &Outbound::new(Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Connectivity(_)));
    }
}
