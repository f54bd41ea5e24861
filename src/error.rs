use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Startup and process-level failures
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Failures of the OAuth2 client-credentials exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("{0}")]
    Configuration(String),

    #[error("Token request timed out")]
    Timeout,

    #[error("Token endpoint unreachable: {0}")]
    Connectivity(String),

    #[error("Token request failed: {status}")]
    UpstreamAuth { status: u16, body: String },

    #[error("Malformed token response: {0}")]
    MalformedResponse(String),
}

/// Handler-level failures, rendered as `{error, message}` JSON bodies.
///
/// Non-2xx upstream answers are not represented here: handlers echo them with the
/// upstream status instead.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("{message}")]
    Validation { error: String, message: String },

    #[error("Invalid JSON data in request body")]
    InvalidJson,

    #[error("{message}")]
    Configuration { error: String, message: String },

    #[error("Upstream request timed out")]
    Timeout,

    #[error("Upstream not responding: {0}")]
    Connectivity(String),

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("{0}")]
    Internal(String),
}

impl ProxyError {
    pub fn validation(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn configuration(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            error: error.into(),
            message: message.into(),
        }
    }

    /// Classify a reqwest transport failure
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Connectivity(err.to_string())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::InvalidJson => StatusCode::BAD_REQUEST,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Connectivity(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration { .. }
            | Self::MalformedResponse(_)
            | Self::Token(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for the `error` field
    fn label(&self) -> &str {
        match self {
            Self::Validation { error, .. } | Self::Configuration { error, .. } => error,
            Self::InvalidJson => "Ogiltig JSON-data",
            Self::Timeout => "Timeout från externt API",
            Self::Connectivity(_) => "Externt API otillgängligt",
            Self::MalformedResponse(_) => "Ogiltigt svar från externt API",
            Self::Token(_) => "Fel vid hämtning av Bolagsverket-token",
            Self::Internal(_) => "Internt serverfel",
        }
    }

    /// Attach the originating route to the rendered body
    pub fn at(self, endpoint: impl Into<String>) -> ErrorResponse {
        ErrorResponse::from(self).with_field("endpoint", endpoint.into())
    }
}

/// Rendered error body with its status code.
#[derive(Debug)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub body: Map<String, Value>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert("error".into(), json!(error));
        body.insert("message".into(), json!(message.into()));
        Self { status, body }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.body.insert(key.to_string(), value.into());
        self
    }

    pub fn not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "Endpoint hittades inte",
            "Requested endpoint not found",
        )
    }
}

impl From<ProxyError> for ErrorResponse {
    fn from(err: ProxyError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", err);
        }
        let message = match &err {
            ProxyError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        Self::new(status, err.label(), message)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(Value::Object(self.body))).into_response()
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ProxyError::validation("x", "y").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ProxyError::Timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ProxyError::Connectivity("refused".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ProxyError::Token(TokenError::Timeout).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_shape() {
        let rendered = ProxyError::validation(
            "Ogiltigt organisationsnummer format",
            "Organization number should be 10-11 digits",
        )
        .at("/api/lookup");
        assert_eq!(rendered.status, StatusCode::BAD_REQUEST);
        assert_eq!(rendered.body["error"], "Ogiltigt organisationsnummer format");
        assert_eq!(
            rendered.body["message"],
            "Organization number should be 10-11 digits"
        );
        assert_eq!(rendered.body["endpoint"], "/api/lookup");
    }

    #[test]
    fn test_internal_message_hidden() {
        let rendered = ErrorResponse::from(ProxyError::Internal("db exploded".into()));
        assert_eq!(rendered.body["message"], "Internal server error");
    }
}
