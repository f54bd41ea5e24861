use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::TokenError;
use crate::proxy::config::BolagsverketConfig;
use crate::utils::clock::Clock;

// Bolagsverket OAuth configuration
pub const SCOPE: &str = "vardefulla-datamangder:read vardefulla-datamangder:ping";
pub const DEFAULT_EXPIRES_IN: i64 = 3600;
/// Tokens are treated as expired this many seconds before the server says so
pub const EXPIRY_MARGIN_SECS: i64 = 600;

/// Bearer token with its absolute expiry
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Usable strictly before `expires_at`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait TokenAcquirer: Send + Sync {
    async fn acquire(&self) -> Result<CachedToken, TokenError>;
}

/// Largest lifetime taken at face value; anything outside `0..=MAX_EXPIRES_IN` is
/// treated like a missing `expires_in`
pub const MAX_EXPIRES_IN: i64 = 366 * 24 * 3600;

/// Compute the cached expiry from the server-declared lifetime
pub fn expiry_from(issued_at: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    let secs = expires_in.clamp(0, MAX_EXPIRES_IN) - EXPIRY_MARGIN_SECS;
    issued_at
        .checked_add_signed(Duration::seconds(secs))
        .unwrap_or(issued_at)
}

fn in_range(secs: i64) -> Option<i64> {
    (0..=MAX_EXPIRES_IN).contains(&secs).then_some(secs)
}

/// Read `expires_in`, tolerating floats and numeric strings
fn parse_expires_in(body: &Value) -> i64 {
    let parsed = match body.get("expires_in") {
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && *f <= MAX_EXPIRES_IN as f64)
                .map(|f| f as i64)
        }),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match parsed {
        Some(secs) => in_range(secs).unwrap_or_else(|| {
            tracing::warn!(
                "Ignoring out-of-range expires_in {}, using {}",
                secs,
                DEFAULT_EXPIRES_IN
            );
            DEFAULT_EXPIRES_IN
        }),
        None => DEFAULT_EXPIRES_IN,
    }
}

/// Parse a successful token endpoint body
pub fn parse_token_response(
    body: &str,
    issued_at: DateTime<Utc>,
) -> Result<CachedToken, TokenError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| TokenError::MalformedResponse(format!("Token parsing failed: {}", e)))?;

    let value = json
        .get("access_token")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TokenError::MalformedResponse("Missing access_token".to_string()))?
        .to_string();

    let expires_in = parse_expires_in(&json);

    Ok(CachedToken {
        value,
        expires_at: expiry_from(issued_at, expires_in),
    })
}

/// OAuth2 client-credentials grant against the Bolagsverket portal
pub struct ClientCredentialsAcquirer {
    http_client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    timeout: std::time::Duration,
    clock: Arc<dyn Clock>,
}

impl ClientCredentialsAcquirer {
    pub fn new(
        http_client: reqwest::Client,
        config: &BolagsverketConfig,
        timeout: std::time::Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http_client,
            token_url: config.endpoints.token.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            timeout,
            clock,
        }
    }
}

#[async_trait]
impl TokenAcquirer for ClientCredentialsAcquirer {
    async fn acquire(&self) -> Result<CachedToken, TokenError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(TokenError::Configuration(
                "Bolagsverket Client ID och Client Secret måste konfigureras".to_string(),
            ));
        }

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", SCOPE),
        ];

        tracing::info!("Requesting OAuth2 token from: {}", self.token_url);

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TokenError::Timeout
                } else {
                    TokenError::Connectivity(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TokenError::Timeout
            } else {
                TokenError::Connectivity(e.to_string())
            }
        })?;

        if !status.is_success() {
            tracing::error!("Token request failed: {} - {}", status.as_u16(), body);
            return Err(TokenError::UpstreamAuth {
                status: status.as_u16(),
                body,
            });
        }

        let token = parse_token_response(&body, self.clock.now())?;
        tracing::info!(
            "New Bolagsverket OAuth token acquired, expires: {}",
            token.expires_at.to_rfc3339()
        );
        Ok(token)
    }
}
