use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder shipped in old deployment templates, treated as "not configured"
pub const EXTERNAL_API_PLACEHOLDER: &str = "https://api.example.com/organizations";

const TEST_TOKEN_URL: &str = "https://portal-accept2.api.bolagsverket.se/oauth2/token";
const TEST_GATEWAY_BASE: &str = "https://gw-accept2.api.bolagsverket.se/vardefulla-datamangder/v1";
const PROD_TOKEN_URL: &str = "https://portal.api.bolagsverket.se/oauth2/token";
const PROD_GATEWAY_BASE: &str = "https://gw.api.bolagsverket.se/vardefulla-datamangder/v1";

/// Bolagsverket deployment the proxy talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Test,
    Production,
}

impl Environment {
    /// Parse `BOLAGSVERKET_ENVIRONMENT`. `prod` is accepted as an alias.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "test" => Some(Self::Test),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

/// Resolved registry URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BolagsverketEndpoints {
    pub token: String,
    pub isalive: String,
    pub organisationer: String,
    pub dokumentlista: String,
    pub dokument: String,
}

impl BolagsverketEndpoints {
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Test => Self::from_parts(TEST_TOKEN_URL, TEST_GATEWAY_BASE),
            Environment::Production => Self::from_parts(PROD_TOKEN_URL, PROD_GATEWAY_BASE),
        }
    }

    /// Build the table from a token URL and a gateway base
    pub fn from_parts(token_url: &str, gateway_base: &str) -> Self {
        let base = gateway_base.trim_end_matches('/');
        Self {
            token: token_url.to_string(),
            isalive: format!("{}/isalive", base),
            organisationer: format!("{}/organisationer", base),
            dokumentlista: format!("{}/dokumentlista", base),
            dokument: format!("{}/dokument", base),
        }
    }
}

/// Registry client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BolagsverketConfig {
    #[serde(default)]
    pub client_id: String,

    /// Never serialized back out
    #[serde(default, skip_serializing)]
    pub client_secret: String,

    #[serde(default)]
    pub environment: Environment,

    pub endpoints: BolagsverketEndpoints,
}

impl BolagsverketConfig {
    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl Default for BolagsverketConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            environment: Environment::default(),
            endpoints: BolagsverketEndpoints::for_environment(Environment::default()),
        }
    }
}

/// Generic external organisation API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalApiConfig {
    /// `None` when unset or still the placeholder
    pub url: Option<String>,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

/// CORS origin policy from `ALLOWED_ORIGINS`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AllowedOrigins {
    #[default]
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            Self::Any
        } else {
            Self::List(origins)
        }
    }
}

/// Outbound timeouts (seconds)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpstreamTimeouts {
    /// Token acquisition
    #[serde(default = "default_long_timeout")]
    pub token: u64,

    /// organisationer and dokumentlista
    #[serde(default = "default_long_timeout")]
    pub registry: u64,

    /// External lookup API, isalive and dokument
    #[serde(default = "default_short_timeout")]
    pub short: u64,
}

impl UpstreamTimeouts {
    pub fn token(&self) -> Duration {
        Duration::from_secs(self.token)
    }

    pub fn registry(&self) -> Duration {
        Duration::from_secs(self.registry)
    }

    pub fn short(&self) -> Duration {
        Duration::from_secs(self.short)
    }
}

impl Default for UpstreamTimeouts {
    fn default() -> Self {
        Self {
            token: default_long_timeout(),
            registry: default_long_timeout(),
            short: default_short_timeout(),
        }
    }
}

fn default_long_timeout() -> u64 {
    30
}

fn default_short_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("test"), Some(Environment::Test));
        assert_eq!(Environment::parse("Production"), Some(Environment::Production));
        assert_eq!(Environment::parse("prod"), Some(Environment::Production));
        assert_eq!(Environment::parse("staging"), None);
    }

    #[test]
    fn test_endpoint_tables() {
        let test = BolagsverketEndpoints::for_environment(Environment::Test);
        assert_eq!(test.token, TEST_TOKEN_URL);
        assert_eq!(
            test.organisationer,
            "https://gw-accept2.api.bolagsverket.se/vardefulla-datamangder/v1/organisationer"
        );

        let prod = BolagsverketEndpoints::for_environment(Environment::Production);
        assert_eq!(prod.token, PROD_TOKEN_URL);
        assert_eq!(
            prod.dokument,
            "https://gw.api.bolagsverket.se/vardefulla-datamangder/v1/dokument"
        );
    }

    #[test]
    fn test_from_parts_trims_slash() {
        let e = BolagsverketEndpoints::from_parts("http://idp/token", "http://gw/v1/");
        assert_eq!(e.isalive, "http://gw/v1/isalive");
    }

    #[test]
    fn test_allowed_origins() {
        assert_eq!(AllowedOrigins::parse("*"), AllowedOrigins::Any);
        assert_eq!(AllowedOrigins::parse(""), AllowedOrigins::Any);
        assert_eq!(
            AllowedOrigins::parse("https://a.se, https://b.se"),
            AllowedOrigins::List(vec!["https://a.se".into(), "https://b.se".into()])
        );
    }
}
