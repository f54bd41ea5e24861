use crate::proxy::config::{AllowedOrigins, BolagsverketConfig, ExternalApiConfig, UpstreamTimeouts};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub external_api: ExternalApiConfig,
    #[serde(default)]
    pub allowed_origins: AllowedOrigins,
    #[serde(default)]
    pub bolagsverket: BolagsverketConfig,
    #[serde(default)]
    pub timeouts: UpstreamTimeouts,
    pub log_dir: Option<PathBuf>, // Daily rolling file logs when set
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            external_api: ExternalApiConfig::default(),
            allowed_origins: AllowedOrigins::default(),
            bolagsverket: BolagsverketConfig::default(),
            timeouts: UpstreamTimeouts::default(),
            log_dir: None,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}
