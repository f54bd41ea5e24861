use crate::error::{AppError, AppResult};
use crate::models::AppConfig;
use crate::proxy::config::{
    AllowedOrigins, BolagsverketEndpoints, Environment, ExternalApiConfig,
    EXTERNAL_API_PLACEHOLDER,
};
use std::path::PathBuf;

/// Load application config from the process environment
pub fn load_app_config() -> AppResult<AppConfig> {
    load_from(|key| std::env::var(key).ok())
}

/// Load config through an arbitrary variable lookup. Empty values count as unset.
pub fn load_from<F>(lookup: F) -> AppResult<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let mut config = AppConfig::new();

    if let Some(port) = get("PORT") {
        config.port = port
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid PORT {:?}: {}", port, e)))?;
    }
    if let Some(host) = get("HOST") {
        config.host = host;
    }

    config.external_api = ExternalApiConfig {
        url: get("EXTERNAL_API_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| u != EXTERNAL_API_PLACEHOLDER),
        api_key: get("EXTERNAL_API_KEY"),
    };

    if let Some(origins) = get("ALLOWED_ORIGINS") {
        config.allowed_origins = AllowedOrigins::parse(&origins);
    }

    let bv = &mut config.bolagsverket;
    bv.client_id = get("BOLAGSVERKET_CLIENT_ID").unwrap_or_default();
    bv.client_secret = get("BOLAGSVERKET_CLIENT_SECRET").unwrap_or_default();
    bv.environment = match get("BOLAGSVERKET_ENVIRONMENT") {
        Some(raw) => Environment::parse(&raw).unwrap_or_else(|| {
            tracing::warn!(
                "Unknown BOLAGSVERKET_ENVIRONMENT {:?}, falling back to test",
                raw
            );
            Environment::Test
        }),
        None => Environment::Test,
    };

    let defaults = BolagsverketEndpoints::for_environment(bv.environment);
    bv.endpoints = match (get("BOLAGSVERKET_TOKEN_URL"), get("BOLAGSVERKET_BASE_URL")) {
        (None, None) => defaults,
        (token, base) => {
            let token = token.unwrap_or(defaults.token.clone());
            match base {
                Some(base) => BolagsverketEndpoints::from_parts(&token, &base),
                None => BolagsverketEndpoints { token, ..defaults },
            }
        }
    };

    for url in [&bv.endpoints.token, &bv.endpoints.isalive] {
        url::Url::parse(url)
            .map_err(|e| AppError::Config(format!("Invalid Bolagsverket URL {}: {}", url, e)))?;
    }

    config.log_dir = get("LOG_DIR").map(PathBuf::from);

    Ok(config)
}
