// CORS middleware
use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::proxy::config::AllowedOrigins;

const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

fn allowed_headers() -> [HeaderName; 5] {
    [
        header::ORIGIN,
        HeaderName::from_static("x-requested-with"),
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::AUTHORIZATION,
    ]
}

/// Build the CORS layer from `ALLOWED_ORIGINS`
pub fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(allowed_headers());

    match origins {
        AllowedOrigins::Any => layer.allow_origin(Any),
        AllowedOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        tracing::warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
                        None
                    }
                })
                .collect();
            // Credentials are only allowed with an explicit origin list
            layer
                .allow_origin(AllowOrigin::list(values))
                .allow_credentials(true)
        }
    }
}
