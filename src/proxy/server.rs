use crate::error::{AppError, AppResult, ErrorResponse};
use crate::models::AppConfig;
use crate::modules::oauth::ClientCredentialsAcquirer;
use crate::proxy::upstream::UpstreamClient;
use crate::proxy::TokenManager;
use crate::utils::clock::{Clock, SystemClock};
use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, Level};

/// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub token_manager: Arc<TokenManager>,
    pub upstream: Arc<UpstreamClient>,
}

impl AppState {
    /// Wire the production collaborators: one shared reqwest client, the
    /// client-credentials acquirer and the wall clock
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        let http_client = crate::utils::http::create_client()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let acquirer = Arc::new(ClientCredentialsAcquirer::new(
            http_client.clone(),
            &config.bolagsverket,
            config.timeouts.token(),
            clock.clone(),
        ));

        Ok(Self {
            token_manager: Arc::new(TokenManager::new(acquirer, clock)),
            upstream: Arc::new(UpstreamClient::new(http_client)),
            config: Arc::new(config),
        })
    }
}

/// Build the route table
pub fn build_router(state: AppState) -> Router {
    use crate::proxy::handlers::{bolagsverket, clientflow, health, lookup};

    Router::new()
        .route("/", get(health::handle_root))
        .route("/health", get(health::handle_health))
        .route("/test", get(health::handle_test))
        .route("/test-env", get(health::handle_test_env))
        .route("/api/lookup", post(lookup::handle_lookup))
        // Bolagsverket
        .route(
            "/api/bolagsverket/test",
            get(health::handle_bolagsverket_test),
        )
        .route("/api/bolagsverket/isalive", get(bolagsverket::handle_isalive))
        .route(
            "/api/bolagsverket/organisationer",
            post(bolagsverket::handle_organisationer),
        )
        .route(
            "/api/bolagsverket/dokumentlista",
            post(bolagsverket::handle_dokumentlista),
        )
        .route(
            "/api/bolagsverket/dokument/:dokument_id",
            get(bolagsverket::handle_dokument).post(bolagsverket::handle_dokument_download),
        )
        // ClientFlow
        .route(
            "/api/clientflow/dokumentlista",
            post(clientflow::handle_dokumentlista),
        )
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CatchPanicLayer::custom(panic_handler))
        // request_logging owns the info line; spans and events here stay at debug
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(axum::middleware::from_fn(
            crate::proxy::middleware::request_logging,
        ))
        .layer(crate::proxy::middleware::cors_layer(
            &state.config.allowed_origins,
        ))
        .with_state(state)
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: std::net::SocketAddr,
}

impl AxumServer {
    /// Start Axum server
    pub async fn start(state: AppState) -> AppResult<(Self, tokio::task::JoinHandle<()>)> {
        let addr = state.config.bind_address();
        let app = build_router(state);

        // Bind address
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Server(format!("Failed to bind address {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        tracing::info!("API proxy server started at http://{}", local_addr);

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        // Start server in new task
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(app.clone());

                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection handling finished or errored: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("API proxy server stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((
            Self {
                shutdown_tx: Some(shutdown_tx),
                local_addr,
            },
            handle,
        ))
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Stop server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn not_found_handler() -> Response {
    ErrorResponse::not_found().into_response()
}

fn panic_handler(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);

    ErrorResponse::new(
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        "Internt serverfel",
        "Internal server error",
    )
    .into_response()
}
