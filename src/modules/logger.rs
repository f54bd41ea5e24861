use std::fs;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize logger system.
///
/// Console output is always on. With a log directory, records are also written to a
/// daily rolling file; keep the returned guard alive so buffered lines get flushed.
pub fn init_logger(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Capture log macro logs
    let _ = tracing_log::LogTracer::init();

    // Console output layer
    let console_layer = fmt::Layer::new()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    // File output layer (disable ANSI formatting)
    let (file_layer, guard) = match log_dir.map(prepare_log_dir) {
        Some(Ok(dir)) => {
            let file_appender = tracing_appender::rolling::daily(dir, "orgproxy.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::Layer::new()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        Some(Err(e)) => {
            eprintln!("Failed to initialize log directory: {}", e);
            (None, None)
        }
        None => (None, None),
    };

    // Filter layer (default to INFO and above)
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // try_init so a second call (tests) does not panic
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    info!(
        "Logger system initialized ({})",
        if guard.is_some() {
            "Console + File Persistence"
        } else {
            "Console"
        }
    );
    guard
}

fn prepare_log_dir(dir: &Path) -> std::io::Result<&Path> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(dir)
}
