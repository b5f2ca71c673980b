//! Console logging through `tracing`.
//!
//! Verbosity is controlled with the `RUST_LOG` environment variable
//! (default `info`). The free functions below are safe to call before
//! initialization, the subscriber is installed on first use.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .finish();

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Failed to initialize tracing: {}", e);
        }
    });
}

pub fn info(msg: &str) {
    init_tracing();
    tracing::info!("{}", msg);
}

pub fn warn(msg: &str) {
    init_tracing();
    tracing::warn!("{}", msg);
}

pub fn error(msg: &str) {
    init_tracing();
    tracing::error!("{}", msg);
}

pub fn debug(msg: &str) {
    init_tracing();
    tracing::debug!("{}", msg);
}
