//! Daemon entry point for summit.
//!
//! Loads configuration from flags and the environment, builds the summarizer
//! and serves the upload API over HTTP.

mod config;
mod summarizer;

use summit_core::SummitControlPlane;
use summit_http::SummitServer;
use tracing_subscriber::EnvFilter;

use crate::config::SummitConfig;
use crate::summarizer::build_summarizer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = SummitConfig::from_args()?;
    init_tracing(config.debug);

    let summarizer = build_summarizer(&config)?;
    let control = SummitControlPlane::new(summarizer, config.processing_options());
    tracing::info!(summarizer = control.summarizer_name(), debug = config.debug, "starting summit");

    SummitServer::new(control, config.http_config()).serve().await
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
