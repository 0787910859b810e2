#![cfg(not(tarpaulin_include))]

use clap::Parser;
use floor_dashboard::app;
use floor_dashboard::config::Config;

/// Main entry point for the dashboard server
///
/// Logging defaults to `info`; override with `RUST_LOG`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::info!(
        "data dir {}, refresh every {}s",
        config.data_dir.display(),
        config.refresh_secs
    );

    app::run(config).await
}
