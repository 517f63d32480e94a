use anyhow::Result;
use clap::Parser;
use tracing::info;

use kiosk_proxy::config::settings::ProxyConfig;
use kiosk_proxy::server::server::{start, AppState};
use kiosk_proxy::utils::logging::{init_logging, LogFormat, LogLevel};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, env = "LOG_LEVEL", value_enum, default_value = "info")]
    log_level: LogLevel,
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "compact")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. CLI / env flags and logging
    // -------------------------------

    let args = Args::parse();
    init_logging(args.log_level, args.log_format);

    // -------------------------------
    // 2. Environment configuration
    // -------------------------------

    let cfg = ProxyConfig::from_env()?;
    info!(
        photos = %cfg.upstreams.photos.base_url,
        events = %cfg.upstreams.events.base_url,
        issuer = %cfg.issuer.identity_base_url,
        "upstreams configured"
    );

    // -------------------------------
    // 3. Shared state: issuer, token cache, HTTP client
    // -------------------------------

    let state = AppState::new(cfg)?;

    // -------------------------------
    // 4. Serve until shutdown
    // -------------------------------

    start(state).await
}
