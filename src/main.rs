//! legacy-ws-gateway server entry point.
//!
//! Binds the listener and serves until Ctrl-C, echoing upgraded
//! connections back to their clients.

use tracing_subscriber::EnvFilter;

use legacy_ws_gateway::config::GatewayConfig;
use legacy_ws_gateway::server::Gateway;
use legacy_ws_gateway::ws::handler::EchoApplication;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env().map_err(|err| anyhow::anyhow!(err))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(
        addr = %config.listen_addr,
        handshake_timeout_secs = config.handshake_timeout_secs,
        "starting legacy-ws-gateway"
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    let gateway = Gateway::new(EchoApplication, config);

    tokio::select! {
        result = gateway.serve(listener) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutdown requested");
        }
    }

    Ok(())
}
