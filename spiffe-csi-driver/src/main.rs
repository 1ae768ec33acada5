use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

use spiffe_csi_driver::config::Args;
use spiffe_csi_driver::{CsiServer, Driver, VENDOR_VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json)?;

    let config = args.driver_config();
    info!(
        version = VENDOR_VERSION,
        node_id = %config.node_id,
        plugin_name = %config.plugin_name,
        workload_api_socket_dir = %config.workload_api_socket_dir.display(),
        csi_socket_path = %args.csi_socket_path.display(),
        "starting SPIFFE CSI driver"
    );

    let driver = Driver::new(config).context("failed to create driver")?;
    let server = CsiServer::new(driver);

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }
    };

    server
        .serve_unix(&args.csi_socket_path, shutdown)
        .await
        .context("failed to serve CSI endpoint")?;

    info!("SPIFFE CSI driver stopped");
    Ok(())
}

/// Install the global subscriber.  `RUST_LOG` overrides the `info` default.
fn init_logging(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
