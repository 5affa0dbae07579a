// Use mimalloc as the global allocator for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use std::sync::Arc;

use shadowsocks_node::business::{
    build_inbound, ApiManager, NodeService, PanelApi, PanelConfig,
};
use shadowsocks_node::config::CliArgs;
use shadowsocks_node::core::{MemoryEngine, ProxyEngine};
use shadowsocks_node::logger::{self, log};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = CliArgs::parse_args();
    cli.validate()?;

    // Initialize logger
    logger::init_logger(&cli.log_mode)?;

    log::info!(
        api = %cli.api,
        node = cli.node,
        interval_secs = cli.sys_interval.as_secs(),
        "Starting shadowsocks node"
    );

    let api: Arc<dyn PanelApi> = Arc::new(ApiManager::new(PanelConfig::from_cli(&cli))?);

    // Port and cipher are fixed for the process lifetime
    let node = api
        .fetch_node_info()
        .await
        .context("failed to fetch node config")?;

    let descriptor = build_inbound(&node).context("failed to build inbound")?;
    let engine = Arc::new(MemoryEngine::new());
    engine
        .add_inbound(&descriptor)
        .context("failed to create inbound")?;
    log::info!(tag = %descriptor.tag, port = node.server_port, "Inbound created");

    let mut service = NodeService::new(engine, Arc::clone(&api), &node, cli.task_config())?;
    service
        .start()
        .await
        .context("initial user sync failed")?;

    wait_for_shutdown().await;

    service.close().await;
    log::info!("Node stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => log::info!("SIGINT received, shutting down..."),
                    _ = sigterm.recv() => log::info!("SIGTERM received, shutting down..."),
                }
                return;
            }
            _ => log::warn!("Failed to install unix signal handlers, falling back to ctrl-c"),
        }
    }

    tokio::signal::ctrl_c().await.ok();
    log::info!("Shutdown signal received...");
}
