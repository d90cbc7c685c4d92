use anyhow::Result;
use clap::{error::ErrorKind, CommandFactory};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::config::resolve_config;
use super::Cli;
use crate::server;

/// Execute CLI commands
pub async fn execute_command(cli: &Cli) -> Result<()> {
    if cli.config.is_none() && !cli.has_positionals() {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "expected LISTEN, FORWARD and THROUGHPUT (or --config)",
            )
            .exit();
    }

    let config = resolve_config(cli)?;

    if cli.check {
        println!(
            "Configuration OK: {} -> {} at {} bytes/s",
            config.listen_addr, config.forward_addr, config.throughput
        );
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, stopping relay...");
        trigger.cancel();
    });

    server::run_server(config, shutdown).await?;

    info!("Relay stopped");
    Ok(())
}

/// 等待 Ctrl+C（Unix 上还包括 SIGTERM）
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!("Failed to listen for Ctrl+C: {}", e);
                            std::future::pending::<()>().await;
                        }
                    }
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
