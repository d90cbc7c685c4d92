use anyhow::{Context, Result};
use std::path::PathBuf;

use super::Cli;
use crate::config::{RelayConfig, RelayConfigBuilder};

/// Expand path with tilde (~) and make it absolute
pub fn expand_path(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path);
    let path_buf = PathBuf::from(expanded.as_ref());

    if path_buf.is_absolute() {
        Ok(expanded.into_owned())
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&path_buf)
            .to_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid path: {}", path))
    }
}

/// 合并配置文件与命令行参数，命令行优先
pub fn resolve_config(cli: &Cli) -> Result<RelayConfig> {
    let mut builder = match &cli.config {
        Some(path) => {
            let path = expand_path(path)?;
            RelayConfig::load_builder(&path)?
        }
        None => RelayConfigBuilder::new(),
    };

    if let Some(listen) = &cli.listen {
        builder = builder.listen_addr(listen.as_str());
    }
    if let Some(forward) = &cli.forward {
        builder = builder.forward_addr(forward.as_str());
    }
    if let Some(throughput) = cli.throughput {
        builder = builder.throughput(throughput);
    }
    if let Some(secs) = cli.idle_timeout {
        builder = builder.idle_timeout_secs(secs);
    }
    if let Some(secs) = cli.drain_timeout {
        builder = builder.drain_timeout_secs(secs);
    }
    if cli.strict_buffers {
        builder = builder.strict_buffer_tuning(true);
    }
    if let Some(max) = cli.max_accept_errors {
        builder = builder.max_accept_errors(max);
    }

    builder.build().context("Invalid relay configuration")
}
