use anyhow::{bail, Result};
use tracing::warn;

use super::RelayConfig;

/// 超过该吞吐量时给出内存占用警告（每个泵都会分配同样大小的缓冲区）
const LARGE_THROUGHPUT_WARN: u32 = 64 * 1024 * 1024;

/// 配置验证器 - 负责所有配置验证逻辑
pub struct ConfigValidator;

impl ConfigValidator {
    /// 验证 host:port 形式的地址
    pub fn validate_address(addr: &str, context: &str) -> Result<()> {
        if addr.trim().is_empty() {
            bail!("{}: address cannot be empty", context);
        }

        let Some((host, port)) = addr.rsplit_once(':') else {
            bail!("{}: '{}' is not in host:port form", context, addr);
        };

        if host.trim().is_empty() {
            bail!(
                "{}: '{}' is missing a host (use 0.0.0.0:{} to listen on all interfaces)",
                context,
                addr,
                port
            );
        }

        match port.parse::<u16>() {
            Ok(_) => Ok(()),
            Err(_) => bail!("{}: '{}' has an invalid port", context, addr),
        }
    }

    /// 验证吞吐量
    pub fn validate_throughput(throughput: u32) -> Result<()> {
        if throughput == 0 {
            bail!("throughput must be greater than 0");
        }
        if throughput > LARGE_THROUGHPUT_WARN {
            warn!(
                "throughput is very large ({} bytes/s = {} MB/s), \
                 every connection allocates two buffers of this size",
                throughput,
                throughput / (1024 * 1024)
            );
        }
        Ok(())
    }

    /// 验证中继配置
    pub fn validate_relay_config(config: &RelayConfig) -> Result<()> {
        Self::validate_address(&config.listen_addr, "listen_addr")?;
        Self::validate_address(&config.forward_addr, "forward_addr")?;
        Self::validate_throughput(config.throughput)?;

        if config.max_accept_errors == 0 {
            bail!("max_accept_errors must be greater than 0");
        }

        if config.idle_timeout_secs == Some(0) {
            bail!("idle_timeout_secs must be greater than 0 when set");
        }

        Ok(())
    }
}
