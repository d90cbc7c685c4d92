use anyhow::{Context, Result};
use serde::Deserialize;

use super::{validator::ConfigValidator, RelayConfig, DEFAULT_MAX_ACCEPT_ERRORS};

/// RelayConfig Builder
///
/// 也作为配置文件的反序列化目标，文件中缺省的字段可以由命令行补全。
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfigBuilder {
    listen_addr: Option<String>,
    forward_addr: Option<String>,
    throughput: Option<u32>,
    idle_timeout_secs: Option<u64>,
    strict_buffer_tuning: Option<bool>,
    max_accept_errors: Option<u32>,
    drain_timeout_secs: Option<u64>,
}

impl RelayConfigBuilder {
    /// 创建新的 Builder
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置监听地址
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// 设置转发地址
    pub fn forward_addr(mut self, addr: impl Into<String>) -> Self {
        self.forward_addr = Some(addr.into());
        self
    }

    /// 设置吞吐量（字节/秒）
    pub fn throughput(mut self, bytes_per_second: u32) -> Self {
        self.throughput = Some(bytes_per_second);
        self
    }

    /// 设置空闲超时（秒）
    pub fn idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = Some(secs);
        self
    }

    /// 设置是否严格要求缓冲区调整成功
    pub fn strict_buffer_tuning(mut self, strict: bool) -> Self {
        self.strict_buffer_tuning = Some(strict);
        self
    }

    /// 设置允许的连续 accept 失败次数
    pub fn max_accept_errors(mut self, max: u32) -> Self {
        self.max_accept_errors = Some(max);
        self
    }

    /// 设置关闭时的排空等待时间（秒）
    pub fn drain_timeout_secs(mut self, secs: u64) -> Self {
        self.drain_timeout_secs = Some(secs);
        self
    }

    /// 构建 RelayConfig 并验证
    pub fn build(self) -> Result<RelayConfig> {
        let config = RelayConfig {
            listen_addr: self.listen_addr.context("listen_addr is required")?,
            forward_addr: self.forward_addr.context("forward_addr is required")?,
            throughput: self.throughput.context("throughput is required")?,
            idle_timeout_secs: self.idle_timeout_secs,
            strict_buffer_tuning: self.strict_buffer_tuning.unwrap_or(false),
            max_accept_errors: self.max_accept_errors.unwrap_or(DEFAULT_MAX_ACCEPT_ERRORS),
            drain_timeout_secs: self.drain_timeout_secs,
        };

        // 验证配置
        ConfigValidator::validate_relay_config(&config)?;

        Ok(config)
    }
}
