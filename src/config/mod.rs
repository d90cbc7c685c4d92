// 配置管理模块 - 使用模块化设计

mod builder;
mod validator;

// 重新导出 builder 和 validator
pub use builder::RelayConfigBuilder;
pub use validator::ConfigValidator;

use anyhow::Context;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

/// 连续 accept 失败的默认上限
pub const DEFAULT_MAX_ACCEPT_ERRORS: u32 = 64;

fn default_max_accept_errors() -> u32 {
    DEFAULT_MAX_ACCEPT_ERRORS
}

/// 中继配置
///
/// 进程生命周期内不可变。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    /// 监听地址（host:port）
    pub listen_addr: String,
    /// 转发地址（host:port）
    pub forward_addr: String,
    /// 每个方向每秒允许的最大字节数
    pub throughput: u32,
    /// 空闲超时（秒），不设置则永不超时
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
    /// 缓冲区调整失败时是否拒绝连接（默认仅警告）
    #[serde(default)]
    pub strict_buffer_tuning: bool,
    /// 允许的连续 accept 失败次数
    #[serde(default = "default_max_accept_errors")]
    pub max_accept_errors: u32,
    /// 关闭时等待已有连接排空的时间（秒），不设置则立即退出
    #[serde(default)]
    pub drain_timeout_secs: Option<u64>,
}

impl RelayConfig {
    /// 创建 Builder
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::new()
    }

    /// 验证配置
    pub fn validate(&self) -> anyhow::Result<()> {
        ConfigValidator::validate_relay_config(self)
    }

    /// 吞吐量（已验证大于 0）
    pub fn throughput_limit(&self) -> anyhow::Result<NonZeroU32> {
        NonZeroU32::new(self.throughput).context("throughput must be greater than 0")
    }

    /// 每个泵的缓冲区大小，等于一秒的配额
    pub fn buffer_size(&self) -> usize {
        self.throughput as usize
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_secs.map(Duration::from_secs)
    }

    /// 从 TOML 文件加载（字段可缺省，由命令行补全）
    pub fn load_builder(path: &str) -> anyhow::Result<RelayConfigBuilder> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path))?;
        let builder: RelayConfigBuilder =
            toml::from_str(&content).context("Failed to parse relay configuration")?;
        Ok(builder)
    }

    /// 从 TOML 文件加载完整配置并验证
    pub fn load(path: &str) -> anyhow::Result<Self> {
        Self::load_builder(path)?
            .build()
            .context("Relay configuration validation failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RelayConfig {
        RelayConfig {
            listen_addr: "127.0.0.1:8080".to_string(),
            forward_addr: "127.0.0.1:80".to_string(),
            throughput: 1000,
            idle_timeout_secs: None,
            strict_buffer_tuning: false,
            max_accept_errors: DEFAULT_MAX_ACCEPT_ERRORS,
            drain_timeout_secs: None,
        }
    }

    #[test]
    fn test_relay_config_validation() {
        let mut config = sample();
        assert!(config.validate().is_ok());

        config.throughput = 0;
        assert!(config.validate().is_err());

        config.throughput = 1000;
        config.forward_addr = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_values() {
        let mut config = sample();
        assert_eq!(config.buffer_size(), 1000);
        assert_eq!(config.throughput_limit().unwrap().get(), 1000);
        assert_eq!(config.idle_timeout(), None);

        config.idle_timeout_secs = Some(30);
        config.drain_timeout_secs = Some(5);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.drain_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_toml_deserialization_defaults() {
        let toml_str = r#"
            listen_addr = "0.0.0.0:9000"
            forward_addr = "example.com:80"
            throughput = 2048
        "#;

        let config: RelayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.throughput, 2048);
        assert!(!config.strict_buffer_tuning);
        assert_eq!(config.max_accept_errors, DEFAULT_MAX_ACCEPT_ERRORS);
        assert!(config.idle_timeout_secs.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "throttle-proxy-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "listen_addr = \"127.0.0.1:7000\"\nforward_addr = \"127.0.0.1:7001\"\nthroughput = 512\nidle_timeout_secs = 10\n",
        )
        .unwrap();

        let config = RelayConfig::load(path.to_str().unwrap()).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(config.listen_addr, "127.0.0.1:7000");
        assert_eq!(config.throughput, 512);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(10)));
    }
}
