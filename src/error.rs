/// 自定义错误类型
///
/// 使用 thiserror 定义精确的错误类型，调用者可以根据错误种类决定
/// 是终止进程、放弃单个连接还是继续运行
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Throttle Proxy 的主要错误类型
#[derive(Error, Debug)]
pub enum RelayError {
    /// 监听地址绑定失败（启动阶段致命错误）
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// 连接转发地址失败
    #[error("Failed to connect to {addr}: {source}")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// 套接字不支持缓冲区调整
    #[error("Connection {peer} does not support buffer tuning: {source}")]
    BufferTuningUnsupported {
        peer: String,
        #[source]
        source: io::Error,
    },

    /// 非关闭引起的 accept 错误
    #[error("Accept failed after {attempts} consecutive errors: {source}")]
    AcceptFailed {
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O 错误
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 其他错误（保留与 anyhow 的兼容性）
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// 创建绑定失败错误
    pub fn bind(addr: impl Into<String>, source: io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }

    /// 创建连接失败错误
    pub fn connection_failed(addr: impl Into<String>, source: io::Error) -> Self {
        Self::ConnectionFailed {
            addr: addr.into(),
            source,
        }
    }

    /// 创建缓冲区调整失败错误
    pub fn buffer_tuning_unsupported(peer: Option<SocketAddr>, source: io::Error) -> Self {
        Self::BufferTuningUnsupported {
            peer: peer
                .map(|a| a.to_string())
                .unwrap_or_else(|| "unknown".into()),
            source,
        }
    }

    /// 创建 accept 失败错误
    pub fn accept_failed(attempts: u32, source: io::Error) -> Self {
        Self::AcceptFailed { attempts, source }
    }

    /// 创建配置错误
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// 检查是否为绑定错误
    pub fn is_bind(&self) -> bool {
        matches!(self, Self::Bind { .. })
    }

    /// 检查是否为连接失败
    pub fn is_connection_failed(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }

    /// 检查是否为缓冲区调整失败
    pub fn is_buffer_tuning_unsupported(&self) -> bool {
        matches!(self, Self::BufferTuningUnsupported { .. })
    }

    /// 检查是否为配置错误
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }
}
