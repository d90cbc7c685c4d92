/// Throttle Proxy 库入口
///
/// 将核心模块导出为库，方便测试和复用
pub mod cli;
pub mod config;
pub mod error;
pub mod rate_limiter;
pub mod server;

// 重新导出常用类型
pub use config::{RelayConfig, RelayConfigBuilder};
pub use error::{RelayError, Result};
pub use rate_limiter::RateLimiter;
pub use server::{
    establish, run_server, Acceptor, AcceptorState, ConnectionPair, Direction, Listener,
    PairSettings, PumpOutcome, PumpReport, PumpSettings,
};
