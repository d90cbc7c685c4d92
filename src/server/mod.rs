pub mod connection;
pub mod pump;
pub mod socket;

pub use connection::{establish, ConnectionPair, PairSettings};
pub use pump::{pump, Direction, PumpOutcome, PumpReport, PumpSettings};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// accept 失败后的退避时间，避免文件描述符耗尽时空转
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// 监听器抽象
///
/// 生产环境使用 `TcpListener`，测试中可以注入返回错误的实现。
#[async_trait]
pub trait Listener: Send {
    /// 接受新的入站连接
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)>;

    /// 获取监听地址
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl Listener for TcpListener {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// 接收器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptorState {
    Running,
    /// 终止状态，不会再回到 Running
    ShuttingDown,
}

/// 接收循环与关闭协调
pub struct Acceptor<L> {
    listener: L,
    pair: Arc<PairSettings>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    max_accept_errors: u32,
    state: AcceptorState,
}

impl<L: Listener> Acceptor<L> {
    /// 使用已绑定的监听器和关闭令牌创建接收器
    pub fn new(listener: L, config: &RelayConfig, shutdown: CancellationToken) -> Result<Self> {
        let throughput = config
            .throughput_limit()
            .map_err(|e| RelayError::config_error(e.to_string()))?;

        let pair = PairSettings {
            forward_addr: config.forward_addr.clone(),
            pump: PumpSettings {
                limiter: RateLimiter::new(throughput),
                buffer_size: config.buffer_size(),
                idle_timeout: config.idle_timeout(),
            },
            strict_buffer_tuning: config.strict_buffer_tuning,
        };

        Ok(Self {
            listener,
            pair: Arc::new(pair),
            shutdown,
            tracker: TaskTracker::new(),
            max_accept_errors: config.max_accept_errors,
            state: AcceptorState::Running,
        })
    }

    pub fn state(&self) -> AcceptorState {
        self.state
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// 所有连接对任务的跟踪器，可用于等待排空
    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }

    /// 运行接收循环直到关闭令牌被触发
    ///
    /// 关闭期间出现的 accept 错误被静默忽略；运行期间的错误会记录并继续，
    /// 连续失败达到上限时返回最后一个错误。
    /// 返回前关闭监听器，但不会中断已在运行的泵。
    pub async fn run(mut self) -> Result<()> {
        let mut consecutive_errors: u32 = 0;

        let result = loop {
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                accepted = self.listener.accept() => Some(accepted),
            };

            let Some(accepted) = accepted else {
                self.state = AcceptorState::ShuttingDown;
                break Ok(());
            };

            match accepted {
                Ok((inbound, peer_addr)) => {
                    consecutive_errors = 0;
                    debug!("Accepted connection from {}", peer_addr);

                    let pair = Arc::clone(&self.pair);
                    let tracker = self.tracker.clone();
                    self.tracker.spawn(async move {
                        if let Err(e) = establish(inbound, &pair, &tracker).await {
                            debug!("{}: connection not established: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) if self.shutdown.is_cancelled() => {
                    // 监听器因关闭而失效，不是真正的错误
                    debug!("Ignoring accept error during shutdown: {}", e);
                    self.state = AcceptorState::ShuttingDown;
                    break Ok(());
                }
                Err(e) => {
                    consecutive_errors += 1;
                    error!("accept: {}", e);
                    if consecutive_errors >= self.max_accept_errors {
                        break Err(RelayError::accept_failed(consecutive_errors, e));
                    }
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        };

        self.tracker.close();
        drop(self.listener);
        info!("Listener closed ({:?})", self.state);

        result
    }
}

/// 绑定监听地址
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| RelayError::bind(addr, e))
}

/// 运行中继服务器
///
/// 绑定失败是唯一导致返回错误的启动条件。关闭令牌触发后关闭监听器，
/// 若配置了排空时间则等待已有连接结束（最多等待该时间）。
pub async fn run_server(config: RelayConfig, shutdown: CancellationToken) -> Result<()> {
    let listener = bind(&config.listen_addr).await?;

    info!(
        "Relaying {} -> {} at {} bytes/s",
        listener.local_addr()?,
        config.forward_addr,
        config.throughput
    );

    let acceptor = Acceptor::new(listener, &config, shutdown)?;
    let tracker = acceptor.tracker();

    acceptor.run().await?;

    if let Some(drain_timeout) = config.drain_timeout() {
        if !tracker.is_empty() {
            info!(
                "Waiting up to {:?} for {} connection tasks to finish",
                drain_timeout,
                tracker.len()
            );
            if tokio::time::timeout(drain_timeout, tracker.wait())
                .await
                .is_err()
            {
                warn!("Drain timeout elapsed, {} tasks still running", tracker.len());
            }
        }
    }

    Ok(())
}
