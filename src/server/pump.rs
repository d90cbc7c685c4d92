use super::socket::{peer_label, shutdown_both, shutdown_read};
use crate::rate_limiter::RateLimiter;
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 单个方向泵的参数
#[derive(Debug, Clone, Copy)]
pub struct PumpSettings {
    /// 速率限制器
    pub limiter: RateLimiter,
    /// 单次读取的最大字节数
    pub buffer_size: usize,
    /// 单次读或写允许阻塞的最长时间，`None` 表示不限
    pub idle_timeout: Option<Duration>,
}

/// 数据流动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// 入站客户端 → 转发目标
    Upstream,
    /// 转发目标 → 入站客户端
    Downstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upstream => write!(f, "upstream"),
            Direction::Downstream => write!(f, "downstream"),
        }
    }
}

/// 泵的结束原因
#[derive(Debug)]
pub enum PumpOutcome {
    /// 源端正常结束发送，已半关闭目标的写方向
    Eof,
    /// 目标拒绝继续写入，已半关闭源的读方向
    PeerClosed,
    /// 读或写超过空闲超时，两端均已关闭
    IdleTimeout,
    /// 其他 I/O 错误，两端均已关闭
    Failed(io::Error),
}

impl PumpOutcome {
    /// 是否为正常的半关闭结束
    pub fn is_half_close(&self) -> bool {
        matches!(self, PumpOutcome::Eof | PumpOutcome::PeerClosed)
    }
}

/// 泵结束后的报告
#[derive(Debug)]
pub struct PumpReport {
    pub direction: Direction,
    pub outcome: PumpOutcome,
    /// 成功写入目标的字节数
    pub bytes: u64,
}

/// 读端出错时是否等同于对端结束发送
fn is_closed_on_read(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::BrokenPipe
}

/// 写端出错时是否表示对端已不再接收
fn is_peer_reset(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    )
}

/// 按空闲超时执行一次 I/O，超时返回 `None`
async fn guarded<F: Future>(idle_timeout: Option<Duration>, fut: F) -> Option<F::Output> {
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// 单向转发数据并限速，直到任一方向结束
///
/// 每一块的流程：记录开始时间 → 最多读取 `buffer_size` 字节 →
/// 原样写入目标 → 按读取开始以来的耗时补足睡眠。
///
/// - 源端 EOF：半关闭目标的写方向，只结束本方向
/// - 目标写入被拒（broken pipe / reset）：半关闭源的读方向，只结束本方向
/// - 其他错误或空闲超时：完全关闭两端
pub async fn pump(
    mut source: OwnedReadHalf,
    mut destination: OwnedWriteHalf,
    settings: PumpSettings,
    direction: Direction,
) -> PumpReport {
    let source_peer = peer_label(source.peer_addr());
    let destination_peer = peer_label(destination.peer_addr());

    let mut buf = vec![0u8; settings.buffer_size];
    let mut bytes: u64 = 0;

    let outcome = loop {
        let start = Instant::now();

        let n = match guarded(settings.idle_timeout, source.read(&mut buf)).await {
            Some(Ok(0)) => {
                info!("{}: closed", source_peer);
                half_close_write(&mut destination, &destination_peer).await;
                break PumpOutcome::Eof;
            }
            Some(Ok(n)) => n,
            Some(Err(e)) if is_closed_on_read(&e) => {
                info!("{}: closed", source_peer);
                half_close_write(&mut destination, &destination_peer).await;
                break PumpOutcome::Eof;
            }
            Some(Err(e)) => {
                warn!("{}: unexpected error: {}", source_peer, e);
                close_both(&source, &destination);
                break PumpOutcome::Failed(e);
            }
            None => {
                warn!("{}: idle timeout while reading", source_peer);
                close_both(&source, &destination);
                break PumpOutcome::IdleTimeout;
            }
        };

        match guarded(settings.idle_timeout, destination.write_all(&buf[..n])).await {
            Some(Ok(())) => {}
            Some(Err(e)) if is_peer_reset(&e) => {
                info!("{}: closed", destination_peer);
                shutdown_read(source.as_ref());
                break PumpOutcome::PeerClosed;
            }
            Some(Err(e)) => {
                warn!("{}: unexpected error: {}", destination_peer, e);
                close_both(&source, &destination);
                break PumpOutcome::Failed(e);
            }
            None => {
                warn!("{}: idle timeout while writing", destination_peer);
                close_both(&source, &destination);
                break PumpOutcome::IdleTimeout;
            }
        }

        bytes += n as u64;
        settings.limiter.delay(n, start.elapsed()).await;
    };

    debug!(
        "{} pump finished after {} bytes: {:?}",
        direction, bytes, outcome
    );

    PumpReport {
        direction,
        outcome,
        bytes,
    }
}

/// 通知目标本方向不会再有数据
async fn half_close_write(destination: &mut OwnedWriteHalf, peer: &str) {
    if let Err(e) = destination.shutdown().await {
        if e.kind() != io::ErrorKind::NotConnected {
            debug!("{}: half-close failed: {}", peer, e);
        }
    }
}

/// 完全关闭两端，另一方向的泵会随后观察到连接关闭
fn close_both(source: &OwnedReadHalf, destination: &OwnedWriteHalf) {
    shutdown_both(destination.as_ref());
    shutdown_both(source.as_ref());
}
