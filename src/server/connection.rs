use super::pump::{pump, Direction, PumpReport, PumpSettings};
use super::socket::{peer_label, tune_buffers};
use crate::error::{RelayError, Result};
use anyhow::anyhow;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// 建立连接对所需的参数（所有连接共享，只读）
#[derive(Debug, Clone)]
pub struct PairSettings {
    /// 转发目标地址
    pub forward_addr: String,
    /// 两个方向的泵参数
    pub pump: PumpSettings,
    /// 缓冲区调整失败时是否拒绝连接
    pub strict_buffer_tuning: bool,
}

/// 一个入站连接与其转发连接组成的连接对
///
/// 两个方向的泵独立运行，调用方可以丢弃本句柄（不影响泵），
/// 也可以通过 [`ConnectionPair::wait`] 等待两个方向都结束。
pub struct ConnectionPair {
    id: Uuid,
    peer_addr: Option<SocketAddr>,
    upstream: JoinHandle<PumpReport>,
    downstream: JoinHandle<PumpReport>,
}

impl ConnectionPair {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// 等待两个方向的泵都结束，返回 (upstream, downstream) 报告
    pub async fn wait(self) -> Result<(PumpReport, PumpReport)> {
        let (upstream, downstream) = tokio::join!(self.upstream, self.downstream);
        let upstream = upstream.map_err(|e| anyhow!("upstream pump panicked: {}", e))?;
        let downstream = downstream.map_err(|e| anyhow!("downstream pump panicked: {}", e))?;
        Ok((upstream, downstream))
    }
}

/// 为入站连接拨号转发地址并启动两个方向的泵
///
/// 拨号失败时关闭入站连接并返回错误，不重试。
/// 泵在 `tracker` 上运行，本函数不等待它们结束。
pub async fn establish(
    inbound: TcpStream,
    settings: &PairSettings,
    tracker: &TaskTracker,
) -> Result<ConnectionPair> {
    let id = Uuid::new_v4();
    let peer_addr = inbound.peer_addr().ok();
    let peer = peer_label(inbound.peer_addr());

    let outbound = match TcpStream::connect(&settings.forward_addr).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("{}: unable to dial {}: {}", peer, settings.forward_addr, e);
            drop(inbound);
            return Err(RelayError::connection_failed(&settings.forward_addr, e));
        }
    };

    // 内核缓冲区限制在约一秒的配额，与泵的缓冲区一致
    for stream in [&inbound, &outbound] {
        if let Err(e) = tune_buffers(stream, settings.pump.buffer_size) {
            if settings.strict_buffer_tuning {
                error!("{}: rejecting connection: {}", peer, e);
                return Err(e);
            }
            warn!("{}; continuing without buffer tuning", e);
        }
    }

    info!("{} open", peer);

    let span = info_span!("pair", id = %id, peer = %peer);
    let (inbound_read, inbound_write) = inbound.into_split();
    let (outbound_read, outbound_write) = outbound.into_split();

    let upstream = tracker.spawn(
        pump(
            inbound_read,
            outbound_write,
            settings.pump,
            Direction::Upstream,
        )
        .instrument(span.clone()),
    );
    let downstream = tracker.spawn(
        pump(
            outbound_read,
            inbound_write,
            settings.pump,
            Direction::Downstream,
        )
        .instrument(span),
    );

    Ok(ConnectionPair {
        id,
        peer_addr,
        upstream,
        downstream,
    })
}
