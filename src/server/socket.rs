/// 套接字调优与半关闭辅助函数
///
/// 通过 socket2 的 SockRef 直接操作 tokio 套接字，
/// 不需要拿回 std 套接字的所有权。
use crate::error::{RelayError, Result};
use socket2::SockRef;
use std::io;
use std::net::{Shutdown, SocketAddr};
use tokio::net::TcpStream;
use tracing::debug;

/// 将地址格式化为日志标签
pub fn peer_label(addr: io::Result<SocketAddr>) -> String {
    addr.map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".into())
}

/// 将套接字的收发缓冲区设置为 `size` 字节
///
/// 失败时返回 `BufferTuningUnsupported`，由调用方决定继续还是拒绝连接。
pub fn tune_buffers(stream: &TcpStream, size: usize) -> Result<()> {
    let sock_ref = SockRef::from(stream);
    sock_ref
        .set_recv_buffer_size(size)
        .and_then(|_| sock_ref.set_send_buffer_size(size))
        .map_err(|e| RelayError::buffer_tuning_unsupported(stream.peer_addr().ok(), e))
}

/// 关闭读方向，不再接收对端数据
pub fn shutdown_read(stream: &TcpStream) {
    shutdown(stream, Shutdown::Read);
}

/// 关闭两个方向
pub fn shutdown_both(stream: &TcpStream) {
    shutdown(stream, Shutdown::Both);
}

fn shutdown(stream: &TcpStream, how: Shutdown) {
    // 对端可能已经断开，NotConnected 属于正常情况
    if let Err(e) = SockRef::from(stream).shutdown(how) {
        if e.kind() != io::ErrorKind::NotConnected {
            debug!(
                "{}: shutdown({:?}) failed: {}",
                peer_label(stream.peer_addr()),
                how,
                e
            );
        }
    }
}
