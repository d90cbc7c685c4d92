//! Common utilities for integration tests
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;
use throttle_proxy::config::RelayConfig;
use throttle_proxy::server::{bind, Acceptor};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// A relay running in the background
pub struct TestRelay {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub handle: JoinHandle<throttle_proxy::Result<()>>,
}

/// Start a relay on a random local port forwarding to `forward_addr`
pub async fn start_relay(forward_addr: &str, throughput: u32) -> TestRelay {
    let config = RelayConfig::builder()
        .listen_addr("127.0.0.1:0")
        .forward_addr(forward_addr)
        .throughput(throughput)
        .build()
        .expect("valid relay config");

    let listener = bind(&config.listen_addr)
        .await
        .expect("Failed to bind relay");
    let shutdown = CancellationToken::new();
    let acceptor =
        Acceptor::new(listener, &config, shutdown.clone()).expect("Failed to create acceptor");
    let addr = acceptor.local_addr().expect("Failed to get relay addr");
    let tracker = acceptor.tracker();

    let handle = tokio::spawn(acceptor.run());

    TestRelay {
        addr,
        shutdown,
        tracker,
        handle,
    }
}

/// Return an address nobody is listening on
pub async fn unreachable_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");
    drop(listener);
    addr.to_string()
}

/// Create a simple echo server for testing
pub async fn start_echo_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind echo server");
    let addr = listener.local_addr().expect("Failed to get local addr");

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) => break, // Connection closed
                                Ok(n) => {
                                    if socket.write_all(&buf[..n]).await.is_err() {
                                        break;
                                    }
                                }
                                Err(_) => break,
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, handle)
}

/// Wait until every connection task of the relay has finished
pub async fn wait_for_idle(tracker: &TaskTracker, max_wait: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + max_wait;
    while tokio::time::Instant::now() < deadline {
        if tracker.is_empty() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tracker.is_empty()
}
