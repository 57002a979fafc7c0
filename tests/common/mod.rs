//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use upgrade_proxy::config::{ProxyConfig, RouteConfig};
use upgrade_proxy::http::HttpServer;
use upgrade_proxy::lifecycle::Shutdown;
use upgrade_proxy::net::SessionTracker;
use upgrade_proxy::relay::Capabilities;

/// A proxy running on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub sessions: SessionTracker,
    pub updates: mpsc::UnboundedSender<ProxyConfig>,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait until every relay has finished.
    pub async fn wait_idle(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.sessions.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("relays did not finish");
    }
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    start_proxy_with(HttpServer::new(config)).await
}

pub async fn start_proxy_with_capabilities(
    config: ProxyConfig,
    capabilities: Capabilities,
) -> TestProxy {
    start_proxy_with(HttpServer::new(config).with_capabilities(capabilities)).await
}

async fn start_proxy_with(server: HttpServer) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let sessions = server.sessions();
    let (updates, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(server.run(listener, rx, shutdown.subscribe()));

    TestProxy {
        addr,
        shutdown,
        sessions,
        updates,
        handle,
    }
}

/// Configuration with a single catch-all route to `upstream`.
pub fn config_for(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.routes.push(route("default", "/", upstream));
    config
}

pub fn route(name: &str, prefix: &str, upstream: SocketAddr) -> RouteConfig {
    RouteConfig {
        name: name.into(),
        host: None,
        path_prefix: Some(prefix.into()),
        upstream: upstream.to_string(),
        priority: 0,
    }
}

/// Read an HTTP head (up to and including the blank line).
pub async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match socket.read(&mut byte).await {
            Ok(0) | Err(_) => break,
            Ok(_) => head.push(byte[0]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Start a backend answering every request with `(status, body)` from `f`,
/// which receives the request head.
pub async fn start_programmable_backend<F>(f: F) -> SocketAddr
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let (status, body) = f(&head);
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Start a WebSocket backend echoing text and binary messages.
pub async fn start_ws_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_text() || msg.is_binary() {
                        if ws.send(msg).await.is_err() {
                            break;
                        }
                    } else if msg.is_close() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

/// Start a backend that accepts any upgrade, echoes the first chunk it
/// receives and then closes.
pub async fn start_raw_upgrade_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let response = "HTTP/1.1 101 Switching Protocols\r\n\
                                Connection: Upgrade\r\n\
                                Upgrade: websocket\r\n\r\n";
                if socket.write_all(response.as_bytes()).await.is_err() {
                    return;
                }
                let mut buf = [0u8; 1024];
                if let Ok(n) = socket.read(&mut buf).await {
                    let _ = socket.write_all(&buf[..n]).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Open a raw connection to `proxy` and complete an upgrade handshake.
///
/// Returns the response head and the connection positioned after it.
pub async fn raw_upgrade(proxy: SocketAddr, path: &str) -> (String, TcpStream) {
    let mut socket = TcpStream::connect(proxy).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        path, proxy
    );
    socket.write_all(request.as_bytes()).await.unwrap();
    let head = read_head(&mut socket).await;
    (head, socket)
}

pub fn text(s: &str) -> Message {
    Message::text(s)
}
