//! Shared utilities for end-to-end tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use forward_proxy::http::FramingOptions;
use forward_proxy::lifecycle::Shutdown;
use forward_proxy::net::Listener;
use forward_proxy::{FramingReader, ProxyConfig, ProxyContext, ProxyServer};

/// An origin server on loopback that answers every request with the same bytes.
pub struct MockOrigin {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockOrigin {
    /// Accepted connection count.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Raw requests (head and body) received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a keep-alive aware origin. Request bodies are read by `Content-Length`.
pub async fn start_origin(response: &'static [u8]) -> MockOrigin {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let accepted = Arc::clone(&connections);
    let seen = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_origin_connection(socket, Arc::clone(&seen), response));
        }
    });

    MockOrigin {
        addr,
        connections,
        requests,
    }
}

async fn serve_origin_connection(
    mut socket: TcpStream,
    seen: Arc<Mutex<Vec<String>>>,
    response: &'static [u8],
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        while let Some(len) = complete_request_len(&buf) {
            let request: Vec<u8> = buf.drain(..len).collect();
            seen.lock().unwrap().push(String::from_utf8_lossy(&request).into_owned());
            if socket.write_all(response).await.is_err() {
                return;
            }
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Length of the first buffered request, head plus `Content-Length` body, once complete.
fn complete_request_len(buf: &[u8]) -> Option<usize> {
    let head_end = buf.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
    let head = String::from_utf8_lossy(&buf[..head_end]);
    let body_len = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(field, _)| field.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    (buf.len() >= head_end + body_len).then_some(head_end + body_len)
}

/// A proxy serving on an ephemeral loopback port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub ctx: Arc<ProxyContext>,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

/// Start a proxy whose origin connections go to `origin_port` on the target host.
pub async fn start_proxy(mut config: ProxyConfig, origin_port: u16) -> RunningProxy {
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.port = origin_port;

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ctx = Arc::new(ProxyContext::new(config));
    let shutdown = Shutdown::new();

    let server = ProxyServer::new(Arc::clone(&ctx));
    let listener_shutdown = shutdown.subscribe();
    let task = tokio::spawn(async move { server.run(listener, listener_shutdown).await });

    RunningProxy {
        addr,
        ctx,
        shutdown,
        task,
    }
}

/// Connect a client to the proxy.
pub async fn connect(addr: SocketAddr) -> FramingReader<TcpStream> {
    let stream = TcpStream::connect(addr).await.unwrap();
    FramingReader::new(stream, FramingOptions::default())
}

/// Send raw request bytes.
pub async fn send(client: &mut FramingReader<TcpStream>, raw: &str) {
    client.get_mut().write_all(raw.as_bytes()).await.unwrap();
}

/// A proxy-form GET for `path` on the loopback origin.
pub fn get(path: &str) -> String {
    format!(
        "GET http://127.0.0.1{} HTTP/1.1\r\nHost: 127.0.0.1\r\nProxy-Connection: keep-alive\r\n\r\n",
        path
    )
}

/// Poll `check` until it holds, failing after two seconds.
pub async fn eventually(check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
