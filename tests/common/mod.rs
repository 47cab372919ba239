//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use uwsgi_proxy::config::ProxyConfig;
use uwsgi_proxy::http::HttpServer;
use uwsgi_proxy::lifecycle::Shutdown;
use uwsgi_proxy::protocol::packet::{decode_block, decode_header, HEADER_LEN};
use uwsgi_proxy::protocol::Vars;

/// What a mock backend saw for one request.
#[derive(Debug, Clone)]
pub struct Captured {
    pub vars: Vars,
    pub body: Vec<u8>,
}

pub type CaptureLog = Arc<Mutex<Vec<Captured>>>;

/// Read one uwsgi request: header, vars block, then `CONTENT_LENGTH` body bytes.
pub async fn read_uwsgi_request(socket: &mut TcpStream) -> Captured {
    let mut header = [0u8; HEADER_LEN];
    socket.read_exact(&mut header).await.unwrap();
    let mut block = vec![0u8; decode_header(&header).unwrap()];
    socket.read_exact(&mut block).await.unwrap();
    let vars = decode_block(&block).unwrap();

    let len = vars
        .get("CONTENT_LENGTH")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; len];
    socket.read_exact(&mut body).await.unwrap();

    Captured { vars, body }
}

/// Start a uwsgi backend that answers every request with `response`
/// (a complete raw HTTP response) and records what it received.
pub async fn start_uwsgi_backend(response: &'static str) -> (SocketAddr, CaptureLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: CaptureLog = Arc::default();
    let seen = log.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        let captured = read_uwsgi_request(&mut socket).await;
                        seen.lock().unwrap().push(captured);
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, log)
}

/// A port with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Start the proxy on an ephemeral port; returns its address and the shutdown handle.
pub async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown)
}
