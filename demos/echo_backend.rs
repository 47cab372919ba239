//! Minimal uwsgi application server for trying the proxy by hand.
//!
//! Answers every request with a plain-text dump of the vars it received.
//!
//! ```text
//! cargo run --example echo_backend -- --listen 127.0.0.1:3031
//! cargo run -- --uwsgi /app 127.0.0.1:3031
//! curl -H 'X-Demo: 1' 'http://127.0.0.1:8080/app/hello?x=1'
//! ```

use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use uwsgi_proxy::protocol::packet::{decode_block, decode_header, HEADER_LEN};

#[derive(Parser)]
#[command(name = "echo_backend", about = "uwsgi backend that echoes request vars")]
struct Args {
    /// Address to accept uwsgi connections on
    #[arg(short, long, default_value = "127.0.0.1:3031")]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
        .init();

    let listener = TcpListener::bind(&args.listen).await?;
    tracing::info!(address = %listener.local_addr()?, "echo backend listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        tokio::spawn(async move {
            if let Err(e) = handle(socket).await {
                tracing::warn!(peer = %peer, error = %e, "request failed");
            }
        });
    }
}

async fn handle(mut socket: TcpStream) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut header = [0u8; HEADER_LEN];
    socket.read_exact(&mut header).await?;
    let mut block = vec![0u8; decode_header(&header)?];
    socket.read_exact(&mut block).await?;
    let vars = decode_block(&block)?;

    let body_len = vars
        .get("CONTENT_LENGTH")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; body_len];
    socket.read_exact(&mut body).await?;

    tracing::info!(
        method = vars.get("REQUEST_METHOD").unwrap_or("-"),
        uri = vars.get("REQUEST_URI").unwrap_or("-"),
        vars = vars.len(),
        body_bytes = body_len,
        "request"
    );

    let mut text = String::new();
    for (key, value) in vars.iter() {
        text.push_str(key);
        text.push_str(" = ");
        text.push_str(&String::from_utf8_lossy(value));
        text.push('\n');
    }
    if !body.is_empty() {
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&body));
        text.push('\n');
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nX-Echo-Vars: {}\r\n\r\n{}",
        text.len(),
        vars.len(),
        text
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await?;
    Ok(())
}
