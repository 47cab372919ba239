//! TCP backend transport.
//!
//! # Responsibilities
//! - Dial the backend with a connect deadline
//! - Write packet header, vars block and request body
//! - Parse the response head within the backend deadline
//!
//! # Design Decisions
//! - No half-close: the backend answers once it has read what it needs
//! - Dropping the returned future (client went away) drops the socket

use std::time::Duration;

use axum::body::Body;
use axum::http::Method;
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::TimeoutConfig;
use crate::protocol::Packet;
use crate::transport::response::read_response;
use crate::transport::{BackendRequest, BackendResponse, BackendTransport, ExchangeError};

/// Opens a fresh TCP connection for every exchange.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
    backend_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration, backend_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            backend_timeout,
        }
    }

    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self::new(
            Duration::from_secs(config.connect_secs),
            Duration::from_secs(config.backend_secs),
        )
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::from_config(&TimeoutConfig::default())
    }
}

impl BackendTransport for TcpTransport {
    fn exchange(&self, request: BackendRequest) -> BoxFuture<'static, Result<BackendResponse, ExchangeError>> {
        let connect_timeout = self.connect_timeout;
        let backend_timeout = self.backend_timeout;

        Box::pin(async move {
            let BackendRequest { address, packet, method, body } = request;

            let stream = timeout(connect_timeout, TcpStream::connect(address.as_str()))
                .await
                .map_err(|_| ExchangeError::Timeout {
                    phase: "connect",
                    after: connect_timeout,
                })?
                .map_err(|source| ExchangeError::Dial {
                    address: address.clone(),
                    source,
                })?;
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(backend = %address, error = %e, "Failed to set TCP_NODELAY");
            }

            tracing::trace!(backend = %address, datasize = packet.datasize(), "Backend connected");

            timeout(backend_timeout, exchange_on(stream, packet, method, body))
                .await
                .map_err(|_| ExchangeError::Timeout {
                    phase: "exchange",
                    after: backend_timeout,
                })?
        })
    }
}

/// Run one exchange over an already-established stream.
pub async fn exchange_on<S>(mut stream: S, packet: Packet, method: Method, body: Body) -> Result<BackendResponse, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    stream.write_all(packet.header()).await.map_err(ExchangeError::Write)?;
    stream.write_all(packet.block()).await.map_err(ExchangeError::Write)?;

    let mut data = body.into_data_stream();
    while let Some(chunk) = data.next().await {
        let chunk = chunk.map_err(ExchangeError::RequestBody)?;
        stream.write_all(&chunk).await.map_err(ExchangeError::Write)?;
    }
    stream.flush().await.map_err(ExchangeError::Write)?;

    read_response(stream, &method).await
}
