//! HTTP/1.x response parsing from a raw backend stream.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::transport::body::{BodyReader, Framing};
use crate::transport::{BackendResponse, ExchangeError};

/// Largest response head accepted from a backend.
pub const MAX_HEAD_LEN: usize = 64 * 1024;

const MAX_HEADERS: usize = 128;

#[derive(Debug)]
struct ResponseHead {
    status: StatusCode,
    headers: HeaderMap,
}

/// Read a response from `conn`, which must be positioned at the status line.
///
/// The returned body keeps reading from `conn` lazily.
pub async fn read_response<R>(mut conn: R, method: &Method) -> Result<BackendResponse, ExchangeError>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        let (mut head, consumed) = read_head(&mut conn, &mut buf).await?;
        buf.advance(consumed);

        // interim responses precede the real one on the same stream
        if head.status.is_informational() && head.status != StatusCode::SWITCHING_PROTOCOLS {
            continue;
        }

        let framing = framing(method, &mut head)?;
        let body = BodyReader::new(buf.freeze(), conn, framing).into_body();

        return Ok(BackendResponse {
            status: head.status,
            headers: head.headers,
            body,
        });
    }
}

async fn read_head<R>(conn: &mut R, buf: &mut BytesMut) -> Result<(ResponseHead, usize), ExchangeError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if !buf.is_empty() {
            if let Some(parsed) = parse_head(buf)? {
                return Ok(parsed);
            }
        }
        if buf.len() >= MAX_HEAD_LEN {
            return Err(ExchangeError::Parse(format!(
                "response head exceeds {} bytes",
                MAX_HEAD_LEN
            )));
        }

        let n = conn.read_buf(buf).await.map_err(ExchangeError::Read)?;
        if n == 0 {
            let msg = if buf.is_empty() {
                "backend closed the connection without responding"
            } else {
                "backend closed the connection inside the response head"
            };
            return Err(ExchangeError::Parse(msg.to_string()));
        }
    }
}

fn parse_head(buf: &[u8]) -> Result<Option<(ResponseHead, usize)>, ExchangeError> {
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut slots);

    let len = match response.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(ExchangeError::Parse(e.to_string())),
    };

    let code = response
        .code
        .ok_or_else(|| ExchangeError::Parse("missing status code".to_string()))?;
    let status = StatusCode::from_u16(code)
        .map_err(|_| ExchangeError::Parse(format!("invalid status code {}", code)))?;

    let mut headers = HeaderMap::with_capacity(response.headers.len());
    for h in response.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|_| ExchangeError::Parse(format!("invalid header name '{}'", h.name)))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|_| ExchangeError::Parse(format!("invalid value for header '{}'", h.name)))?;
        headers.append(name, value);
    }

    Ok(Some((ResponseHead { status, headers }, len)))
}

/// Decide how the body ends. Framing headers that no longer describe the
/// relayed body are removed from the head.
fn framing(method: &Method, head: &mut ResponseHead) -> Result<Framing, ExchangeError> {
    let status = head.status;
    if *method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return Ok(Framing::Empty);
    }

    let codings: Vec<String> = head
        .headers
        .get_all(header::TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if let Some((last, rest)) = codings.split_last() {
        // Content-Length is meaningless once any transfer coding applies
        head.headers.remove(header::CONTENT_LENGTH);
        if !last.eq_ignore_ascii_case("chunked") {
            return Ok(Framing::UntilEof);
        }

        // chunking is undone here; codings applied before it stay on the relayed response
        head.headers.remove(header::TRANSFER_ENCODING);
        if !rest.is_empty() {
            let value = HeaderValue::from_str(&rest.join(", "))
                .map_err(|_| ExchangeError::Parse("invalid Transfer-Encoding".to_string()))?;
            head.headers.insert(header::TRANSFER_ENCODING, value);
        }
        return Ok(Framing::Chunked);
    }

    let mut length = None;
    for value in head.headers.get_all(header::CONTENT_LENGTH) {
        let parsed = value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| ExchangeError::Parse("invalid Content-Length".to_string()))?;
        if length.is_some_and(|l| l != parsed) {
            return Err(ExchangeError::Parse("conflicting Content-Length values".to_string()));
        }
        length = Some(parsed);
    }

    Ok(match length {
        Some(n) => Framing::Length(n),
        None => Framing::UntilEof,
    })
}
