//! Streaming backend response bodies.
//!
//! The reader owns the backend connection. When the body is exhausted or
//! the client side drops it, the connection goes with it.

use std::io::{self, Cursor};

use axum::body::Body;
use bytes::Bytes;
use futures_util::stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader, Chain};

const READ_CHUNK: usize = 16 * 1024;

/// How the end of the body is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// No body at all (HEAD, 1xx, 204, 304).
    Empty,
    /// Exactly this many bytes.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// Everything until the backend closes the connection.
    UntilEof,
}

#[derive(Debug, Clone, Copy)]
enum Chunk {
    Size,
    Data(u64),
    Done,
}

/// Decodes the body from bytes already buffered during head parsing,
/// followed by the rest of the connection.
pub struct BodyReader<R> {
    reader: BufReader<Chain<Cursor<Bytes>, R>>,
    framing: Framing,
    remaining: u64,
    chunk: Chunk,
}

impl<R> BodyReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(buffered: Bytes, conn: R, framing: Framing) -> Self {
        let remaining = match framing {
            Framing::Length(n) => n,
            _ => 0,
        };
        Self {
            reader: BufReader::new(Cursor::new(buffered).chain(conn)),
            framing,
            remaining,
            chunk: Chunk::Size,
        }
    }

    /// Turn the reader into a response body.
    pub fn into_body(self) -> Body {
        if self.framing == Framing::Empty {
            return Body::empty();
        }

        let chunks = stream::try_unfold(self, |mut reader| async move {
            Ok::<_, io::Error>(reader.next_chunk().await?.map(|bytes| (bytes, reader)))
        });
        Body::from_stream(chunks)
    }

    /// Read the next piece of decoded body, `None` at the end.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        match self.framing {
            Framing::Empty => Ok(None),
            Framing::UntilEof => {
                let bytes = self.read_some(READ_CHUNK as u64).await?;
                Ok((!bytes.is_empty()).then_some(bytes))
            }
            Framing::Length(_) => {
                if self.remaining == 0 {
                    return Ok(None);
                }
                let bytes = self.read_some(self.remaining).await?;
                if bytes.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("backend closed with {} body bytes outstanding", self.remaining),
                    ));
                }
                self.remaining -= bytes.len() as u64;
                Ok(Some(bytes))
            }
            Framing::Chunked => self.next_chunked().await,
        }
    }

    async fn next_chunked(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            match self.chunk {
                Chunk::Done => return Ok(None),
                Chunk::Size => {
                    let size = self.read_chunk_size().await?;
                    if size == 0 {
                        self.skip_trailers().await?;
                        self.chunk = Chunk::Done;
                        return Ok(None);
                    }
                    self.chunk = Chunk::Data(size);
                }
                Chunk::Data(0) => {
                    let line = self.read_line().await?;
                    if !line.trim().is_empty() {
                        return Err(invalid("missing CRLF after chunk data"));
                    }
                    self.chunk = Chunk::Size;
                }
                Chunk::Data(left) => {
                    let bytes = self.read_some(left).await?;
                    if bytes.is_empty() {
                        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "backend closed inside a chunk"));
                    }
                    self.chunk = Chunk::Data(left - bytes.len() as u64);
                    return Ok(Some(bytes));
                }
            }
        }
    }

    async fn read_chunk_size(&mut self) -> io::Result<u64> {
        let line = self.read_line().await?;
        let size = line.split(';').next().unwrap_or_default().trim();
        u64::from_str_radix(size, 16).map_err(|_| invalid("invalid chunk size"))
    }

    async fn skip_trailers(&mut self) -> io::Result<()> {
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await?;
            if n == 0 || line.trim().is_empty() {
                return Ok(());
            }
        }
    }

    async fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "backend closed inside chunked body"));
        }
        Ok(line)
    }

    async fn read_some(&mut self, limit: u64) -> io::Result<Bytes> {
        let len = limit.min(READ_CHUNK as u64) as usize;
        let mut buf = vec![0; len];
        let n = self.reader.read(&mut buf).await?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}
