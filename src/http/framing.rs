//! Message framing over a live byte stream.
//!
//! # Responsibilities
//! - Accumulate bytes until a full header section is buffered
//! - Read exactly the body bytes that belong to the message
//! - Normalize chunked bodies into `Content-Length` framing
//!
//! # Design Decisions
//! - The reader owns the stream and a carry-over buffer; bytes read past the
//!   end of one message stay buffered for the next one on the same connection
//! - Chunk extensions are ignored and trailer fields are discarded
//! - Close-delimited bodies are not supported: no framing header means no body
//! - Every read is bounded by the idle timeout

use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::ProxyConfig;
use crate::error::FramingError;
use crate::http::message::{find, Message, CONTENT_LENGTH, CRLF, HEAD_TERMINATOR, TRANSFER_ENCODING};

/// Tuning for a [`FramingReader`].
#[derive(Debug, Clone, Copy)]
pub struct FramingOptions {
    /// Upper bound on bytes pulled from the stream per read.
    pub read_chunk_size: usize,
    /// Largest header section (and chunk size line) accepted.
    pub max_header_bytes: usize,
    /// Deadline for each individual read.
    pub idle_timeout: Option<Duration>,
}

impl Default for FramingOptions {
    fn default() -> Self {
        Self {
            read_chunk_size: 2048,
            max_header_bytes: 64 * 1024,
            idle_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl From<&ProxyConfig> for FramingOptions {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            read_chunk_size: config.limits.read_chunk_size,
            max_header_bytes: config.limits.max_header_bytes,
            idle_timeout: Some(Duration::from_secs(config.timeouts.idle_secs)),
        }
    }
}

/// Reads complete, length-normalized messages from a stream.
#[derive(Debug)]
pub struct FramingReader<S> {
    stream: S,
    buf: BytesMut,
    options: FramingOptions,
}

impl<S> FramingReader<S> {
    pub fn new(stream: S, options: FramingOptions) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(options.read_chunk_size),
            options,
        }
    }

    /// Bytes read from the stream but not yet consumed by a message.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

impl<S: AsyncRead + Unpin> FramingReader<S> {
    /// Read one complete message.
    ///
    /// The returned message never carries `Transfer-Encoding`; its
    /// `Content-Length` matches the body whenever a body was framed.
    pub async fn read_message(&mut self) -> Result<Message, FramingError> {
        let mut message = self.read_head().await?;

        if message.is_chunked() {
            let body = self.read_chunked_body().await?;
            message.set_header(TRANSFER_ENCODING, "");
            message.set_header(CONTENT_LENGTH, &body.len().to_string());
            message.set_body(body);
        } else {
            let len = message.content_length()?;
            self.fill_to(len).await?;
            message.set_body(self.buf.split_to(len).freeze());
        }

        Ok(message)
    }

    async fn read_head(&mut self) -> Result<Message, FramingError> {
        let max = self.options.max_header_bytes;
        let mut scanned = 0;

        loop {
            if let Some(pos) = find(&self.buf[scanned..], HEAD_TERMINATOR) {
                let head_end = scanned + pos + HEAD_TERMINATOR.len();
                if head_end > max {
                    return Err(FramingError::HeaderTooLarge(max));
                }
                let head = self.buf.split_to(head_end);
                return Message::parse_head(&head);
            }
            if self.buf.len() > max {
                return Err(FramingError::HeaderTooLarge(max));
            }
            // The terminator may straddle two reads.
            scanned = self.buf.len().saturating_sub(HEAD_TERMINATOR.len() - 1);
            self.fill().await?;
        }
    }

    async fn read_chunked_body(&mut self) -> Result<Bytes, FramingError> {
        let mut body = BytesMut::new();

        loop {
            let line_end = self.fill_line().await?;
            let size = parse_chunk_size(&self.buf[..line_end])?;
            self.buf.advance(line_end + CRLF.len());

            if size == 0 {
                self.skip_trailers().await?;
                return Ok(body.freeze());
            }

            let framed = size
                .checked_add(CRLF.len())
                .ok_or_else(|| FramingError::InvalidChunkSize(format!("{:x}", size)))?;
            self.fill_to(framed).await?;
            if &self.buf[size..framed] != CRLF {
                return Err(FramingError::MalformedChunk);
            }
            body.extend_from_slice(&self.buf[..size]);
            self.buf.advance(framed);
        }
    }

    /// Consume trailer fields up to and including the final empty line.
    async fn skip_trailers(&mut self) -> Result<(), FramingError> {
        loop {
            let line_end = self.fill_line().await?;
            self.buf.advance(line_end + CRLF.len());
            if line_end == 0 {
                return Ok(());
            }
        }
    }

    /// Buffer until a CRLF is present; returns its offset.
    async fn fill_line(&mut self) -> Result<usize, FramingError> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = find(&self.buf[scanned..], CRLF) {
                return Ok(scanned + pos);
            }
            if self.buf.len() > self.options.max_header_bytes {
                return Err(FramingError::InvalidChunkSize(
                    String::from_utf8_lossy(&self.buf[..32.min(self.buf.len())]).into_owned(),
                ));
            }
            scanned = self.buf.len().saturating_sub(CRLF.len() - 1);
            self.fill().await?;
        }
    }

    async fn fill_to(&mut self, len: usize) -> Result<(), FramingError> {
        while self.buf.len() < len {
            self.fill().await?;
        }
        Ok(())
    }

    /// One bounded read from the stream. Zero bytes means the peer is gone.
    async fn fill(&mut self) -> Result<usize, FramingError> {
        let limit = self.options.read_chunk_size;
        self.buf.reserve(limit);

        let mut source = (&mut self.stream).take(limit as u64);
        let read = source.read_buf(&mut self.buf);
        let n = match self.options.idle_timeout {
            Some(deadline) => tokio::time::timeout(deadline, read)
                .await
                .map_err(|_| FramingError::Timeout(deadline))??,
            None => read.await?,
        };

        if n == 0 {
            return Err(FramingError::Disconnected);
        }
        tracing::trace!(bytes = n, buffered = self.buf.len(), "Read from stream");
        Ok(n)
    }
}

impl<S: AsyncWrite + Unpin> FramingReader<S> {
    /// Encode and write a message to the underlying stream.
    pub async fn write_message(&mut self, message: &Message) -> std::io::Result<()> {
        self.stream.write_all(&message.encode()).await?;
        self.stream.flush().await
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, FramingError> {
    let invalid = || FramingError::InvalidChunkSize(String::from_utf8_lossy(line).into_owned());

    let digits = match line.iter().position(|&b| b == b';') {
        Some(ext) => &line[..ext],
        None => line,
    };
    let digits = digits.trim_ascii();
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(invalid());
    }

    let digits = std::str::from_utf8(digits).map_err(|_| invalid())?;
    usize::from_str_radix(digits, 16).map_err(|_| invalid())
}
