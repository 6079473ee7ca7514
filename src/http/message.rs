//! In-memory HTTP/1.1 message.
//!
//! # Responsibilities
//! - Hold one request or response: start line, header fields, raw body
//! - Encode the message back to wire bytes
//! - Parse a buffered header section into a message
//!
//! # Design Decisions
//! - Header names are matched case-sensitively, exactly as received
//! - Duplicate fields collapse to the last value, keeping the first position
//! - Bodies are always fully materialized and `Content-Length` framed on output

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FramingError;

pub const CRLF: &[u8] = b"\r\n";
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

pub const CONNECTION: &str = "Connection";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const PROXY_CONNECTION: &str = "Proxy-Connection";
pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";

/// One HTTP request or response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    start_line: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Message {
    /// Create a message with no headers and an empty body.
    pub fn new(start_line: impl Into<String>) -> Self {
        Self {
            start_line: start_line.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Parse a buffer holding at least the complete header section.
    ///
    /// Everything after `\r\n\r\n` becomes the (possibly partial) body.
    pub fn parse(buf: &[u8]) -> Result<Self, FramingError> {
        let head_end = find_head_end(buf).ok_or(FramingError::MissingHeaderSeparator)?;
        let mut message = Self::parse_head(&buf[..head_end])?;
        message.body = Bytes::copy_from_slice(&buf[head_end..]);
        Ok(message)
    }

    /// Parse a header section that ends with `\r\n\r\n`.
    pub(crate) fn parse_head(head: &[u8]) -> Result<Self, FramingError> {
        let line_end = find(head, CRLF).ok_or(FramingError::MissingHeaderSeparator)?;
        let start_line = std::str::from_utf8(&head[..line_end])
            .map_err(|_| FramingError::MalformedHeader(String::from_utf8_lossy(&head[..line_end]).into_owned()))?;

        let block_end = find(head, HEAD_TERMINATOR).ok_or(FramingError::MissingHeaderSeparator)?;
        let mut message = Self::new(start_line);

        // No header lines: the start line's CRLF is the first half of the terminator.
        if block_end <= line_end {
            return Ok(message);
        }

        let block = &head[line_end + CRLF.len()..block_end];
        let block = std::str::from_utf8(block)
            .map_err(|_| FramingError::MalformedHeader(String::from_utf8_lossy(block).into_owned()))?;

        for line in block.split("\r\n") {
            let (field, value) = line
                .split_once(':')
                .ok_or_else(|| FramingError::MalformedHeader(line.to_string()))?;
            message.insert(field.trim(), value.trim());
        }

        Ok(message)
    }

    /// Render the message as wire bytes.
    pub fn encode(&self) -> Bytes {
        let head_len = self.start_line.len()
            + self
                .headers
                .iter()
                .map(|(k, v)| k.len() + v.len() + 4)
                .sum::<usize>()
            + 4;
        let mut out = BytesMut::with_capacity(head_len + self.body.len());

        out.put_slice(self.start_line.as_bytes());
        out.put_slice(CRLF);
        for (field, value) in &self.headers {
            out.put_slice(field.as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(CRLF);
        }
        out.put_slice(CRLF);
        out.put_slice(&self.body);
        out.freeze()
    }

    /// The verbatim first line.
    pub fn start_line(&self) -> &str {
        &self.start_line
    }

    /// Header fields in insertion order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Exact-match header lookup; empty string when absent.
    pub fn header(&self, field: &str) -> &str {
        self.headers
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    /// Whether the field is present at all.
    pub fn has_header(&self, field: &str) -> bool {
        self.headers.iter().any(|(k, _)| k == field)
    }

    /// Insert or overwrite a field. An empty value removes the field.
    pub fn set_header(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            self.headers.retain(|(k, _)| k != field);
        } else {
            self.insert(field, value);
        }
    }

    fn insert(&mut self, field: &str, value: &str) {
        match self.headers.iter_mut().find(|(k, _)| k == field) {
            Some((_, v)) => *v = value.to_string(),
            None => self.headers.push((field.to_string(), value.to_string())),
        }
    }

    /// Second whitespace-delimited token of the start line (request target).
    pub fn target(&self) -> &str {
        self.start_line.split_whitespace().nth(1).unwrap_or("")
    }

    /// Whether `Transfer-Encoding` names the `chunked` coding.
    pub fn is_chunked(&self) -> bool {
        self.header(TRANSFER_ENCODING).contains("chunked")
    }

    /// Parsed `Content-Length`; a missing or blank header counts as zero.
    pub fn content_length(&self) -> Result<usize, FramingError> {
        let raw = self.header(CONTENT_LENGTH);
        if raw.is_empty() {
            return Ok(0);
        }
        raw.parse()
            .map_err(|_| FramingError::InvalidContentLength(raw.to_string()))
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }
}

/// Offset just past the `\r\n\r\n` that ends the header section.
pub(crate) fn find_head_end(buf: &[u8]) -> Option<usize> {
    find(buf, HEAD_TERMINATOR).map(|i| i + HEAD_TERMINATOR.len())
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_request_with_partial_body() {
        let raw = b"POST http://example.com/form HTTP/1.1\r\nHost: example.com\r\nContent-Length: 10\r\n\r\nhello";
        let message = Message::parse(raw).unwrap();

        assert_eq!(message.start_line(), "POST http://example.com/form HTTP/1.1");
        assert_eq!(message.header("Host"), "example.com");
        assert_eq!(message.header("Content-Length"), "10");
        assert_eq!(message.body().as_ref(), b"hello");
        assert_eq!(message.target(), "http://example.com/form");
    }

    #[test]
    fn parse_without_header_lines() {
        let message = Message::parse(b"GET http://example.com/ HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(message.start_line(), "GET http://example.com/ HTTP/1.1");
        assert_eq!(message.headers().count(), 0);
        assert!(message.body().is_empty());
    }

    #[test]
    fn header_value_keeps_colons_after_the_first() {
        let message = Message::parse(b"GET / HTTP/1.1\r\nHost:  example.com:8080 \r\n\r\n").unwrap();
        assert_eq!(message.header("Host"), "example.com:8080");
    }

    #[test]
    fn header_line_without_colon_is_malformed() {
        let err = Message::parse(b"GET / HTTP/1.1\r\nnot a header\r\n\r\n").unwrap_err();
        assert!(matches!(err, FramingError::MalformedHeader(line) if line == "not a header"));
    }

    #[test]
    fn missing_separator_is_rejected() {
        let err = Message::parse(b"GET / HTTP/1.1\r\nHost: a\r\n").unwrap_err();
        assert!(matches!(err, FramingError::MissingHeaderSeparator));
    }

    #[test]
    fn duplicate_fields_keep_last_value() {
        let message = Message::parse(b"HTTP/1.1 200 OK\r\nX-A: 1\r\nX-B: 2\r\nX-A: 3\r\n\r\n").unwrap();
        let headers: Vec<_> = message.headers().collect();
        assert_eq!(headers, vec![("X-A", "3"), ("X-B", "2")]);
    }

    #[test]
    fn header_lookup_is_case_sensitive() {
        let message = Message::parse(b"HTTP/1.1 200 OK\r\ncontent-length: 4\r\n\r\n").unwrap();
        assert_eq!(message.header("Content-Length"), "");
        assert_eq!(message.header("content-length"), "4");
    }

    #[test]
    fn encode_uses_insertion_order() {
        let mut message = Message::new("HTTP/1.1 200 OK");
        message.set_header("Content-Type", "text/plain");
        message.set_header("Content-Length", "2");
        message.set_body(&b"hi"[..]);

        assert_eq!(
            message.encode().as_ref(),
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nhi"
        );
    }

    #[test]
    fn encode_then_parse_preserves_message() {
        let mut message = Message::new("PUT http://example.com/a HTTP/1.1");
        message.set_header("Host", "example.com");
        message.set_header("Content-Length", "3");
        message.set_body(&b"abc"[..]);

        assert_eq!(Message::parse(&message.encode()).unwrap(), message);
    }

    #[test]
    fn clearing_absent_header_is_noop() {
        let mut message = Message::parse(b"GET / HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();
        let before = message.clone();

        message.set_header("Proxy-Connection", "");
        assert_eq!(message, before);
    }

    #[test]
    fn clearing_twice_equals_clearing_once() {
        let mut once = Message::parse(b"GET / HTTP/1.1\r\nHost: a\r\nProxy-Connection: keep-alive\r\n\r\n").unwrap();
        once.set_header("Proxy-Connection", "");
        let mut twice = once.clone();
        twice.set_header("Proxy-Connection", "");

        assert_eq!(once, twice);
        assert!(!once.has_header("Proxy-Connection"));
    }

    #[test]
    fn set_header_overwrites_in_place() {
        let mut message = Message::parse(b"GET / HTTP/1.1\r\nConnection: close\r\nHost: a\r\n\r\n").unwrap();
        message.set_header("Connection", "keep-alive");
        let headers: Vec<_> = message.headers().collect();
        assert_eq!(headers, vec![("Connection", "keep-alive"), ("Host", "a")]);
    }

    #[test]
    fn chunked_detection_is_substring_match() {
        let mut message = Message::new("HTTP/1.1 200 OK");
        assert!(!message.is_chunked());
        message.set_header("Transfer-Encoding", "gzip, chunked");
        assert!(message.is_chunked());
    }

    #[test]
    fn content_length_defaults_to_zero() {
        let mut message = Message::new("HTTP/1.1 204 No Content");
        assert_eq!(message.content_length().unwrap(), 0);
        message.set_header("Content-Length", "12");
        assert_eq!(message.content_length().unwrap(), 12);
        message.set_header("Content-Length", "-1");
        assert!(matches!(message.content_length(), Err(FramingError::InvalidContentLength(_))));
    }
}
