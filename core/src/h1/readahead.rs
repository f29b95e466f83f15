/*
 * readahead.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Corriere, an HTTP/1.1 client and server library.
 *
 * Corriere is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Corriere is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Corriere.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Buffered read-ahead over a `NetworkStream`: `read(n)` and bounded
//! `read_until`, with push-back of at most one residual chunk.

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};
use crate::net::NetworkStream;

const CHUNK_SIZE: usize = 4096;

/// A buffered reader with marker scanning. Every `read_until` carries a hard
/// byte budget, so a malformed peer cannot force unbounded buffering.
pub struct ReadAheadParser {
    stream: NetworkStream,
    pushback: Bytes,
}

impl ReadAheadParser {
    pub fn new(stream: NetworkStream) -> Self {
        Self {
            stream,
            pushback: Bytes::new(),
        }
    }

    /// The underlying stream, for the send side of the protocol.
    pub fn stream_mut(&mut self) -> &mut NetworkStream {
        &mut self.stream
    }

    async fn read_some(&mut self) -> Result<Bytes> {
        if !self.pushback.is_empty() {
            return Ok(std::mem::take(&mut self.pushback));
        }
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        self.stream.read_buf(&mut buf).await?;
        Ok(buf.freeze())
    }

    fn push_back(&mut self, data: Bytes) {
        debug_assert!(self.pushback.is_empty());
        self.pushback = data;
    }

    /// Block until at least one byte is buffered. Returns false on EOF.
    pub async fn fill(&mut self) -> Result<bool> {
        if !self.pushback.is_empty() {
            return Ok(true);
        }
        let chunk = self.read_some().await?;
        if chunk.is_empty() {
            return Ok(false);
        }
        self.push_back(chunk);
        Ok(true)
    }

    /// Read up to `size` bytes. Returns fewer only when the stream ends.
    pub async fn read(&mut self, size: usize) -> Result<Bytes> {
        let mut buffer = BytesMut::new();
        while buffer.len() < size {
            let chunk = self.read_some().await?;
            if chunk.is_empty() {
                break;
            }
            buffer.extend_from_slice(&chunk);
        }
        if buffer.len() > size {
            let excess = buffer.split_off(size);
            self.push_back(excess.freeze());
        }
        Ok(buffer.freeze())
    }

    /// Read up to and including `marker`, returning the bytes before it.
    ///
    /// Fails with "Stream closed early {context}" on EOF before the marker,
    /// and "Exceeded maximum size {context}" when the marker does not occur
    /// within `max_size` bytes. Each new scan starts `len(marker)` bytes
    /// before the freshly appended data, so markers straddling chunk
    /// boundaries are found.
    pub async fn read_until(
        &mut self,
        marker: &[u8],
        max_size: usize,
        context: &str,
    ) -> Result<Bytes> {
        let mut buffer = BytesMut::new();
        while buffer.len() <= max_size {
            let chunk = self.read_some().await?;
            if chunk.is_empty() {
                return Err(Error::protocol(format!("Stream closed early {}", context)));
            }
            let start = buffer.len().saturating_sub(marker.len());
            buffer.extend_from_slice(&chunk);
            if let Some(index) = find(&buffer[start..], marker).map(|i| i + start) {
                if index > max_size {
                    return Err(Error::protocol(format!("Exceeded maximum size {}", context)));
                }
                let after = buffer.split_off(index + marker.len());
                self.push_back(after.freeze());
                buffer.truncate(index);
                return Ok(buffer.freeze());
            }
        }
        Err(Error::protocol(format!("Exceeded maximum size {}", context)))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse a bounded decimal field, rejecting overlong or non-digit input.
pub(crate) fn bounded_int(digits: &[u8], max_digits: usize, context: &str) -> Result<u64> {
    if digits.is_empty() || digits.len() > max_digits || !digits.iter().all(u8::is_ascii_digit) {
        return Err(Error::protocol(context));
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::protocol(context))
}

/// Parse a bounded hexadecimal field, rejecting overlong or non-hex input.
pub(crate) fn bounded_hex(digits: &[u8], max_digits: usize, context: &str) -> Result<u64> {
    if digits.is_empty() || digits.len() > max_digits || !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(Error::protocol(context));
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| u64::from_str_radix(s, 16).ok())
        .ok_or_else(|| Error::protocol(context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::NetworkStream;
    use tokio::io::AsyncWriteExt;

    async fn reader_with(data: &[u8]) -> ReadAheadParser {
        let (mut a, b) = NetworkStream::pair(64 * 1024);
        a.write_all(data).await.unwrap();
        a.close().await.unwrap();
        ReadAheadParser::new(b)
    }

    #[tokio::test]
    async fn read_until_excludes_and_consumes_marker() {
        let mut parser = reader_with(b"hello\r\nworld").await;
        let line = parser.read_until(b"\r\n", 4096, "reading line").await.unwrap();
        assert_eq!(&line[..], b"hello");
        let rest = parser.read(5).await.unwrap();
        assert_eq!(&rest[..], b"world");
    }

    #[tokio::test]
    async fn read_until_eof_fails() {
        let mut parser = reader_with(b"no newline here").await;
        let err = parser.read_until(b"\r\n", 4096, "reading line").await.unwrap_err();
        assert_eq!(err.to_string(), "Stream closed early reading line");
    }

    #[tokio::test]
    async fn read_until_budget_exceeded() {
        let mut parser = reader_with(&[b'a'; 10_000]).await;
        let err = parser.read_until(b"\r\n", 4096, "reading line").await.unwrap_err();
        assert_eq!(err.to_string(), "Exceeded maximum size reading line");
    }

    #[tokio::test]
    async fn marker_found_past_budget_fails() {
        let mut data = vec![b'a'; 100];
        data.extend_from_slice(b"\r\n");
        let mut parser = reader_with(&data).await;
        let err = parser.read_until(b"\r\n", 10, "reading line").await.unwrap_err();
        assert_eq!(err.to_string(), "Exceeded maximum size reading line");
    }

    #[tokio::test]
    async fn read_returns_short_on_eof() {
        let mut parser = reader_with(b"abc").await;
        let data = parser.read(10).await.unwrap();
        assert_eq!(&data[..], b"abc");
        let eof = parser.read(10).await.unwrap();
        assert!(eof.is_empty());
    }

    #[tokio::test]
    async fn pushback_is_consumed_first() {
        let mut parser = reader_with(b"ab\r\ncd").await;
        parser.read_until(b"\r\n", 16, "x").await.unwrap();
        let rest = parser.read(2).await.unwrap();
        assert_eq!(&rest[..], b"cd");
    }

    #[test]
    fn bounded_int_rules() {
        assert_eq!(bounded_int(b"42", 20, "bad").unwrap(), 42);
        assert!(bounded_int(b"", 20, "bad").is_err());
        assert!(bounded_int(b"1x", 20, "bad").is_err());
        assert!(bounded_int(b"-1", 20, "bad").is_err());
        assert!(bounded_int(b"123", 2, "bad").is_err());
    }

    #[test]
    fn bounded_hex_rules() {
        assert_eq!(bounded_hex(b"ff", 8, "bad").unwrap(), 255);
        assert_eq!(bounded_hex(b"DEADbeef", 8, "bad").unwrap(), 0xdead_beef);
        assert!(bounded_hex(b"123456789", 8, "bad").is_err());
        assert!(bounded_hex(b"xyz", 8, "bad").is_err());
    }
}
