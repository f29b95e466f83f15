/*
 * streams.rs
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

//! Message body streams: in-memory bytes, lazily opened files, streamed
//! multipart construction, and HTTP-framed bodies pulled from a parser.
//!
//! `read(n)` returns up to n bytes; empty bytes signal the end. `size()`
//! reports the total length when known at construction time, which decides
//! Content-Length vs chunked framing.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::connection::IdleHandle;
use crate::error::Result;
use crate::h1::HttpParser;

const IO_CHUNK: usize = 64 * 1024;

/// A readable message body.
pub enum BodyStream {
    Bytes(ByteStream),
    File(FileStream),
    MultiPart(MultiPartStream),
    Http(HttpBody),
}

impl BodyStream {
    pub fn empty() -> Self {
        BodyStream::Bytes(ByteStream::new(Bytes::new()))
    }

    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        BodyStream::Bytes(ByteStream::new(data.into()))
    }

    /// Read up to `size` bytes; empty means the stream ended.
    pub async fn read(&mut self, size: usize) -> Result<Bytes> {
        match self {
            BodyStream::Bytes(s) => Ok(s.read(size)),
            BodyStream::File(s) => s.read(size).await,
            BodyStream::MultiPart(s) => s.read(size).await,
            BodyStream::Http(s) => s.read(size).await,
        }
    }

    /// Read the remainder of the stream.
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        loop {
            let chunk = self.read(IO_CHUNK).await?;
            if chunk.is_empty() {
                return Ok(out.freeze());
            }
            out.extend_from_slice(&chunk);
        }
    }

    /// Total size when known at construction; `None` means chunked framing.
    pub fn size(&self) -> Option<u64> {
        match self {
            BodyStream::Bytes(s) => Some(s.size()),
            BodyStream::File(_) => None,
            BodyStream::MultiPart(_) => None,
            BodyStream::Http(_) => None,
        }
    }

    /// Release the stream. For HTTP-framed bodies this runs the completion
    /// callback exactly once.
    pub async fn close(&mut self) {
        match self {
            BodyStream::Http(s) => s.close().await,
            BodyStream::File(s) => s.close(),
            _ => {}
        }
    }
}

/// An in-memory body with a known size.
pub struct ByteStream {
    remaining: Bytes,
    size: u64,
}

impl ByteStream {
    pub fn new(data: Bytes) -> Self {
        let size = data.len() as u64;
        Self {
            remaining: data,
            size,
        }
    }

    pub fn read(&mut self, size: usize) -> Bytes {
        let take = self.remaining.len().min(size);
        self.remaining.split_to(take)
    }

    /// The size of the original data, independent of read progress.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// A file-backed body, opened lazily on first read.
pub struct FileStream {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    finished: bool,
}

impl FileStream {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            finished: false,
        }
    }

    pub async fn read(&mut self, size: usize) -> Result<Bytes> {
        if self.finished {
            return Ok(Bytes::new());
        }
        if self.file.is_none() {
            self.file = Some(tokio::fs::File::open(&self.path).await?);
        }
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Ok(Bytes::new()),
        };
        let mut buf = vec![0u8; size.min(IO_CHUNK)];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            self.finished = true;
            return Ok(Bytes::new());
        }
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    pub fn close(&mut self) {
        self.file = None;
        self.finished = true;
    }
}

fn escape_disposition_name(name: &str) -> String {
    name.replace('\n', "%0A").replace('\r', "%0D").replace('"', "%22")
}

pub(crate) fn random_boundary() -> String {
    let mut buf = [0u8; 16];
    getrandom::getrandom(&mut buf).ok();
    buf.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Streamed `multipart/form-data` construction: form fields first, then
/// file parts in 64 KiB slices, then the closing boundary.
pub struct MultiPartStream {
    boundary: String,
    form: std::collections::VecDeque<(String, String)>,
    files: std::collections::VecDeque<(String, PathBuf)>,
    current_file: Option<FileStream>,
    wrote_terminator: bool,
    buffer: BytesMut,
}

impl MultiPartStream {
    pub fn new(
        form: Vec<(String, String)>,
        files: Vec<(String, PathBuf)>,
        boundary: Option<String>,
    ) -> Self {
        Self {
            boundary: boundary.unwrap_or_else(random_boundary),
            form: form.into(),
            files: files.into(),
            current_file: None,
            wrote_terminator: false,
            buffer: BytesMut::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub async fn read(&mut self, size: usize) -> Result<Bytes> {
        let mut out = BytesMut::new();
        if !self.buffer.is_empty() {
            let take = self.buffer.len().min(size);
            out.extend_from_slice(&self.buffer.split_to(take));
        }
        while out.len() < size {
            let section = self.next_section().await?;
            if section.is_empty() {
                break;
            }
            out.extend_from_slice(&section);
        }
        if out.len() > size {
            let excess = out.split_off(size);
            self.buffer = excess;
        }
        Ok(out.freeze())
    }

    async fn next_section(&mut self) -> Result<Bytes> {
        if let Some((key, value)) = self.form.pop_front() {
            let name = escape_disposition_name(&key);
            let section = format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            );
            return Ok(Bytes::from(section));
        }
        if self.current_file.is_none() {
            if let Some((key, path)) = self.files.pop_front() {
                let name = escape_disposition_name(&key);
                let filename = path
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.current_file = Some(FileStream::new(path));
                let section = format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\r\n",
                    self.boundary, name, filename
                );
                return Ok(Bytes::from(section));
            }
        }
        if let Some(file) = self.current_file.as_mut() {
            let chunk = file.read(IO_CHUNK).await?;
            if !chunk.is_empty() {
                return Ok(chunk);
            }
            self.current_file = None;
            return Ok(Bytes::from_static(b"\r\n"));
        }
        if !self.wrote_terminator {
            self.wrote_terminator = true;
            return Ok(Bytes::from(format!("--{}--\r\n", self.boundary)));
        }
        Ok(Bytes::new())
    }
}

enum ParserHandle {
    /// Client side: the cycle's owned parser guard. While the body lives,
    /// the connection's parser is inaccessible, which is what serializes
    /// cycles on one connection.
    Held {
        parser: OwnedMutexGuard<HttpParser>,
        on_complete: Option<IdleHandle>,
    },
    /// Server side: shared access, locked transiently per chunk, so the
    /// request loop can interleave with endpoint body reads.
    Shared(Arc<Mutex<HttpParser>>),
}

/// A lazy HTTP-framed body. Pulls chunks from the parser's receive side,
/// buffers any excess, and on `close` notifies the owning connection
/// exactly once (client: complete the cycle and refresh the idle deadline;
/// server: reset the parser for the next request).
pub struct HttpBody {
    source: Option<ParserHandle>,
    buffer: BytesMut,
    finished: bool,
    completed: bool,
}

impl HttpBody {
    pub(crate) fn client(
        parser: OwnedMutexGuard<HttpParser>,
        on_complete: Option<IdleHandle>,
    ) -> Self {
        Self {
            source: Some(ParserHandle::Held { parser, on_complete }),
            buffer: BytesMut::new(),
            finished: false,
            completed: false,
        }
    }

    pub(crate) fn server(parser: Arc<Mutex<HttpParser>>) -> Self {
        Self {
            source: Some(ParserHandle::Shared(parser)),
            buffer: BytesMut::new(),
            finished: false,
            completed: false,
        }
    }

    async fn next_chunk(&mut self) -> Result<Bytes> {
        match self.source.as_mut() {
            Some(ParserHandle::Held { parser, .. }) => parser.recv_body().await,
            Some(ParserHandle::Shared(parser)) => parser.lock().await.recv_body().await,
            None => Ok(Bytes::new()),
        }
    }

    pub async fn read(&mut self, size: usize) -> Result<Bytes> {
        let mut out = BytesMut::new();
        if !self.buffer.is_empty() {
            let take = self.buffer.len().min(size);
            out.extend_from_slice(&self.buffer.split_to(take));
        }
        while out.len() < size && !self.finished {
            let chunk = self.next_chunk().await?;
            if chunk.is_empty() {
                self.finished = true;
                break;
            }
            out.extend_from_slice(&chunk);
        }
        if out.len() > size {
            let excess = out.split_off(size);
            self.buffer = excess;
        }
        Ok(out.freeze())
    }

    /// Run the completion callback. Safe to call more than once; only the
    /// first call has an effect.
    pub async fn close(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        match self.source.take() {
            Some(ParserHandle::Held {
                mut parser,
                on_complete,
            }) => {
                parser.complete().await;
                if let Some(handle) = on_complete {
                    handle.refresh();
                }
            }
            Some(ParserHandle::Shared(parser)) => {
                parser.lock().await.reset();
            }
            None => {}
        }
    }
}

impl Drop for HttpBody {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        // A client-side body dropped mid-cycle leaves the parser in an
        // unusable state; mark the connection closed so the pool evicts it.
        // Server-side bodies are drained by the request loop instead.
        if let Some(ParserHandle::Held { mut parser, .. }) = self.source.take() {
            log::warn!("response body dropped without being closed");
            parser.mark_closed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_stream_reports_original_size() {
        let mut s = ByteStream::new(Bytes::from_static(b"hello"));
        assert_eq!(s.size(), 5);
        assert_eq!(&s.read(2)[..], b"he");
        assert_eq!(s.size(), 5);
        assert_eq!(&s.read(10)[..], b"llo");
        assert!(s.read(10).is_empty());
    }

    #[tokio::test]
    async fn multipart_form_fields_and_terminator() {
        let mut s = MultiPartStream::new(
            vec![("a".to_string(), "1".to_string())],
            vec![],
            Some("XYZ".to_string()),
        );
        let mut out = Vec::new();
        loop {
            let chunk = s.read(7).await.unwrap();
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "--XYZ\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--XYZ--\r\n"
        );
    }

    async fn read_all(s: &mut MultiPartStream) -> String {
        let mut out = Vec::new();
        loop {
            let chunk = s.read(IO_CHUNK).await.unwrap();
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn multipart_escapes_field_names() {
        let mut s = MultiPartStream::new(
            vec![("a\"b\r\n".to_string(), "v".to_string())],
            vec![],
            Some("B".to_string()),
        );
        let out = read_all(&mut s).await;
        assert!(out.contains("name=\"a%22b%0D%0A\""));
    }

    #[test]
    fn boundary_is_32_hex_chars() {
        let b = random_boundary();
        assert_eq!(b.len(), 32);
        assert!(b.bytes().all(|c| c.is_ascii_hexdigit()));
    }
}
