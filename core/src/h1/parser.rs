/*
 * parser.rs
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

//! The HTTP/1.1 wire-protocol state machine for one persistent connection.
//!
//! One parser per connection, role-parameterized: a CLIENT starts by sending
//! a method line, a SERVER by receiving one. Send and receive sub-states
//! interlock at the method line (which arms the paired direction) and at
//! cycle completion, where keep-alive decides between resetting to the
//! role-initial states and closing the stream.

use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use super::readahead::{bounded_hex, bounded_int, ReadAheadParser};
use crate::error::{Error, Result};
use crate::net::NetworkStream;

const MAX_LINE: usize = 4096;
const MAX_CONTENT_LENGTH_DIGITS: usize = 20;
const MAX_CHUNK_SIZE_DIGITS: usize = 8;

/// Per-direction protocol states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Wait,
    SendMethodLine,
    SendStatusLine,
    SendHeaders,
    SendBody,
    RecvMethodLine,
    RecvStatusLine,
    RecvHeaders,
    RecvBody,
    Done,
    Closed,
}

/// Connection role: sets the initial sub-states and which side must carry
/// the `Host` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// The HTTP/1.1 framer. Owns the stream (through the read-ahead buffer) and
/// both direction sub-states plus framing metadata.
pub struct HttpParser {
    reader: ReadAheadParser,
    role: Role,
    send_state: State,
    recv_state: State,
    /// Declared body length; `None` means Transfer-Encoding: chunked.
    send_content_length: Option<u64>,
    recv_content_length: Option<u64>,
    send_seen_length: u64,
    recv_seen_length: u64,
    send_keep_alive: bool,
    recv_keep_alive: bool,
    /// The last status line was interim (1xx): after its header block the
    /// receive side loops back to RecvStatusLine instead of the body.
    processing_1xx: bool,
}

impl HttpParser {
    pub fn new(stream: NetworkStream, role: Role) -> Self {
        let (send_state, recv_state) = Self::initial_states(role);
        Self {
            reader: ReadAheadParser::new(stream),
            role,
            send_state,
            recv_state,
            send_content_length: Some(0),
            recv_content_length: Some(0),
            send_seen_length: 0,
            recv_seen_length: 0,
            send_keep_alive: true,
            recv_keep_alive: true,
            processing_1xx: false,
        }
    }

    fn initial_states(role: Role) -> (State, State) {
        match role {
            Role::Client => (State::SendMethodLine, State::Wait),
            Role::Server => (State::Wait, State::RecvMethodLine),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn send_state(&self) -> State {
        self.send_state
    }

    pub fn recv_state(&self) -> State {
        self.recv_state
    }

    fn expect_send(&self, expected: State, op: &str) -> Result<()> {
        if self.send_state != expected {
            return Err(Error::protocol(format!(
                "Called '{}' in invalid state {:?}",
                op, self.send_state
            )));
        }
        Ok(())
    }

    fn expect_recv(&self, expected: State, op: &str) -> Result<()> {
        if self.recv_state != expected {
            return Err(Error::protocol(format!(
                "Called '{}' in invalid state {:?}",
                op, self.recv_state
            )));
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.reader.stream_mut().write_all(data).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.reader.stream_mut().flush().await?;
        Ok(())
    }

    /// Send the request line, e.g. `GET / HTTP/1.1`. CLIENT only; arms the
    /// receive side for the status line.
    pub async fn send_method_line(
        &mut self,
        method: &str,
        target: &str,
        protocol: &str,
    ) -> Result<()> {
        self.expect_send(State::SendMethodLine, "send_method_line")?;
        if protocol != "HTTP/1.1" {
            return Err(Error::protocol("Sent unsupported protocol version"));
        }
        let line = format!("{} {} {}\r\n", method, target, protocol);
        self.write(line.as_bytes()).await?;

        self.send_state = State::SendHeaders;
        self.recv_state = State::RecvStatusLine;
        Ok(())
    }

    /// Send the status line, e.g. `HTTP/1.1 200 OK`. SERVER only.
    pub async fn send_status_line(
        &mut self,
        protocol: &str,
        status_code: u16,
        reason: &str,
    ) -> Result<()> {
        self.expect_send(State::SendStatusLine, "send_status_line")?;
        if protocol != "HTTP/1.1" {
            return Err(Error::protocol("Sent unsupported protocol version"));
        }
        let line = format!("{} {} {}\r\n", protocol, status_code, reason);
        self.write(line.as_bytes()).await?;

        self.send_state = State::SendHeaders;
        Ok(())
    }

    /// Send the header block. Scans for the framing triple: Content-Length
    /// sets the declared send length, `Transfer-Encoding: chunked` clears it
    /// (chunked framing), `Connection: close` drops send keep-alive.
    pub async fn send_headers(&mut self, headers: &[(String, String)]) -> Result<()> {
        self.expect_send(State::SendHeaders, "send_headers")?;

        let mut seen_host = false;
        for (name, value) in headers {
            let lname = name.to_ascii_lowercase();
            match lname.as_str() {
                "host" => seen_host = true,
                "content-length" => {
                    self.send_content_length = Some(bounded_int(
                        value.as_bytes(),
                        MAX_CONTENT_LENGTH_DIGITS,
                        "Sent invalid Content-Length",
                    )?);
                }
                "connection" if value == "close" => self.send_keep_alive = false,
                "transfer-encoding" if value == "chunked" => self.send_content_length = None,
                _ => {}
            }
        }
        if self.role == Role::Client && !seen_host {
            return Err(Error::protocol("Request missing 'Host' header"));
        }

        let mut block = String::new();
        for (name, value) in headers {
            block.push_str(name);
            block.push_str(": ");
            block.push_str(value);
            block.push_str("\r\n");
        }
        block.push_str("\r\n");
        self.write(block.as_bytes()).await?;
        self.flush().await?;

        self.send_state = State::SendBody;
        Ok(())
    }

    /// Send one body chunk. Empty `body` signals end-of-body: it emits the
    /// chunked terminator (or checks the declared length was met) and moves
    /// the send side to Done.
    pub async fn send_body(&mut self, body: &[u8]) -> Result<()> {
        self.expect_send(State::SendBody, "send_body")?;

        match self.send_content_length {
            None => {
                // Transfer-Encoding: chunked
                self.send_seen_length += body.len() as u64;
                let mut frame = Vec::with_capacity(body.len() + 16);
                frame.extend_from_slice(format!("{:x}\r\n", body.len()).as_bytes());
                frame.extend_from_slice(body);
                frame.extend_from_slice(b"\r\n");
                self.write(&frame).await?;
            }
            Some(declared) => {
                // Content-Length: xxx
                self.send_seen_length += body.len() as u64;
                if self.send_seen_length > declared {
                    return Err(Error::protocol(
                        "Too much data sent for declared Content-Length",
                    ));
                }
                if self.send_seen_length < declared && body.is_empty() {
                    return Err(Error::protocol(
                        "Not enough data sent for declared Content-Length",
                    ));
                }
                if !body.is_empty() {
                    self.write(body).await?;
                }
            }
        }

        if body.is_empty() {
            self.flush().await?;
            self.send_state = State::Done;
        }
        Ok(())
    }

    /// Receive the request line. SERVER only; arms the send side for the
    /// status line. Returns (method, target, protocol).
    pub async fn recv_method_line(&mut self) -> Result<(String, String, String)> {
        self.expect_recv(State::RecvMethodLine, "recv_method_line")?;

        let line = self
            .reader
            .read_until(b"\r\n", MAX_LINE, "reading request method line")
            .await?;
        let (method, target, protocol) = split_line(&line, "Received invalid request line")?;
        if protocol != "HTTP/1.1" {
            return Err(Error::protocol("Received unsupported protocol version"));
        }

        self.recv_state = State::RecvHeaders;
        self.send_state = State::SendStatusLine;
        Ok((method, target, protocol))
    }

    /// Receive a status line. Interim (1xx) status codes set a flag so the
    /// header block that follows loops back here instead of advancing to
    /// the body. Returns (protocol, status code, reason phrase).
    pub async fn recv_status_line(&mut self) -> Result<(String, u16, String)> {
        self.expect_recv(State::RecvStatusLine, "recv_status_line")?;

        let line = self
            .reader
            .read_until(b"\r\n", MAX_LINE, "reading response status line")
            .await?;
        let (protocol, code_str, reason) = split_line(&line, "Received invalid status line")?;
        if protocol != "HTTP/1.1" {
            return Err(Error::protocol("Received unsupported protocol version"));
        }
        let status_code =
            bounded_int(code_str.as_bytes(), 3, "Received invalid status code")? as u16;
        if status_code < 100 {
            return Err(Error::protocol("Received invalid status code"));
        }
        self.processing_1xx = status_code < 200;

        self.recv_state = State::RecvHeaders;
        Ok((protocol, status_code, reason))
    }

    /// Receive the header block up to the empty terminator line. Scans the
    /// framing triple (except inside an interim 1xx block, whose framing
    /// pertains only to the final response). SERVER role requires `Host`.
    pub async fn recv_headers(&mut self) -> Result<Vec<(String, String)>> {
        self.expect_recv(State::RecvHeaders, "recv_headers")?;

        let mut headers = Vec::new();
        loop {
            let line = self
                .reader
                .read_until(b"\r\n", MAX_LINE, "reading response headers")
                .await?;
            if line.is_empty() {
                break;
            }
            let text = std::str::from_utf8(&line)
                .map_err(|_| Error::protocol("Received invalid header"))?;
            let (name, value) = text
                .split_once(':')
                .ok_or_else(|| Error::protocol("Received invalid header"))?;
            headers.push((name.to_string(), value.trim_matches(' ').to_string()));
        }

        if self.processing_1xx {
            self.processing_1xx = false;
            self.recv_state = State::RecvStatusLine;
            return Ok(headers);
        }

        let mut seen_host = false;
        for (name, value) in &headers {
            let lname = name.to_ascii_lowercase();
            match lname.as_str() {
                "host" => seen_host = true,
                "content-length" => {
                    self.recv_content_length = Some(bounded_int(
                        value.as_bytes(),
                        MAX_CONTENT_LENGTH_DIGITS,
                        "Received invalid Content-Length",
                    )?);
                }
                "connection" if value == "close" => self.recv_keep_alive = false,
                "transfer-encoding" if value == "chunked" => self.recv_content_length = None,
                _ => {}
            }
        }
        if self.role == Role::Server && !seen_host {
            return Err(Error::protocol("Request missing 'Host' header"));
        }

        self.recv_state = State::RecvBody;
        Ok(headers)
    }

    /// Pull one body chunk. Returns empty bytes exactly once to signal the
    /// end of the body, moving the receive side to Done.
    pub async fn recv_body(&mut self) -> Result<Bytes> {
        self.expect_recv(State::RecvBody, "recv_body")?;

        let body = match self.recv_content_length {
            None => {
                // Transfer-Encoding: chunked
                let line = self
                    .reader
                    .read_until(b"\r\n", MAX_LINE, "reading chunk size")
                    .await?;
                let size_digits = match line.iter().position(|&b| b == b';') {
                    Some(i) => &line[..i],
                    None => &line[..],
                };
                let size = bounded_hex(
                    size_digits,
                    MAX_CHUNK_SIZE_DIGITS,
                    "Received invalid chunk size",
                )?;
                if size > 0 {
                    let body = self.reader.read(size as usize).await?;
                    self.reader
                        .read_until(b"\r\n", 2, "reading chunk data")
                        .await?;
                    self.recv_seen_length += body.len() as u64;
                    body
                } else {
                    self.reader
                        .read_until(b"\r\n", 2, "reading chunk termination")
                        .await?;
                    Bytes::new()
                }
            }
            Some(declared) => {
                // Content-Length: xxx
                let remaining = declared - self.recv_seen_length;
                let size = remaining.min(MAX_LINE as u64) as usize;
                let body = self.reader.read(size).await?;
                self.recv_seen_length += body.len() as u64;
                if self.recv_seen_length < declared && body.is_empty() {
                    return Err(Error::protocol(
                        "Not enough data received for declared Content-Length",
                    ));
                }
                body
            }
        };

        if body.is_empty() {
            self.recv_state = State::Done;
        }
        Ok(body)
    }

    /// Finish a cycle. When both sides are Done and keep-alive survived,
    /// the parser returns to its role-initial states ready for the next
    /// cycle; otherwise the connection closes.
    pub async fn complete(&mut self) {
        let fully_complete = self.send_state == State::Done && self.recv_state == State::Done;
        let keepalive = self.send_keep_alive && self.recv_keep_alive;
        if !(fully_complete && keepalive) {
            self.close().await;
            return;
        }
        self.reset_cycle();
    }

    /// Server-side cycle completion: as `complete`, but an unfinished cycle
    /// is left untouched rather than closed, so a request body that is
    /// drained before the response is written does not tear down the
    /// connection.
    pub fn reset(&mut self) {
        let fully_complete = self.send_state == State::Done && self.recv_state == State::Done;
        if fully_complete && self.send_keep_alive && self.recv_keep_alive {
            self.reset_cycle();
        }
    }

    fn reset_cycle(&mut self) {
        let (send_state, recv_state) = Self::initial_states(self.role);
        self.send_state = send_state;
        self.recv_state = recv_state;
        self.send_content_length = Some(0);
        self.recv_content_length = Some(0);
        self.send_seen_length = 0;
        self.recv_seen_length = 0;
        self.send_keep_alive = true;
        self.recv_keep_alive = true;
        self.processing_1xx = false;
    }

    /// Idempotently mark both sub-states Closed and shut the stream down.
    pub async fn close(&mut self) {
        if self.send_state != State::Closed {
            self.send_state = State::Closed;
            self.recv_state = State::Closed;
            let _ = self.reader.stream_mut().close().await;
        }
    }

    /// Mark both sub-states Closed without touching the stream. Used on
    /// destructor paths where no I/O can be awaited; the socket itself is
    /// released when the stream drops.
    pub(crate) fn mark_closed(&mut self) {
        self.send_state = State::Closed;
        self.recv_state = State::Closed;
    }

    /// Block until the peer has sent at least one byte. Returns false when
    /// the peer closed instead.
    pub async fn wait_readable(&mut self) -> Result<bool> {
        self.reader.fill().await
    }

    pub fn is_idle(&self) -> bool {
        self.send_state == State::SendMethodLine || self.recv_state == State::RecvMethodLine
    }

    pub fn is_closed(&self) -> bool {
        self.send_state == State::Closed
    }

    pub fn is_keepalive(&self) -> bool {
        self.send_keep_alive && self.recv_keep_alive
    }

    pub fn description(&self) -> &'static str {
        match self.send_state {
            State::SendMethodLine => "idle",
            State::Closed => "closed",
            _ => "active",
        }
    }
}

impl std::fmt::Debug for HttpParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<HttpParser [send {:?}, recv {:?}]>",
            self.send_state, self.recv_state
        )
    }
}

fn split_line(line: &[u8], error: &str) -> Result<(String, String, String)> {
    let text = std::str::from_utf8(line).map_err(|_| Error::protocol(error))?;
    let mut parts = text.splitn(3, ' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), Some(c)) => Ok((a.to_string(), b.to_string(), c.to_string())),
        _ => Err(Error::protocol(error)),
    }
}
