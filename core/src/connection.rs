/*
 * connection.rs
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

//! Client connection: one stream, one CLIENT-role parser, one origin.
//!
//! A connection runs at most one request/response cycle at a time: `send`
//! takes the parser's owned guard and moves it into the response body, so
//! the parser is released only when the body completes or is dropped. On a
//! clean keep-alive cycle the parser returns to idle and the connection's
//! expiry deadline is refreshed; any error closes the connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::content::Content;
use crate::error::{Error, Result};
use crate::h1::{HttpParser, Role};
use crate::headers::Headers;
use crate::net::{NetworkBackend, NetworkStream};
use crate::request::Request;
use crate::response::Response;
use crate::streams::HttpBody;
use crate::url::Url;

const KEEPALIVE_DURATION: Duration = Duration::from_secs(5);
const SEND_CHUNK: usize = 64 * 1024;

/// Opaque completion handle held by a response body: refreshes the owning
/// connection's idle deadline when the cycle completes. Keeps ownership
/// one-way; the body never sees the connection itself.
pub(crate) struct IdleHandle {
    expiry: Arc<std::sync::Mutex<Instant>>,
    keepalive: Duration,
}

impl IdleHandle {
    pub(crate) fn refresh(&self) {
        if let Ok(mut expiry) = self.expiry.lock() {
            *expiry = Instant::now() + self.keepalive;
        }
    }
}

pub struct Connection {
    parser: Arc<Mutex<HttpParser>>,
    origin: Url,
    keepalive: Duration,
    idle_expiry: Arc<std::sync::Mutex<Instant>>,
}

impl Connection {
    pub fn new(stream: NetworkStream, origin: Url) -> Connection {
        Connection {
            parser: Arc::new(Mutex::new(HttpParser::new(stream, Role::Client))),
            origin,
            keepalive: KEEPALIVE_DURATION,
            idle_expiry: Arc::new(std::sync::Mutex::new(Instant::now() + KEEPALIVE_DURATION)),
        }
    }

    /// The `(scheme, host, port)` origin this connection serves.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Idle: no cycle in flight and the parser is at its initial states.
    pub fn is_idle(&self) -> bool {
        match self.parser.try_lock() {
            Ok(parser) => parser.is_idle(),
            Err(_) => false,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.is_idle()
            && self
                .idle_expiry
                .lock()
                .map(|expiry| now > *expiry)
                .unwrap_or(true)
    }

    pub fn is_closed(&self) -> bool {
        match self.parser.try_lock() {
            Ok(parser) => parser.is_closed(),
            Err(_) => false,
        }
    }

    pub fn description(&self) -> &'static str {
        match self.parser.try_lock() {
            Ok(parser) => parser.description(),
            Err(_) => "active",
        }
    }

    /// Run one request/response cycle. The returned response's body is lazy;
    /// reading it pulls from this connection's parser, and closing it
    /// completes the cycle (re-idling the connection when keep-alive held).
    pub async fn send(&self, mut request: Request) -> Result<Response> {
        let mut parser = Arc::clone(&self.parser).lock_owned().await;
        match Self::run_cycle(&mut parser, &mut request).await {
            Ok((status_code, headers)) => {
                let handle = IdleHandle {
                    expiry: Arc::clone(&self.idle_expiry),
                    keepalive: self.keepalive,
                };
                let body = HttpBody::client(parser, Some(handle));
                Ok(Response::from_parts(status_code, headers, body))
            }
            Err(e) => {
                parser.close().await;
                Err(e)
            }
        }
    }

    async fn run_cycle(
        parser: &mut HttpParser,
        request: &mut Request,
    ) -> Result<(u16, Headers)> {
        parser
            .send_method_line(&request.method, &request.url.target(), "HTTP/1.1")
            .await?;
        parser.send_headers(&request.headers.to_vec()).await?;
        loop {
            let data = request.stream.read(SEND_CHUNK).await?;
            parser.send_body(&data).await?;
            if data.is_empty() {
                break;
            }
        }
        // Interim 1xx blocks loop back to the status line until a final
        // status arrives.
        loop {
            let (_, status_code, _) = parser.recv_status_line().await?;
            let header_list = parser.recv_headers().await?;
            if status_code >= 200 {
                let headers = Headers::from_pairs(header_list)?;
                return Ok((status_code, headers));
            }
        }
    }

    /// Build a request against this connection's origin, send it, and read
    /// the response fully.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        headers: Headers,
        content: Option<Content>,
    ) -> Result<Response> {
        let url = self.origin.join_str(url)?;
        let request = Request::new(method, url, headers, content)?;
        let mut response = self.send(request).await?;
        let read_result = response.read().await;
        response.close().await;
        read_result?;
        Ok(response)
    }

    /// As `request`, but return the response with its body unread.
    pub async fn stream(
        &self,
        method: &str,
        url: &str,
        headers: Headers,
        content: Option<Content>,
    ) -> Result<Response> {
        let url = self.origin.join_str(url)?;
        let request = Request::new(method, url, headers, content)?;
        self.send(request).await
    }

    /// Close the connection. Waits for any in-flight cycle to release the
    /// parser first.
    pub async fn close(&self) {
        let mut parser = self.parser.lock().await;
        parser.close().await;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Ok(mut parser) = self.parser.try_lock() {
            if !parser.is_closed() {
                log::warn!(
                    "connection to {} dropped without being closed",
                    self.origin
                );
                parser.mark_closed();
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Connection [{} {}]>", self.origin, self.description())
    }
}

fn strip_port(hostname: &str) -> &str {
    match hostname.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => hostname,
    }
}

/// Open a connection to the URL's origin. `hostname` is the TLS SNI name
/// (usually the request's Host header; any port suffix is dropped).
pub async fn open_connection(
    url: &Url,
    hostname: &str,
    backend: &NetworkBackend,
) -> Result<Connection> {
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::invalid("URL scheme must be 'http://' or 'https://'"));
    }
    let host = url.raw_host().to_string();
    let port = url
        .port()
        .unwrap_or(if scheme == "https" { 443 } else { 80 });

    let stream = if scheme == "https" {
        backend.connect_tls(&host, port, strip_port(hostname)).await?
    } else {
        backend.connect(&host, port).await?
    };
    log::debug!("opened connection to {}:{}", host, port);
    Ok(Connection::new(stream, url.clone()))
}
