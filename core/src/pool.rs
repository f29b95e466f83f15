/*
 * pool.rs
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

//! Connection pool: origin-keyed reuse with keep-alive expiry and a
//! concurrency cap.
//!
//! Before each dispatch the pool closes expired connections and drops
//! closed ones, then reuses the first idle, unexpired connection whose
//! origin matches the request, opening a new one otherwise.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::Semaphore;

use crate::connection::{open_connection, Connection};
use crate::content::Content;
use crate::error::{Error, Result};
use crate::headers::Headers;
use crate::net::NetworkBackend;
use crate::request::Request;
use crate::response::Response;
use crate::url::Url;

const MAX_CONCURRENCY: usize = 100;

pub struct ConnectionPool {
    connections: Mutex<Vec<Arc<Connection>>>,
    backend: NetworkBackend,
    concurrency: Arc<Semaphore>,
    closed: AtomicBool,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::with_backend(NetworkBackend::new())
    }

    pub fn with_backend(backend: NetworkBackend) -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            backend,
            concurrency: Arc::new(Semaphore::new(MAX_CONCURRENCY)),
            closed: AtomicBool::new(false),
        }
    }

    /// Dispatch a request, reusing or opening a connection as required.
    /// The returned response holds a concurrency permit until closed.
    pub async fn send(&self, request: Request) -> Result<Response> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::invalid("ConnectionPool is closed"));
        }
        if !request.url.is_absolute_url() {
            return Err(Error::invalid(format!(
                "Request URL must be absolute: {:?}",
                request.url.to_string()
            )));
        }
        let permit = Arc::clone(&self.concurrency)
            .acquire_owned()
            .await
            .map_err(|_| Error::invalid("ConnectionPool is closed"))?;

        self.cleanup().await;
        let connection = self.get_connection(&request).await?;
        let mut response = connection.send(request).await?;
        response.set_permit(permit);
        Ok(response)
    }

    async fn get_connection(&self, request: &Request) -> Result<Arc<Connection>> {
        let origin = Url::parse(&format!(
            "{}://{}",
            request.url.scheme(),
            request.url.netloc()
        ))?;
        let now = Instant::now();

        if let Ok(connections) = self.connections.lock() {
            for connection in connections.iter() {
                if connection.origin() == &origin
                    && connection.is_idle()
                    && !connection.is_expired(now)
                {
                    log::debug!("reusing connection to {}", origin);
                    return Ok(Arc::clone(connection));
                }
            }
        }

        let hostname = request.headers.get("Host").unwrap_or_default().to_string();
        let connection = Arc::new(open_connection(&origin, &hostname, &self.backend).await?);
        if let Ok(mut connections) = self.connections.lock() {
            connections.push(Arc::clone(&connection));
        }
        Ok(connection)
    }

    /// Close expired connections and drop closed ones.
    async fn cleanup(&self) {
        let now = Instant::now();
        let snapshot: Vec<Arc<Connection>> = self
            .connections
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default();
        for connection in &snapshot {
            if connection.is_expired(now) {
                log::debug!("closing expired connection to {}", connection.origin());
                connection.close().await;
            }
        }
        if let Ok(mut connections) = self.connections.lock() {
            connections.retain(|c| !c.is_closed());
        }
    }

    /// Close every connection. Idempotent; subsequent sends fail.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.concurrency.close();
        let closing: Vec<Arc<Connection>> = self
            .connections
            .lock()
            .map(|mut c| c.drain(..).collect())
            .unwrap_or_default();
        for connection in closing {
            connection.close().await;
        }
    }

    /// The number of pooled connections.
    pub fn len(&self) -> usize {
        self.connections.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A count of connections by state, e.g. "1 idle, 1 active".
    pub fn description(&self) -> String {
        let mut counts: Vec<(&'static str, usize)> = vec![("active", 0)];
        if let Ok(connections) = self.connections.lock() {
            for connection in connections.iter() {
                let state = connection.description();
                match counts.iter_mut().find(|(s, _)| *s == state) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((state, 1)),
                }
            }
        }
        counts
            .iter()
            .map(|(state, n)| format!("{} {}", n, state))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Build a request, send it, and read the response fully.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        headers: Headers,
        content: Option<Content>,
    ) -> Result<Response> {
        let url = Url::parse(url)?;
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
        let url = Url::parse(url)?;
        let request = Request::new(method, url, headers, content)?;
        self.send(request).await
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            log::warn!("ConnectionPool dropped without being closed");
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<ConnectionPool [{}]>", self.description())
    }
}
