/*
 * server.rs
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

//! HTTP server loop: accept connections, parse requests in SERVER role,
//! invoke the endpoint, write responses, and keep the connection alive
//! across cycles when both sides allow it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::content::Content;
use crate::error::Result;
use crate::h1::{HttpParser, Role, State};
use crate::headers::Headers;
use crate::net::{NetworkBackend, NetworkListener, NetworkStream};
use crate::request::Request;
use crate::response::Response;
use crate::streams::{BodyStream, HttpBody};
use crate::url::Url;

const SEND_CHUNK: usize = 64 * 1024;

/// A running server. Aborts its accept loop when closed or dropped.
pub struct HttpServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl HttpServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn close(&self) {
        self.task.abort();
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Bind `host:port` (port 0 picks an ephemeral port) and serve `endpoint`
/// on a background task, one task per connection.
pub async fn serve<F, Fut>(host: &str, port: u16, endpoint: F) -> Result<HttpServer>
where
    F: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    let backend = NetworkBackend::new();
    let listener = backend.listen(host, port).await?;
    let addr = listener.local_addr()?;
    let task = tokio::spawn(accept_loop(listener, endpoint));
    log::info!("Serving on http://{}/", addr);
    Ok(HttpServer { addr, task })
}

async fn accept_loop<F, Fut>(listener: NetworkListener, endpoint: F)
where
    F: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    loop {
        match listener.accept().await {
            Ok(stream) => {
                let endpoint = endpoint.clone();
                tokio::spawn(async move {
                    let connection = ServerConnection::new(stream, endpoint);
                    if let Err(e) = connection.handle_requests().await {
                        log::error!("connection error: {}", e);
                    }
                });
            }
            Err(e) => {
                log::error!("accept failed: {}", e);
                return;
            }
        }
    }
}

struct ServerConnection<F> {
    parser: Arc<Mutex<HttpParser>>,
    endpoint: F,
}

impl<F, Fut> ServerConnection<F>
where
    F: Fn(Request) -> Fut,
    Fut: Future<Output = Result<Response>>,
{
    fn new(stream: NetworkStream, endpoint: F) -> Self {
        Self {
            parser: Arc::new(Mutex::new(HttpParser::new(stream, Role::Server))),
            endpoint,
        }
    }

    async fn handle_requests(&self) -> Result<()> {
        loop {
            {
                let mut parser = self.parser.lock().await;
                if parser.is_closed() {
                    return Ok(());
                }
                // A peer that closes between requests is a clean end.
                if !parser.wait_readable().await? {
                    parser.close().await;
                    return Ok(());
                }
            }

            let (method, target) = {
                let mut parser = self.parser.lock().await;
                let (method, target, _) = parser.recv_method_line().await?;
                (method, target)
            };
            let header_list = self.parser.lock().await.recv_headers().await?;

            let url = Url::parse(&target)?;
            let headers = Headers::from_pairs(header_list)?;
            let body = BodyStream::Http(HttpBody::server(Arc::clone(&self.parser)));
            let request = Request::from_parts(method.clone(), url, headers, body);

            let response = match (self.endpoint)(request).await {
                Ok(response) => {
                    log::info!(
                        "{} {} [{} {}]",
                        method,
                        target,
                        response.status_code,
                        response.reason_phrase()
                    );
                    response
                }
                Err(e) => {
                    log::error!("Internal Server Error: {}", e);
                    Response::with_content(500, Content::text("Internal Server Error"))?
                }
            };
            self.send_response(response).await?;

            let mut parser = self.parser.lock().await;
            if parser.is_keepalive() {
                // Drain whatever the endpoint left unread before resetting
                // for the next cycle.
                while parser.recv_state() == State::RecvBody {
                    if parser.recv_body().await?.is_empty() {
                        break;
                    }
                }
                parser.reset();
            } else {
                parser.close().await;
            }
        }
    }

    async fn send_response(&self, mut response: Response) -> Result<()> {
        {
            let mut parser = self.parser.lock().await;
            parser
                .send_status_line("HTTP/1.1", response.status_code, response.reason_phrase())
                .await?;
            parser.send_headers(&response.headers.to_vec()).await?;
        }
        // The body is read without holding the parser lock: an endpoint may
        // stream the request body straight back as the response body, and
        // that read needs the same parser.
        loop {
            let data = response.stream.read(SEND_CHUNK).await?;
            self.parser.lock().await.send_body(&data).await?;
            if data.is_empty() {
                return Ok(());
            }
        }
    }
}
