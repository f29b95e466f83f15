/*
 * net.rs
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

//! Network backend: plain TCP and rustls TLS streams behind one stream type,
//! plus listeners for the server side.
//!
//! The whole protocol layer is written against `NetworkStream`, so the same
//! state machine runs over TCP, TLS, or an in-memory duplex pipe (tests).

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::RootCertStore;
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Build a root certificate store: platform native certs first, then
/// webpki-roots (the Mozilla CA bundle) as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = root_store.add(cert);
        }
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

/// Default TLS client config (native + Mozilla roots, no client auth).
fn default_client_config() -> Arc<ClientConfig> {
    let config = ClientConfig::builder()
        .with_root_certificates(build_root_store())
        .with_no_client_auth();
    Arc::new(config)
}

/// Bound a fallible operation by a deadline. Expiry surfaces as
/// `Error::Timeout`; the underlying operation is dropped at its next
/// suspension point.
pub async fn deadline<T, F>(duration: Duration, future: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout),
    }
}

/// Unified byte stream: plain TCP, TLS, or an in-memory duplex pipe.
pub enum NetworkStream {
    Plain(TcpStream),
    Tls(TlsStream<TcpStream>),
    Mem(DuplexStream),
}

impl NetworkStream {
    /// A connected in-memory pair, for exercising parsers without sockets.
    pub fn pair(capacity: usize) -> (NetworkStream, NetworkStream) {
        let (a, b) = tokio::io::duplex(capacity);
        (NetworkStream::Mem(a), NetworkStream::Mem(b))
    }

    /// Shut down the write side. Idempotent: an already-closed stream
    /// reports success.
    pub async fn close(&mut self) -> io::Result<()> {
        match self.shutdown().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl AsyncRead for NetworkStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            NetworkStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            NetworkStream::Tls(s) => Pin::new(s).poll_read(cx, buf),
            NetworkStream::Mem(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for NetworkStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            NetworkStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            NetworkStream::Tls(s) => Pin::new(s).poll_write(cx, buf),
            NetworkStream::Mem(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            NetworkStream::Plain(s) => Pin::new(s).poll_flush(cx),
            NetworkStream::Tls(s) => Pin::new(s).poll_flush(cx),
            NetworkStream::Mem(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            NetworkStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            NetworkStream::Tls(s) => Pin::new(s).poll_shutdown(cx),
            NetworkStream::Mem(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Creates raw or TLS-wrapped streams, and listeners for the server side.
pub struct NetworkBackend {
    tls_config: Arc<ClientConfig>,
    connect_timeout: Duration,
}

impl NetworkBackend {
    pub fn new() -> Self {
        Self {
            tls_config: default_client_config(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = duration;
        self
    }

    /// Connect a plain TCP stream.
    pub async fn connect(&self, host: &str, port: u16) -> Result<NetworkStream> {
        let addr = format!("{}:{}", host, port);
        let tcp = deadline(self.connect_timeout, async {
            Ok(TcpStream::connect(&addr).await?)
        })
        .await?;
        Ok(NetworkStream::Plain(tcp))
    }

    /// Connect and perform a TLS handshake. `hostname` is used for SNI and
    /// certificate verification; when empty, `host` is used.
    pub async fn connect_tls(
        &self,
        host: &str,
        port: u16,
        hostname: &str,
    ) -> Result<NetworkStream> {
        let addr = format!("{}:{}", host, port);
        let sni = if hostname.is_empty() { host } else { hostname };
        let server_name: ServerName<'static> = ServerName::try_from(sni.to_string())
            .map_err(|_| Error::invalid(format!("Invalid TLS host name {:?}", sni)))?;
        let connector = TlsConnector::from(self.tls_config.clone());
        let tls = deadline(self.connect_timeout, async {
            let tcp = TcpStream::connect(&addr).await?;
            Ok(connector.connect(server_name, tcp).await?)
        })
        .await?;
        Ok(NetworkStream::Tls(tls))
    }

    /// Bind a listening socket. Port 0 picks an ephemeral port; the bound
    /// address is available from the listener.
    pub async fn listen(&self, host: &str, port: u16) -> Result<NetworkListener> {
        let listener = TcpListener::bind(format!("{}:{}", host, port)).await?;
        Ok(NetworkListener { inner: listener })
    }
}

impl Default for NetworkBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound listening socket yielding accepted `NetworkStream`s.
pub struct NetworkListener {
    inner: TcpListener,
}

impl NetworkListener {
    pub async fn accept(&self) -> Result<NetworkStream> {
        let (stream, _addr) = self.inner.accept().await?;
        Ok(NetworkStream::Plain(stream))
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn mem_pair_moves_bytes() {
        let (mut a, mut b) = NetworkStream::pair(1024);
        a.write_all(b"ping").await.unwrap();
        a.close().await.unwrap();
        let mut buf = Vec::new();
        b.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"ping");
    }

    #[tokio::test]
    async fn deadline_maps_to_timeout_error() {
        let result: Result<()> = deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn listener_reports_bound_port() {
        let backend = NetworkBackend::new();
        let listener = backend.listen("127.0.0.1", 0).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
