/*
 * lib.rs
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

//! Corriere core: an HTTP/1.1 client and server library.
//!
//! The layers, leaves first:
//! - `net`: plain TCP, TLS, and in-memory streams behind one type, plus
//!   listeners and connect deadlines.
//! - `h1`: the byte-level HTTP/1.1 framer — a role-parameterized state
//!   machine over a bounded read-ahead buffer.
//! - `streams`: message bodies (in-memory, file, multipart, HTTP-framed).
//! - `url`, `headers`, `content`: URLs with RFC 3986 normalization, ordered
//!   header multi-maps, and typed request/response content.
//! - `connection` / `pool`: single-connection request driver and the
//!   origin-keyed pool with keep-alive reuse.
//! - `client` / `server`: the high-level request API and the per-connection
//!   server loop.

pub mod client;
pub mod connection;
pub mod content;
pub mod error;
pub mod h1;
pub mod headers;
pub mod net;
pub mod pool;
pub mod request;
pub mod response;
pub mod server;
pub mod streams;
pub mod url;
pub mod urlencode;

pub use client::{delete, get, patch, post, put, Client};
pub use connection::{open_connection, Connection};
pub use content::{Content, Form, MultiPart};
pub use error::{Error, Result};
pub use h1::{HttpParser, Role, State};
pub use headers::Headers;
pub use net::{NetworkBackend, NetworkListener, NetworkStream};
pub use pool::ConnectionPool;
pub use request::Request;
pub use response::{reason_phrase, Response};
pub use server::{serve, HttpServer};
pub use streams::{BodyStream, HttpBody, MultiPartStream};
pub use url::{QueryParams, Url};
pub use urlencode::{quote, unquote};
