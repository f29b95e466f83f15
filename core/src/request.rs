/*
 * request.rs
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

//! HTTP request: method, URL, headers, body stream.
//!
//! Construction establishes the message invariants: a `Host` header (from
//! the URL netloc when absent), `Content-Type` plus either `Content-Length`
//! or `Transfer-Encoding: chunked` when content is attached, and
//! `Content-Length: 0` for bodyless POST/PUT/PATCH.

use bytes::Bytes;

use crate::content::Content;
use crate::error::{Error, Result};
use crate::headers::Headers;
use crate::streams::BodyStream;
use crate::url::Url;

pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: Headers,
    pub stream: BodyStream,
    body: Option<Bytes>,
}

impl Request {
    pub fn new(
        method: &str,
        url: Url,
        headers: Headers,
        content: Option<Content>,
    ) -> Result<Request> {
        let mut headers = headers;

        // RFC 2616 §14.23: a client MUST include Host in every HTTP/1.1
        // request message.
        if !headers.contains_key("Host") {
            let netloc = url.netloc();
            if netloc.is_empty() {
                return Err(Error::invalid(format!(
                    "Request URL has no host: {:?}",
                    url.to_string()
                )));
            }
            headers = headers.copy_set("Host", &netloc)?;
        }

        let stream = match content {
            Some(content) => {
                if let Some(content_type) = content.content_type() {
                    headers = headers.copy_set("Content-Type", &content_type)?;
                }
                let stream = content.into_stream()?;
                // RFC 2616 §4.3: a message body is signaled by Content-Length
                // or Transfer-Encoding.
                match stream.size() {
                    None => {
                        headers = headers.copy_set("Transfer-Encoding", "chunked")?;
                    }
                    Some(size) if size > 0 => {
                        headers = headers.copy_set("Content-Length", &size.to_string())?;
                    }
                    Some(_) => {}
                }
                stream
            }
            None => {
                // RFC 7230 §3.3.2: send Content-Length: 0 for methods that
                // define a meaning for an enclosed body.
                if matches!(method, "POST" | "PUT" | "PATCH") {
                    headers = headers.copy_set("Content-Length", "0")?;
                }
                BodyStream::empty()
            }
        };

        Ok(Request {
            method: method.to_string(),
            url,
            headers,
            stream,
            body: None,
        })
    }

    /// Assemble a received request without re-deriving framing headers; the
    /// inbound header block is already authoritative. Used by the server
    /// loop.
    pub(crate) fn from_parts(
        method: String,
        url: Url,
        headers: Headers,
        stream: BodyStream,
    ) -> Request {
        Request {
            method,
            url,
            headers,
            stream,
            body: None,
        }
    }

    /// Read and cache the whole body. The stream is replaced with an
    /// in-memory one, so the body can be sent (or read) again.
    pub async fn read(&mut self) -> Result<Bytes> {
        if let Some(body) = &self.body {
            return Ok(body.clone());
        }
        let body = self.stream.read_to_end().await?;
        self.body = Some(body.clone());
        self.stream = BodyStream::from_bytes(body.clone());
        Ok(body)
    }

    /// The cached body; present only after `read()`.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub async fn close(&mut self) {
        self.stream.close().await;
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Request [{} {:?}]>", self.method, self.url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_injected_from_netloc() {
        let url = Url::parse("http://example.com:8080/x").unwrap();
        let request = Request::new("GET", url, Headers::new(), None).unwrap();
        assert_eq!(request.headers.get("Host"), Some("example.com:8080"));
    }

    #[test]
    fn existing_host_preserved() {
        let url = Url::parse("http://example.com/").unwrap();
        let headers = Headers::from_pairs([("Host", "override.example")]).unwrap();
        let request = Request::new("GET", url, headers, None).unwrap();
        assert_eq!(request.headers.get("Host"), Some("override.example"));
    }

    #[test]
    fn relative_url_without_host_rejected() {
        let url = Url::parse("/path").unwrap();
        assert!(Request::new("GET", url, Headers::new(), None).is_err());
    }

    #[test]
    fn sized_content_sets_content_length() {
        let url = Url::parse("http://h/").unwrap();
        let request = Request::new(
            "POST",
            url,
            Headers::new(),
            Some(Content::bytes(&b"{\"a\":1}"[..])),
        )
        .unwrap();
        assert_eq!(request.headers.get("Content-Length"), Some("7"));
        assert!(!request.headers.contains_key("Transfer-Encoding"));
    }

    #[test]
    fn unsized_content_sets_chunked() {
        let url = Url::parse("http://h/").unwrap();
        let request = Request::new(
            "POST",
            url,
            Headers::new(),
            Some(Content::file("/tmp/upload.bin")),
        )
        .unwrap();
        assert_eq!(request.headers.get("Transfer-Encoding"), Some("chunked"));
        assert!(!request.headers.contains_key("Content-Length"));
    }

    #[test]
    fn bodyless_post_gets_zero_content_length() {
        let url = Url::parse("http://h/").unwrap();
        for method in ["POST", "PUT", "PATCH"] {
            let request = Request::new(method, url.clone(), Headers::new(), None).unwrap();
            assert_eq!(request.headers.get("Content-Length"), Some("0"));
        }
        let get = Request::new("GET", url, Headers::new(), None).unwrap();
        assert!(!get.headers.contains_key("Content-Length"));
    }

    #[test]
    fn content_type_attached() {
        let url = Url::parse("http://h/").unwrap();
        let request = Request::new(
            "POST",
            url,
            Headers::new(),
            Some(Content::text("hi")),
        )
        .unwrap();
        assert_eq!(
            request.headers.get("Content-Type"),
            Some("text/plain; charset='utf-8'")
        );
        assert_eq!(request.headers.get("Content-Length"), Some("2"));
    }

    #[tokio::test]
    async fn read_caches_and_replaces_stream() {
        let url = Url::parse("http://h/").unwrap();
        let mut request = Request::new(
            "POST",
            url,
            Headers::new(),
            Some(Content::bytes(&b"abc"[..])),
        )
        .unwrap();
        assert_eq!(&request.read().await.unwrap()[..], b"abc");
        assert_eq!(&request.read().await.unwrap()[..], b"abc");
        assert_eq!(&request.stream.read_to_end().await.unwrap()[..], b"abc");
    }
}
