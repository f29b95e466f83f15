/*
 * response.rs
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

//! HTTP response: status code, fixed reason-phrase table, headers, lazy
//! body with cached `read()` and charset-aware `text()`.

use bytes::Bytes;
use tokio::sync::OwnedSemaphorePermit;

use crate::content::Content;
use crate::error::Result;
use crate::headers::{parse_opts_header, Headers};
use crate::streams::{BodyStream, HttpBody};

/// The stdlib reason-phrase set, keyed by status code.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        103 => "Early Hints",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        208 => "Already Reported",
        226 => "IM Used",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Content Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a Teapot",
        421 => "Misdirected Request",
        422 => "Unprocessable Content",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        510 => "Not Extended",
        511 => "Network Authentication Required",
        _ => "",
    }
}

fn has_body(status_code: u16) -> bool {
    status_code >= 200 && status_code != 204 && status_code != 304
}

pub struct Response {
    pub status_code: u16,
    pub headers: Headers,
    pub stream: BodyStream,
    body: Option<Bytes>,
    text: Option<String>,
    /// Concurrency permit from the pool, released when the response closes.
    permit: Option<OwnedSemaphorePermit>,
}

impl Response {
    /// A bodyless response.
    pub fn new(status_code: u16) -> Response {
        Response {
            status_code,
            headers: Headers::new(),
            stream: BodyStream::empty(),
            body: None,
            text: None,
            permit: None,
        }
    }

    /// A response carrying content. Framing headers are attached the same
    /// way as for requests; interim, 204, and 304 responses carry no body,
    /// so any content is discarded for those codes.
    pub fn build(status_code: u16, headers: Headers, content: Option<Content>) -> Result<Response> {
        let mut headers = headers;
        let stream = match content {
            Some(content) if has_body(status_code) => {
                if let Some(content_type) = content.content_type() {
                    headers = headers.copy_set("Content-Type", &content_type)?;
                }
                let stream = content.into_stream()?;
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
            _ => BodyStream::empty(),
        };
        Ok(Response {
            status_code,
            headers,
            stream,
            body: None,
            text: None,
            permit: None,
        })
    }

    /// As `build` with no extra headers.
    pub fn with_content(status_code: u16, content: Content) -> Result<Response> {
        Response::build(status_code, Headers::new(), Some(content))
    }

    /// A received response with a lazy HTTP-framed body.
    pub(crate) fn from_parts(status_code: u16, headers: Headers, body: HttpBody) -> Response {
        Response {
            status_code,
            headers,
            stream: BodyStream::Http(body),
            body: None,
            text: None,
            permit: None,
        }
    }

    pub(crate) fn set_permit(&mut self, permit: OwnedSemaphorePermit) {
        self.permit = Some(permit);
    }

    /// The reason phrase for this status code, from the fixed table.
    pub fn reason_phrase(&self) -> &'static str {
        reason_phrase(self.status_code)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Read and cache the whole body. Idempotent.
    pub async fn read(&mut self) -> Result<Bytes> {
        if let Some(body) = &self.body {
            return Ok(body.clone());
        }
        let body = self.stream.read_to_end().await?;
        self.body = Some(body.clone());
        Ok(body)
    }

    /// The body decoded as text. The charset comes from the Content-Type
    /// header for `text/*` media types, defaulting to UTF-8.
    pub async fn text(&mut self) -> Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        let body = self.read().await?;
        let content_type = self.headers.get("Content-Type").unwrap_or("");
        let (media, params) = parse_opts_header(content_type);
        let charset = if media.starts_with("text/") {
            params
                .get("charset")
                .map(|c| c.trim_matches(|ch| ch == '\'' || ch == '"').to_ascii_lowercase())
                .unwrap_or_else(|| "utf-8".to_string())
        } else {
            "utf-8".to_string()
        };
        let text = decode_charset(&body, &charset);
        self.text = Some(text.clone());
        Ok(text)
    }

    /// Close the body stream, completing the connection cycle, and release
    /// the pool permit.
    pub async fn close(&mut self) {
        self.stream.close().await;
        self.permit = None;
    }
}

fn decode_charset(body: &[u8], charset: &str) -> String {
    match charset {
        "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => {
            body.iter().map(|&b| b as char).collect()
        }
        // utf-8, us-ascii, and anything unrecognized
        _ => String::from_utf8_lossy(body).into_owned(),
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Response [{} {}]>", self.status_code, self.reason_phrase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_phrases() {
        assert_eq!(reason_phrase(200), "OK");
        assert_eq!(reason_phrase(404), "Not Found");
        assert_eq!(reason_phrase(500), "Internal Server Error");
        assert_eq!(reason_phrase(599), "");
    }

    #[test]
    fn content_sets_framing_headers() {
        let response = Response::with_content(200, Content::text("Hello, world!")).unwrap();
        assert_eq!(
            response.headers.get("Content-Type"),
            Some("text/plain; charset='utf-8'")
        );
        assert_eq!(response.headers.get("Content-Length"), Some("13"));
    }

    #[test]
    fn no_body_codes_discard_content() {
        for code in [100, 204, 304] {
            let response = Response::with_content(code, Content::text("x")).unwrap();
            assert!(!response.headers.contains_key("Content-Length"));
            assert!(!response.headers.contains_key("Content-Type"));
        }
    }

    #[tokio::test]
    async fn read_is_idempotent() {
        let mut response = Response::with_content(200, Content::bytes(&b"abc"[..])).unwrap();
        assert_eq!(&response.read().await.unwrap()[..], b"abc");
        assert_eq!(&response.read().await.unwrap()[..], b"abc");
    }

    #[tokio::test]
    async fn text_honors_charset() {
        let headers =
            Headers::from_pairs([("Content-Type", "text/plain; charset=latin-1")]).unwrap();
        let mut response =
            Response::build(200, headers, Some(Content::bytes(vec![0xe9u8]))).unwrap();
        assert_eq!(response.text().await.unwrap(), "\u{e9}");
    }

    #[tokio::test]
    async fn text_defaults_to_utf8() {
        let mut response =
            Response::with_content(200, Content::bytes("héllo".as_bytes().to_vec())).unwrap();
        assert_eq!(response.text().await.unwrap(), "héllo");
    }

    #[tokio::test]
    async fn text_strips_quoted_charset() {
        let headers =
            Headers::from_pairs([("Content-Type", "text/plain; charset='utf-8'")]).unwrap();
        let mut response =
            Response::build(200, headers, Some(Content::bytes(&b"ok"[..]))).unwrap();
        assert_eq!(response.text().await.unwrap(), "ok");
    }
}
