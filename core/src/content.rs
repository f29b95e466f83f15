/*
 * content.rs
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

//! Request and response content: each constructor pairs a Content-Type with
//! a body stream. Sized content frames as Content-Length; unsized content
//! (files, multipart) frames as Transfer-Encoding: chunked.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::streams::{random_boundary, BodyStream, FileStream, MultiPartStream};
use crate::urlencode::{urldecode, urlencode};

fn content_type_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let ct = match ext.as_str() {
        "json" => "application/json",
        "js" => "application/javascript",
        "html" => "text/html",
        "css" => "text/css",
        "png" => "image/png",
        "jpeg" | "jpg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    };
    if ct.starts_with("text/") {
        format!("{}; charset='utf-8'", ct)
    } else {
        ct.to_string()
    }
}

/// HTML form data as an ordered multi-map, serialized as
/// `application/x-www-form-urlencoded`.
#[derive(Clone, Debug, Default)]
pub struct Form {
    items: Vec<(String, Vec<String>)>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` string.
    pub fn parse(encoded: &str) -> Self {
        let mut form = Self::new();
        for (key, value) in urldecode(encoded) {
            form.push(key, value);
        }
        form
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut form = Self::new();
        for (key, value) in pairs {
            form.push(key.into(), value.into());
        }
        form
    }

    fn push(&mut self, key: String, value: String) {
        match self.items.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.items.push((key, vec![value])),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v[0].as_str())
    }

    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(k, _)| k.as_str())
    }

    pub fn multi_items(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (k, values) in &self.items {
            for v in values {
                out.push((k.clone(), v.clone()));
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn copy_set(&self, key: &str, value: &str) -> Form {
        let mut new = self.clone();
        match new.items.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => *values = vec![value.to_string()],
            None => new.items.push((key.to_string(), vec![value.to_string()])),
        }
        new
    }

    pub fn copy_append(&self, key: &str, value: &str) -> Form {
        let mut new = self.clone();
        new.push(key.to_string(), value.to_string());
        new
    }

    pub fn copy_remove(&self, key: &str) -> Form {
        let mut new = self.clone();
        new.items.retain(|(k, _)| k != key);
        new
    }
}

impl std::fmt::Display for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", urlencode(&self.multi_items()))
    }
}

impl PartialEq for Form {
    fn eq(&self, other: &Self) -> bool {
        let mut a = self.multi_items();
        let mut b = other.multi_items();
        a.sort();
        b.sort();
        a == b
    }
}

impl Eq for Form {}

/// Multipart form-data: form fields plus named file parts, with a generated
/// boundary.
#[derive(Clone, Debug)]
pub struct MultiPart {
    form: Vec<(String, String)>,
    files: Vec<(String, PathBuf)>,
    boundary: String,
}

impl MultiPart {
    pub fn new(form: Vec<(String, String)>, files: Vec<(String, PathBuf)>) -> Self {
        Self {
            form,
            files,
            boundary: random_boundary(),
        }
    }

    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }
}

/// Typed request/response content.
pub enum Content {
    Bytes(Bytes),
    Text(String),
    Html(String),
    Json(serde_json::Value),
    Form(Form),
    File(PathBuf),
    MultiPart(MultiPart),
    Stream(BodyStream),
}

impl Content {
    pub fn bytes(data: impl Into<Bytes>) -> Content {
        Content::Bytes(data.into())
    }

    pub fn text(text: impl Into<String>) -> Content {
        Content::Text(text.into())
    }

    pub fn html(text: impl Into<String>) -> Content {
        Content::Html(text.into())
    }

    /// JSON content, serialized compactly without ASCII escaping.
    pub fn json<T: Serialize>(value: &T) -> Result<Content> {
        let value = serde_json::to_value(value)
            .map_err(|e| Error::invalid(format!("Invalid JSON content: {}", e)))?;
        Ok(Content::Json(value))
    }

    pub fn form(form: Form) -> Content {
        Content::Form(form)
    }

    pub fn file(path: impl Into<PathBuf>) -> Content {
        Content::File(path.into())
    }

    pub fn multipart(multipart: MultiPart) -> Content {
        Content::MultiPart(multipart)
    }

    /// The Content-Type header value this content implies, if any.
    pub fn content_type(&self) -> Option<String> {
        match self {
            Content::Bytes(_) | Content::Stream(_) => None,
            Content::Text(_) => Some("text/plain; charset='utf-8'".to_string()),
            Content::Html(_) => Some("text/html; charset='utf-8'".to_string()),
            Content::Json(_) => Some("application/json".to_string()),
            Content::Form(_) => Some("application/x-www-form-urlencoded".to_string()),
            Content::File(path) => Some(content_type_for_path(path)),
            Content::MultiPart(mp) => {
                Some(format!("multipart/form-data; boundary={}", mp.boundary))
            }
        }
    }

    /// Encode into a body stream.
    pub fn into_stream(self) -> Result<BodyStream> {
        Ok(match self {
            Content::Bytes(data) => BodyStream::from_bytes(data),
            Content::Text(text) | Content::Html(text) => {
                BodyStream::from_bytes(text.into_bytes())
            }
            Content::Json(value) => {
                let data = serde_json::to_vec(&value)
                    .map_err(|e| Error::invalid(format!("Invalid JSON content: {}", e)))?;
                BodyStream::from_bytes(data)
            }
            Content::Form(form) => BodyStream::from_bytes(form.to_string().into_bytes()),
            Content::File(path) => BodyStream::File(FileStream::new(path)),
            Content::MultiPart(mp) => BodyStream::MultiPart(MultiPartStream::new(
                mp.form,
                mp.files,
                Some(mp.boundary),
            )),
            Content::Stream(stream) => stream,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn text_content_type_and_bytes() {
        let content = Content::text("Hello, world!");
        assert_eq!(
            content.content_type().as_deref(),
            Some("text/plain; charset='utf-8'")
        );
        let mut stream = content.into_stream().unwrap();
        assert_eq!(stream.size(), Some(13));
        assert_eq!(&stream.read_to_end().await.unwrap()[..], b"Hello, world!");
    }

    #[tokio::test]
    async fn json_is_compact() {
        let content = Content::json(&serde_json::json!({"a": 1, "b": [2, 3]})).unwrap();
        let mut stream = content.into_stream().unwrap();
        assert_eq!(
            &stream.read_to_end().await.unwrap()[..],
            br#"{"a":1,"b":[2,3]}"#
        );
    }

    #[tokio::test]
    async fn form_content_encodes() {
        let form = Form::from_pairs([("a", "1 2"), ("b", "3")]);
        let content = Content::form(form);
        assert_eq!(
            content.content_type().as_deref(),
            Some("application/x-www-form-urlencoded")
        );
        let mut stream = content.into_stream().unwrap();
        assert_eq!(&stream.read_to_end().await.unwrap()[..], b"a=1+2&b=3");
    }

    #[test]
    fn form_roundtrip_and_equality() {
        let form = Form::parse("a=1&a=2&b=3");
        assert_eq!(form.get_list("a"), vec!["1", "2"]);
        assert_eq!(Form::parse(&form.to_string()), form);
        assert_eq!(Form::parse("b=3&a=1&a=2"), form);
    }

    #[test]
    fn file_content_type_from_extension() {
        assert_eq!(
            Content::file("/tmp/x.json").content_type().as_deref(),
            Some("application/json")
        );
        assert_eq!(
            Content::file("/tmp/x.html").content_type().as_deref(),
            Some("text/html; charset='utf-8'")
        );
        assert_eq!(
            Content::file("/tmp/x.bin").content_type().as_deref(),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn multipart_content_type_carries_boundary() {
        let mp = MultiPart::new(vec![], vec![]).with_boundary("B0UND");
        assert_eq!(
            Content::multipart(mp).content_type().as_deref(),
            Some("multipart/form-data; boundary=B0UND")
        );
    }
}
