/*
 * client.rs
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

//! High-level client: a base URL, default headers, and a pooled transport,
//! plus one-shot convenience functions.

use crate::content::Content;
use crate::error::Result;
use crate::headers::Headers;
use crate::pool::ConnectionPool;
use crate::request::Request;
use crate::response::Response;
use crate::url::Url;

fn default_headers() -> Headers {
    let user_agent = concat!("corriere/", env!("CARGO_PKG_VERSION"));
    Headers::from_pairs([("User-Agent", user_agent)]).unwrap_or_default()
}

pub struct Client {
    base_url: Option<Url>,
    headers: Headers,
    pool: ConnectionPool,
}

impl Client {
    pub fn new() -> Client {
        Client {
            base_url: None,
            headers: default_headers(),
            pool: ConnectionPool::new(),
        }
    }

    /// Resolve request URLs against this base.
    pub fn with_base_url(mut self, url: Url) -> Client {
        self.base_url = Some(url);
        self
    }

    /// Headers sent with every request. Per-request headers override these
    /// case-insensitively.
    pub fn with_headers(mut self, headers: Headers) -> Client {
        self.headers = headers;
        self
    }

    pub fn with_pool(mut self, pool: ConnectionPool) -> Client {
        self.pool = pool;
        self
    }

    pub fn build_request(
        &self,
        method: &str,
        url: &str,
        headers: Headers,
        content: Option<Content>,
    ) -> Result<Request> {
        let url = match &self.base_url {
            Some(base) => base.join_str(url)?,
            None => Url::parse(url)?,
        };
        Request::new(method, url, self.headers.copy_update(&headers), content)
    }

    /// Send a request and read the response fully.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        headers: Headers,
        content: Option<Content>,
    ) -> Result<Response> {
        let request = self.build_request(method, url, headers, content)?;
        let mut response = self.pool.send(request).await?;
        let read_result = response.read().await;
        response.close().await;
        read_result?;
        Ok(response)
    }

    /// Send a request, returning the response with its body unread. The
    /// caller must close the response to return the connection to the pool.
    pub async fn stream(
        &self,
        method: &str,
        url: &str,
        headers: Headers,
        content: Option<Content>,
    ) -> Result<Response> {
        let request = self.build_request(method, url, headers, content)?;
        self.pool.send(request).await
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request("GET", url, Headers::new(), None).await
    }

    pub async fn post(&self, url: &str, content: Content) -> Result<Response> {
        self.request("POST", url, Headers::new(), Some(content)).await
    }

    pub async fn put(&self, url: &str, content: Content) -> Result<Response> {
        self.request("PUT", url, Headers::new(), Some(content)).await
    }

    pub async fn patch(&self, url: &str, content: Content) -> Result<Response> {
        self.request("PATCH", url, Headers::new(), Some(content)).await
    }

    pub async fn delete(&self, url: &str) -> Result<Response> {
        self.request("DELETE", url, Headers::new(), None).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot GET with a throwaway client.
pub async fn get(url: &str) -> Result<Response> {
    let client = Client::new();
    let result = client.get(url).await;
    client.close().await;
    result
}

/// One-shot POST.
pub async fn post(url: &str, content: Content) -> Result<Response> {
    let client = Client::new();
    let result = client.post(url, content).await;
    client.close().await;
    result
}

/// One-shot PUT.
pub async fn put(url: &str, content: Content) -> Result<Response> {
    let client = Client::new();
    let result = client.put(url, content).await;
    client.close().await;
    result
}

/// One-shot PATCH.
pub async fn patch(url: &str, content: Content) -> Result<Response> {
    let client = Client::new();
    let result = client.patch(url, content).await;
    client.close().await;
    result
}

/// One-shot DELETE.
pub async fn delete(url: &str) -> Result<Response> {
    let client = Client::new();
    let result = client.delete(url).await;
    client.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_request_joins_base_and_merges_headers() {
        let client = Client::new()
            .with_base_url(Url::parse("http://api.example/v1/").unwrap())
            .with_headers(Headers::from_pairs([("User-Agent", "custom/1.0")]).unwrap());
        let request = client
            .build_request(
                "GET",
                "items?page=2",
                Headers::from_pairs([("Accept", "application/json")]).unwrap(),
                None,
            )
            .unwrap();
        assert_eq!(request.url.to_string(), "http://api.example/v1/items?page=2");
        assert_eq!(request.headers.get("User-Agent"), Some("custom/1.0"));
        assert_eq!(request.headers.get("Accept"), Some("application/json"));
        assert_eq!(request.headers.get("Host"), Some("api.example"));
        client.close().await;
    }

    #[tokio::test]
    async fn per_request_headers_override_defaults() {
        let client = Client::new();
        let request = client
            .build_request(
                "GET",
                "http://h/",
                Headers::from_pairs([("user-agent", "override")]).unwrap(),
                None,
            )
            .unwrap();
        assert_eq!(request.headers.get("User-Agent"), Some("override"));
        client.close().await;
    }
}
