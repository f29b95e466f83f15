/*
 * headers.rs
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

//! HTTP headers: an ordered multi-map with case-insensitive lookup and
//! preserved original case for emission.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
        )
}

/// Validate a header name against the token grammar.
fn headername(name: &str) -> Result<String> {
    if name.is_empty() || !name.chars().all(is_token_char) {
        return Err(Error::invalid(format!("Invalid HTTP header name {:?}", name)));
    }
    Ok(name.to_string())
}

/// Trim and validate a header value: non-empty printable ASCII.
fn headervalue(value: &str) -> Result<String> {
    let value = value.trim_matches(' ');
    if value.is_empty() || !value.bytes().all(|b| (0x20..0x7f).contains(&b)) {
        return Err(Error::invalid(format!("Invalid HTTP header value {:?}", value)));
    }
    Ok(value.to_string())
}

/// An ordered header multi-map. Lookup and equality are case-insensitive;
/// emission preserves the original name case and ordering.
#[derive(Clone, Debug, Default)]
pub struct Headers {
    items: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from name/value pairs, validating each.
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut items = Vec::new();
        for (name, value) in pairs {
            items.push((headername(name.as_ref())?, headervalue(value.as_ref())?));
        }
        Ok(Self { items })
    }

    /// The first value whose name matches, case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.iter().any(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(_, v)| v.as_str())
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The pairs as owned strings, in emission order.
    pub fn to_vec(&self) -> Vec<(String, String)> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Set a header: all existing occurrences of the name are removed
    /// (case-insensitively) and the new pair is appended.
    pub fn copy_set(&self, key: &str, value: &str) -> Result<Headers> {
        let mut items: Vec<(String, String)> = self
            .items
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(key))
            .cloned()
            .collect();
        items.push((headername(key)?, headervalue(value)?));
        Ok(Headers { items })
    }

    /// Remove every occurrence of the name, case-insensitively.
    pub fn copy_remove(&self, key: &str) -> Headers {
        Headers {
            items: self
                .items
                .iter()
                .filter(|(k, _)| !k.eq_ignore_ascii_case(key))
                .cloned()
                .collect(),
        }
    }

    /// Merge in `update`: names present in `update` have all their existing
    /// occurrences removed before the new pairs are appended.
    pub fn copy_update(&self, update: &Headers) -> Headers {
        let mut items: Vec<(String, String)> = self
            .items
            .iter()
            .filter(|(k, _)| !update.contains_key(k))
            .cloned()
            .collect();
        items.extend(update.items.iter().cloned());
        Headers { items }
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.items {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

impl PartialEq for Headers {
    fn eq(&self, other: &Self) -> bool {
        let lower = |h: &Headers| {
            let mut v: Vec<(String, String)> = h
                .items
                .iter()
                .map(|(k, val)| (k.to_ascii_lowercase(), val.clone()))
                .collect();
            v.sort();
            v
        };
        lower(self) == lower(other)
    }
}

impl Eq for Headers {}

/// Parse a `type/subtype[; parameter=value]*` header (RFC 2616 §3.7), with
/// quoted and backslash-escaped parameter values. The media type and
/// parameter names are lowercased.
pub fn parse_opts_header(header: &str) -> (String, HashMap<String, String>) {
    let header = header.trim();
    let mut params = HashMap::new();

    let (media, mut rest) = match header.find(';') {
        Some(i) => (header[..i].trim().to_ascii_lowercase(), &header[i + 1..]),
        None => (header.trim().to_ascii_lowercase(), ""),
    };

    while !rest.is_empty() {
        let part = rest.trim_start_matches([' ', '\t']);
        let eq = match part.find('=') {
            Some(i) => i,
            None => break,
        };
        let key = part[..eq].trim().to_ascii_lowercase();
        let value_part = &part[eq + 1..];

        let (value, remainder) = if let Some(quoted) = value_part.strip_prefix('"') {
            let mut value = String::new();
            let mut chars = quoted.char_indices();
            let mut end = quoted.len();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        end = i + 1;
                        break;
                    }
                    _ => value.push(c),
                }
            }
            (value, &quoted[end.min(quoted.len())..])
        } else {
            match value_part.find(';') {
                Some(i) => (value_part[..i].trim().to_string(), &value_part[i..]),
                None => (value_part.trim().to_string(), ""),
            }
        };

        if !key.is_empty() {
            params.insert(key, value);
        }
        rest = match remainder.find(';') {
            Some(i) => &remainder[i + 1..],
            None => "",
        };
    }

    (media, params)
}
