/*
 * urlencode.rs
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

//! Percent-encoding helpers: `quote`/`unquote` over the RFC 3986 unreserved
//! set, and form-style `urlencode`/`urldecode` with `+` for space.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Encode everything outside the RFC 3986 unreserved set (§2.3).
const QUOTE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// As QUOTE, but `+` passes through (form values have spaces pre-replaced).
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'+');

/// Percent-encode any character outside the RFC 3986 unreserved set.
pub fn quote(s: &str) -> String {
    utf8_percent_encode(s, QUOTE).to_string()
}

/// Decode `%XX` sequences as UTF-8.
pub fn unquote(s: &str) -> String {
    if !s.contains('%') {
        return s.to_string();
    }
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Serialize key/value pairs as a query or form string. Spaces encode as `+`.
pub fn urlencode(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| {
            let k = k.replace(' ', "+");
            let v = v.replace(' ', "+");
            format!(
                "{}={}",
                utf8_percent_encode(&k, FORM),
                utf8_percent_encode(&v, FORM)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Parse a query or form string into ordered key/value pairs.
/// `+` decodes to space; empty `&`-separated parts are skipped.
pub fn urldecode(s: &str) -> Vec<(String, String)> {
    s.split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (key, value) = match part.split_once('=') {
                Some((k, v)) => (k, v),
                None => (part, ""),
            };
            (
                unquote(key).replace('+', " "),
                unquote(value).replace('+', " "),
            )
        })
        .collect()
}

fn is_component_byte(b: u8, extra: &[u8]) -> bool {
    // pchar: unreserved / sub-delims / ":" / "@"
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'-' | b'.' | b'_' | b'~'
                | b'!' | b'$' | b'&' | b'\'' | b'(' | b')'
                | b'*' | b'+' | b',' | b';' | b'='
                | b':' | b'@'
        )
        || extra.contains(&b)
}

/// Percent-encode bytes that are invalid in a URL component, leaving existing
/// `%XX` escapes (and `%` itself) untouched.
pub fn encode_component(s: &str, extra: &[u8]) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if b == b'%' || is_component_byte(b, extra) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Whether the raw component contains only valid component bytes
/// (plus `%` escapes).
pub fn is_valid_component(s: &str, extra: &[u8]) -> bool {
    s.bytes().all(|b| b == b'%' || is_component_byte(b, extra))
}
