/*
 * error.rs
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

//! Library errors: protocol faults, constructor misuse, deadlines, I/O.

use std::fmt;
use std::io;

/// Errors from the HTTP framer, the connection layer, or public constructors.
#[derive(Debug)]
pub enum Error {
    /// HTTP/1.1 protocol violation: wrong state for an operation, malformed
    /// or overlong field, framing overflow/underflow, missing required
    /// header, stream closed before an expected marker.
    Protocol(String),
    /// Misuse of a public constructor: bad header name or value, invalid
    /// URL component, unsupported scheme.
    Invalid(String),
    /// A scoped deadline expired before the operation finished.
    Timeout,
    /// Network-level failure, surfaced verbatim from the backend.
    Io(io::Error),
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Protocol(m) => write!(f, "{}", m),
            Error::Invalid(m) => write!(f, "{}", m),
            Error::Timeout => write!(f, "operation timed out"),
            Error::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
