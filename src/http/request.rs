use std::collections::BTreeMap;
use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddrV4};

use bytes::{Buf, Bytes};

use crate::http::parser::RequestHead;

/// Query parameters in the order they appeared. Keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: Vec<(String, String)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).next()
    }

    /// Every value stored under `key`, oldest first.
    pub fn get_all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A parsed HTTP request handed to the application handler.
///
/// The request stays attached to its connection: [`Read`] returns the bytes
/// that follow the header block, such as a request body.
pub struct Request<'c> {
    /// Client address, `0.0.0.0:0` if unknown
    pub client: SocketAddrV4,
    /// Request method token (e.g. "GET"), as sent
    pub method: String,
    /// Decoded request path without the query string
    pub path: String,
    /// HTTP version token (typically "HTTP/1.1")
    pub version: String,
    /// Header fields, keys as received
    pub fields: BTreeMap<String, String>,
    /// Decoded query parameters
    pub parameters: Parameters,
    /// Bytes that arrived together with the header block
    pending: Bytes,
    channel: Box<dyn Read + 'c>,
}

impl<'c> Request<'c> {
    /// Binds a parsed head to the channel it came from.
    ///
    /// `pending` holds any bytes read past the header terminator; they are
    /// returned by [`Read`] before the channel is touched again.
    pub fn new(
        head: RequestHead,
        client: SocketAddrV4,
        pending: Bytes,
        channel: impl Read + 'c,
    ) -> Self {
        Self {
            client,
            method: head.method,
            path: head.path,
            version: head.version,
            fields: head.fields,
            parameters: head.parameters,
            pending,
            channel: Box::new(channel),
        }
    }

    /// Retrieves a header field by its name as received.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.as_str())
    }

    /// First query parameter named `key`.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key)
    }

    /// Retrieves the Content-Length header value and parses it as a usize.
    ///
    /// Returns 0 if the header is missing or not a valid number.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Reads a single byte, `None` once the peer has nothing more to send.
    pub fn get(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }
}

impl Read for Request<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.has_remaining() {
            let n = buf.len().min(self.pending.remaining());
            self.pending.copy_to_slice(&mut buf[..n]);
            return Ok(n);
        }
        self.channel.read(buf)
    }
}

impl std::fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("client", &self.client)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("version", &self.version)
            .field("fields", &self.fields)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

pub(crate) fn unknown_client() -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)
}
