use std::collections::BTreeMap;
use std::fmt::Display;
use std::io::{self, Write};

use crate::http::writer::ChannelWriter;

/// HTTP status codes with a known reason phrase.
///
/// Handlers are free to set any numeric code on [`Response::status_code`];
/// this enum only saves spelling out the common ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 204 No Content
    NoContent,
    /// 301 Moved Permanently
    MovedPermanently,
    /// 304 Not Modified
    NotModified,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
    /// 501 Not Implemented
    NotImplemented,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use ember::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::NoContent => 204,
            StatusCode::MovedPermanently => 301,
            StatusCode::NotModified => 304,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
            StatusCode::NotImplemented => 501,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use ember::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NoContent => "No Content",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
        }
    }
}

/// The response to one request, written straight to the connection.
///
/// The public fields make up the header. It goes out right before the first
/// body byte, or when the response is finished if nothing was written, so
/// they must be set before writing. Body writes are batched into blocks; see
/// [`BLOCK_SIZE`](crate::http::writer::BLOCK_SIZE).
///
/// Dropping a response finishes it. Call [`Response::finish`] to observe
/// write errors instead.
pub struct Response<'c> {
    /// HTTP version for the status line
    pub version: String,
    /// Numeric status code
    pub status_code: u16,
    /// Reason phrase for the status line
    pub status_message: String,
    /// Value of the Content-Type field
    pub content_type: String,
    /// Additional header fields, emitted in key order
    pub fields: BTreeMap<String, String>,
    writer: ChannelWriter<'c>,
    header_sent: bool,
    finished: bool,
}

impl<'c> Response<'c> {
    /// Creates a `501 Not Implemented` response with an
    /// `application/octet-stream` body, bound to `channel`.
    pub fn new(channel: impl Write + 'c) -> Self {
        Self {
            version: "HTTP/1.1".to_string(),
            status_code: StatusCode::NotImplemented.as_u16(),
            status_message: StatusCode::NotImplemented.reason_phrase().to_string(),
            content_type: "application/octet-stream".to_string(),
            fields: BTreeMap::new(),
            writer: ChannelWriter::new(channel),
            header_sent: false,
            finished: false,
        }
    }

    /// Sets status code and reason phrase together.
    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status_code = status.as_u16();
        self.status_message = status.reason_phrase().to_string();
        self
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.content_type = content_type.into();
        self
    }

    /// Adds or replaces a header field.
    pub fn header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn header_sent(&self) -> bool {
        self.header_sent
    }

    /// Writes a single byte of body.
    pub fn put(&mut self, byte: u8) -> io::Result<()> {
        self.write_all(&[byte])
    }

    /// Writes the textual form of `value` as body.
    pub fn append(&mut self, value: impl Display) -> io::Result<()> {
        self.write_all(value.to_string().as_bytes())
    }

    /// Sends the header if it has not gone out yet, then flushes the buffer.
    pub fn finish(mut self) -> io::Result<()> {
        self.finalize()
    }

    fn finalize(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.send_header()?;
        self.writer.flush()
    }

    fn send_header(&mut self) -> io::Result<()> {
        if self.header_sent {
            return Ok(());
        }
        self.header_sent = true;
        let head = serialize_head(self);
        self.writer.write(&head)
    }
}

/// Status line, fixed fields, user fields and the blank line.
fn serialize_head(resp: &Response<'_>) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        resp.version,
        resp.status_code,
        resp.status_message
    );
    buf.extend_from_slice(status_line.as_bytes());

    buf.extend_from_slice(b"Content-Type: ");
    buf.extend_from_slice(resp.content_type.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(b"Connection: Close\r\n");

    // Headers
    for (k, v) in &resp.fields {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

impl Write for Response<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send_header()?;
        self.writer.write(buf)?;
        Ok(buf.len())
    }

    /// Pushes buffered body bytes to the channel. Does not send the header.
    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for Response<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            tracing::debug!(error = %e, "failed to finish response");
        }
    }
}

impl std::fmt::Debug for Response<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("version", &self.version)
            .field("status_code", &self.status_code)
            .field("status_message", &self.status_message)
            .field("content_type", &self.content_type)
            .field("fields", &self.fields)
            .field("header_sent", &self.header_sent)
            .field("buffered", &self.writer.buffered())
            .finish()
    }
}
