//! Process-wide logging.
//!
//! Engine internals use `tracing` macros directly. [`Log`] is the line-oriented
//! facility for handlers: text accumulates in memory and is emitted as a single
//! event when the value is dropped, so concurrent workers interleave whole
//! lines only.
//!
//! ```ignore
//! Log::for_request(&req).append(&req.method).append(' ').append(&req.path);
//! ```

use std::fmt::{self, Display, Write};

use tracing_subscriber::EnvFilter;

use crate::http::request::Request;

/// Installs the stdout subscriber. Later calls are no-ops.
///
/// The level filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .try_init();
}

/// One log line, flushed on drop.
#[derive(Debug, Default)]
pub struct Log {
    line: String,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a line tagged with the client's address, e.g. `(10.0.0.7:51234) `.
    pub fn for_request(request: &Request<'_>) -> Self {
        Self {
            line: format!("({}) ", request.client),
        }
    }

    pub fn append(mut self, value: impl Display) -> Self {
        let _ = write!(self.line, "{value}");
        self
    }

    /// Text accumulated so far.
    pub fn as_str(&self) -> &str {
        &self.line
    }
}

impl Write for Log {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.line.push_str(s);
        Ok(())
    }
}

impl Drop for Log {
    fn drop(&mut self) {
        tracing::info!("{}", self.line);
    }
}
