//! Ember - a minimal embeddable HTTP/1.1 server
//!
//! One synchronous callback per request, one request per connection.

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod server;

pub use error::{ConnectionError, ServerError};
pub use http::codec::{escape_html, sanitize_path, url_decode, url_decode_lossy, url_encode};
pub use http::request::{Parameters, Request};
pub use http::response::{Response, StatusCode};
pub use logging::Log;
pub use server::{start, Handler, Server, Shutdown, ShutdownToken};
