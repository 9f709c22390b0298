//! HTTP protocol implementation.
//!
//! A deliberately small subset of HTTP/1.1: one request per connection, no
//! keep-alive, no chunked encoding. Every response carries
//! `Connection: Close`.
//!
//! # Architecture
//!
//! - **`connection`**: The per-connection worker implementing the state machine below
//! - **`parser`**: Parses a header block into a `RequestHead`
//! - **`request`**: The request handed to handlers, with raw access to the remaining input
//! - **`response`**: The streaming response and its header-once logic
//! - **`writer`**: Block buffering between the response and the socket
//! - **`codec`**: URL encoding, HTML escaping and path sanitization
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Read until CRLFCRLF (5 s per read, 8 KiB cap)
//!        └──────┬──────┘
//!               │ Header block parsed
//!               ▼
//!        ┌──────────────────┐
//!        │    Handling      │ ← Handler runs, response is finalized
//!        └──────┬───────────┘
//!               │
//!               ▼
//!        ┌──────────────────┐
//!        │     Closed       │
//!        └──────────────────┘
//! ```
//!
//! Any failure while reading or parsing goes straight to `Closed` without a
//! response.

pub mod codec;
pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
