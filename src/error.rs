//! Error types for the server and its connection workers.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::http::parser::ParseError;

/// Fatal setup failures. No connection is ever served when one of these occurs.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Creating, binding or listening on the socket failed.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The async runtime could not be built.
    #[error("failed to build runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// Reasons a single connection ends without a clean exchange.
///
/// None of these affect the acceptor or other connections.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("peer closed the connection before the header block was complete")]
    PeerClosed,

    #[error("timed out waiting for request data")]
    Timeout,

    #[error("header block exceeds {0} bytes")]
    HeaderTooLarge(usize),

    #[error("malformed request: {0}")]
    Malformed(#[from] ParseError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("handler failed: {0:#}")]
    Handler(anyhow::Error),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
