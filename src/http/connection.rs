use std::net::{Shutdown, SocketAddr, SocketAddrV4};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::ConnectionError;
use crate::http::parser::{find_headers_end, parse_request_head, RequestHead};
use crate::http::request::{unknown_client, Request};
use crate::http::response::Response;
use crate::server::Handler;

/// Per-read timeout while waiting for the header block.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest header block accepted, terminator included.
pub const MAX_HEAD_SIZE: usize = 8192;

/// Socket write timeout while the handler streams its response.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves exactly one request on `stream`, or drops the connection.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(MAX_HEAD_SIZE),
        }
    }

    /// Reading, then Handling. Any error closes the connection unanswered.
    pub async fn run(mut self, handler: Handler) -> Result<(), ConnectionError> {
        self.read_head().await?;
        let (head, consumed) = parse_request_head(&self.buffer)?;
        self.respond(head, consumed, handler).await
    }

    /// Reads until the buffer holds a complete header block.
    async fn read_head(&mut self) -> Result<(), ConnectionError> {
        let mut temp = [0u8; 1024];

        loop {
            if find_headers_end(&self.buffer).is_some() {
                return Ok(());
            }

            let room = MAX_HEAD_SIZE - self.buffer.len();
            if room == 0 {
                return Err(ConnectionError::HeaderTooLarge(MAX_HEAD_SIZE));
            }

            let want = room.min(temp.len());
            let n = timeout(READ_TIMEOUT, self.stream.read(&mut temp[..want]))
                .await
                .map_err(|_| ConnectionError::Timeout)??;

            if n == 0 {
                return Err(ConnectionError::PeerClosed);
            }

            self.buffer.extend_from_slice(&temp[..n]);
        }
    }

    /// Runs the handler on the blocking pool and closes the connection.
    async fn respond(
        mut self,
        head: RequestHead,
        consumed: usize,
        handler: Handler,
    ) -> Result<(), ConnectionError> {
        let pending = self.buffer.split_off(consumed).freeze();
        let client = client_v4(self.peer);

        let stream = self.stream.into_std()?;
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

        tokio::task::spawn_blocking(move || {
            let request = Request::new(head, client, pending, &stream);
            let response = Response::new(&stream);
            let outcome = exchange(request, response, &handler);
            let _ = stream.shutdown(Shutdown::Both);
            outcome
        })
        .await?
    }
}

fn exchange(
    mut request: Request<'_>,
    mut response: Response<'_>,
    handler: &Handler,
) -> Result<(), ConnectionError> {
    let handled = handler(&mut request, &mut response);
    let finished = response.finish();

    handled.map_err(ConnectionError::Handler)?;
    finished?;
    Ok(())
}

/// IPv4 view of the peer address; IPv6 peers map to `0.0.0.0:0` unless
/// they are IPv4-mapped.
pub fn client_v4(peer: SocketAddr) -> SocketAddrV4 {
    match peer {
        SocketAddr::V4(addr) => addr,
        SocketAddr::V6(addr) => addr
            .ip()
            .to_ipv4_mapped()
            .map(|ip| SocketAddrV4::new(ip, addr.port()))
            .unwrap_or_else(unknown_client),
    }
}
