use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{ConnectionError, ServerError};
use crate::http::connection::Connection;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::server::shutdown::{Shutdown, ShutdownToken};
use crate::server::Handler;

/// How long a shutdown waits for in-flight connections by default.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// A bound listening socket, owned for one serve/shutdown cycle.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    grace: Duration,
}

impl Server {
    /// Listens on `0.0.0.0:port`.
    pub async fn bind(port: u16) -> Result<Self, ServerError> {
        Self::bind_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
    }

    pub async fn bind_addr(addr: SocketAddr) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(address = %local_addr, "Listening");

        Ok(Self {
            listener,
            grace: SHUTDOWN_GRACE,
        })
    }

    /// Caps how long [`run`](Self::run) waits for in-flight connections
    /// after shutdown. Workers still running past it are abandoned.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` fires, then waits up to the
    /// shutdown grace period for in-flight workers to finish.
    pub async fn run<F>(self, handler: F, mut shutdown: ShutdownToken) -> Result<(), ServerError>
    where
        F: Fn(&mut Request<'_>, &mut Response<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        // Every worker holds a sender; recv() yields None once all are gone.
        let (workers, mut drained) = mpsc::channel::<()>(1);

        loop {
            let accepted = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "Accepted connection");
                    dispatch(stream, peer, Arc::clone(&handler), workers.clone()).await;
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                }
            }
        }

        info!("Shutdown signal received, no longer accepting connections");
        drop(self.listener);
        drop(workers);
        match timeout(self.grace, drained.recv()).await {
            Ok(_) => info!("All connections finished"),
            Err(_) => warn!(
                grace = ?self.grace,
                "Grace period expired, abandoning in-flight connections"
            ),
        }

        Ok(())
    }
}

/// Two-stage spawn: the acceptor joins a short-lived task whose only job is
/// to spawn the detached worker, so it waits for the spawn and nothing more.
async fn dispatch(stream: TcpStream, peer: SocketAddr, handler: Handler, guard: mpsc::Sender<()>) {
    let stage_one = tokio::spawn(async move {
        tokio::spawn(async move {
            let _guard = guard;
            match Connection::new(stream, peer).run(handler).await {
                Ok(()) => {}
                Err(ConnectionError::Handler(e)) => {
                    warn!(peer = %peer, error = %format!("{e:#}"), "Handler failed");
                }
                Err(ConnectionError::Worker(e)) => {
                    error!(peer = %peer, error = %e, "Connection worker panicked");
                }
                Err(e) => {
                    debug!(peer = %peer, error = %e, "Connection abandoned");
                }
            }
        });
    });

    if let Err(e) = stage_one.await {
        error!(peer = %peer, error = %e, "Failed to dispatch connection worker");
    }
}

/// Serves on `0.0.0.0:port` until Ctrl-C.
///
/// Blocks the calling thread. The first Ctrl-C stops accepting and drains
/// in-flight connections for up to [`SHUTDOWN_GRACE`]; a second one exits
/// without waiting. Returns 0 after a drained shutdown and 1 if the runtime
/// or listening socket could not be set up, or if the drain was interrupted.
/// Must not be called from inside a tokio runtime.
pub fn start<F>(port: u16, handler: F) -> i32
where
    F: Fn(&mut Request<'_>, &mut Response<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %ServerError::Runtime(e), "Server setup failed");
            return 1;
        }
    };

    let code = runtime.block_on(async move {
        let server = match Server::bind(port).await {
            Ok(server) => server,
            Err(e) => {
                error!(error = %e, "Server setup failed");
                return 1;
            }
        };

        let shutdown = Shutdown::new();
        let token = shutdown.token();
        let (force_tx, force_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                // No signal handling; keep the owner alive so nothing cancels.
                std::future::pending::<()>().await;
            }
            shutdown.trigger();

            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = force_tx.send(());
            }
            std::future::pending::<()>().await;
        });

        tokio::select! {
            result = server.run(handler, token) => match result {
                Ok(()) => 0,
                Err(e) => {
                    error!(error = %e, "Server failed");
                    1
                }
            },
            Ok(()) = force_rx => {
                warn!("Interrupted again, exiting without waiting for connections");
                1
            }
        }
    });

    // Blocking workers that outlived the drain must not hold the process.
    runtime.shutdown_timeout(Duration::from_millis(100));
    code
}
