//! Acceptor: the listening socket, the accept loop and worker dispatch.
//!
//! Each accepted connection gets its own task that reads the header block
//! without blocking anyone else. Once a request is parsed, the handler runs on
//! tokio's blocking pool with the socket switched to blocking mode, so
//! handlers are plain synchronous code that can stream with `std::io`.
//!
//! # Example
//!
//! ```no_run
//! use ember::{Request, Response, StatusCode};
//! use std::io::Write;
//!
//! fn hello(_req: &mut Request<'_>, res: &mut Response<'_>) -> anyhow::Result<()> {
//!     res.set_status(StatusCode::Ok).set_content_type("text/plain");
//!     writeln!(res, "hello")?;
//!     Ok(())
//! }
//!
//! std::process::exit(ember::start(8080, hello));
//! ```

pub mod listener;
pub mod shutdown;

use std::sync::Arc;

use crate::http::request::Request;
use crate::http::response::Response;

pub use listener::{start, Server, SHUTDOWN_GRACE};
pub use shutdown::{Shutdown, ShutdownToken};

/// The application callback, invoked once per parsed request.
pub type Handler =
    Arc<dyn Fn(&mut Request<'_>, &mut Response<'_>) -> anyhow::Result<()> + Send + Sync>;
