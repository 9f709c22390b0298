//! End-to-end tests over loopback sockets.

use ember::{sanitize_path, start, Request, Response, Server, ServerError, Shutdown, StatusCode};
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

struct TestServer {
    addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    async fn spawn<F>(handler: F) -> Self
    where
        F: Fn(&mut Request<'_>, &mut Response<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let server = Server::bind_addr("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(server.run(handler, shutdown.token()));

        Self { addr, shutdown, task }
    }

    async fn stop(self) {
        self.shutdown.trigger();
        timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not shut down")
            .unwrap()
            .unwrap();
    }
}

fn echo(req: &mut Request<'_>, res: &mut Response<'_>) -> anyhow::Result<()> {
    res.set_status(StatusCode::Ok).set_content_type("text/plain");
    writeln!(res, "{} {} {}", req.method, req.path, req.version)?;
    for (key, value) in req.parameters.iter() {
        writeln!(res, "param {key}={value}")?;
    }
    for (key, value) in &req.fields {
        writeln!(res, "field {key}={value}")?;
    }
    Ok(())
}

async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();

    let mut out = Vec::new();
    timeout(Duration::from_secs(10), stream.read_to_end(&mut out))
        .await
        .expect("response timed out")
        .unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_serves_one_request_and_closes() {
    let server = TestServer::spawn(echo).await;

    let response = exchange(
        server.addr,
        b"GET /hello%20there?a=1&a=2&b HTTP/1.1\r\nHost: test\r\nX-Trace:\t abc\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: text/plain\r\n"));
    assert!(response.contains("Connection: Close\r\n"));

    let body = response.split("\r\n\r\n").nth(1).unwrap();
    assert_eq!(
        body,
        "GET /hello there HTTP/1.1\n\
         param a=1\n\
         param a=2\n\
         param b=\n\
         field Host=test\n\
         field X-Trace=abc\n"
    );

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_silent_handler_sends_default_header_only() {
    let server = TestServer::spawn(|_req, _res| Ok(())).await;

    let response = exchange(server.addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert_eq!(
        response,
        "HTTP/1.1 501 Not Implemented\r\nContent-Type: application/octet-stream\r\nConnection: Close\r\n\r\n"
    );

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handler_reads_request_body() {
    let server = TestServer::spawn(|req, res| {
        let mut body = vec![0u8; req.content_length()];
        req.read_exact(&mut body)?;
        res.set_status(StatusCode::Ok);
        res.write_all(&body.to_ascii_uppercase())?;
        Ok(())
    })
    .await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"POST /up HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    stream.write_all(b" world").await.unwrap();

    let mut out = Vec::new();
    timeout(Duration::from_secs(10), stream.read_to_end(&mut out))
        .await
        .unwrap()
        .unwrap();
    assert!(String::from_utf8_lossy(&out).ends_with("\r\n\r\nHELLO WORLD"));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_request_gets_no_response() {
    let server = TestServer::spawn(echo).await;

    assert_eq!(exchange(server.addr, b"GARBAGE\r\n\r\n").await, "");
    assert_eq!(exchange(server.addr, b"GET / HTTP/1.1\r\nNoColon\r\n\r\n").await, "");

    // The acceptor keeps serving afterwards.
    let ok = exchange(server.addr, b"GET /still-up HTTP/1.1\r\n\r\n").await;
    assert!(ok.starts_with("HTTP/1.1 200 OK"));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_oversized_header_block_is_dropped() {
    let server = TestServer::spawn(echo).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let mut raw = b"GET / HTTP/1.1\r\nX-Fill: ".to_vec();
    raw.extend(std::iter::repeat_n(b'a', 10_000));
    // The server may reset the connection before everything is written.
    let _ = stream.write_all(&raw).await;

    let mut out = Vec::new();
    let _ = timeout(Duration::from_secs(10), stream.read_to_end(&mut out))
        .await
        .expect("connection was not closed");
    assert!(out.is_empty());

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stalled_connection_does_not_block_others() {
    let server = TestServer::spawn(echo).await;

    // Never sends the terminator.
    let mut stalled = TcpStream::connect(server.addr).await.unwrap();
    stalled.write_all(b"GET /slow HTTP/1.1\r\nHost: x\r\n").await.unwrap();

    let response = timeout(
        Duration::from_secs(2),
        exchange(server.addr, b"GET /fast HTTP/1.1\r\n\r\n"),
    )
    .await
    .expect("second connection was blocked by the first");
    assert!(response.contains("GET /fast HTTP/1.1"));

    drop(stalled);
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_silent_peer_times_out() {
    let server = TestServer::spawn(echo).await;

    let mut idle = TcpStream::connect(server.addr).await.unwrap();
    let mut out = Vec::new();
    let read = timeout(Duration::from_secs(10), idle.read_to_end(&mut out))
        .await
        .expect("idle connection was not closed by the read timeout");
    assert!(read.is_err() || out.is_empty());

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_handler_still_finalizes_response() {
    let server = TestServer::spawn(|_req, res| {
        res.set_status(StatusCode::InternalServerError);
        anyhow::bail!("boom")
    })
    .await;

    let response = exchange(server.addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_handler_only_affects_its_connection() {
    let server = TestServer::spawn(|req, res| {
        if req.path == "/panic" {
            panic!("handler bug");
        }
        res.set_status(StatusCode::Ok);
        Ok(())
    })
    .await;

    let _ = exchange(server.addr, b"GET /panic HTTP/1.1\r\n\r\n").await;
    let response = exchange(server.addr, b"GET /fine HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK"));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_lets_in_flight_requests_finish() {
    let server = TestServer::spawn(|_req, res| {
        std::thread::sleep(Duration::from_millis(300));
        res.set_status(StatusCode::Ok);
        res.append("done")?;
        Ok(())
    })
    .await;
    let addr = server.addr;

    let client = tokio::spawn(async move { exchange(addr, b"GET / HTTP/1.1\r\n\r\n").await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    server.stop().await;

    let response = client.await.unwrap();
    assert!(response.ends_with("\r\n\r\ndone"));

    // The listening socket is gone.
    assert!(TcpStream::connect(addr).await.is_err());
}

fn flood(_req: &mut Request<'_>, res: &mut Response<'_>) -> anyhow::Result<()> {
    res.set_status(StatusCode::Ok);
    let chunk = vec![b'x'; 1 << 20];
    for _ in 0..200 {
        res.write_all(&chunk)?;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_gives_up_on_stuck_writer_after_grace() {
    let server = Server::bind_addr("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap()
        .with_shutdown_grace(Duration::from_millis(500));
    let addr = server.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.run(flood, shutdown.token()));

    // Sends a request, then never reads the response.
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET /big HTTP/1.1\r\n\r\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    shutdown.trigger();
    timeout(Duration::from_secs(3), task)
        .await
        .expect("run did not return after the grace period")
        .unwrap()
        .unwrap();

    drop(client);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_writes_to_a_stalled_reader_time_out() {
    let (tx, rx) = std::sync::mpsc::channel();
    let server = TestServer::spawn(move |req, res| {
        let outcome = flood(req, res);
        let _ = tx.send(outcome.is_err());
        Ok(())
    })
    .await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client.write_all(b"GET /big HTTP/1.1\r\n\r\n").await.unwrap();

    let failed = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(20)))
        .await
        .unwrap()
        .expect("handler was still writing after the write timeout");
    assert!(failed);

    drop(client);
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_path_traversal_is_sanitized_by_handlers() {
    let server = TestServer::spawn(|req, res| {
        res.set_status(StatusCode::Ok);
        res.append(sanitize_path(&req.path))?;
        Ok(())
    })
    .await;

    let response = exchange(server.addr, b"GET /static/%2e%2e/%2e%2e/etc/passwd HTTP/1.1\r\n\r\n").await;
    assert!(response.ends_with("\r\n\r\n/etc/passwd"));

    server.stop().await;
}

#[test]
fn test_start_fails_when_port_is_taken() {
    let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    assert_ne!(start(port, |_req, _res| Ok(())), 0);
}

#[test]
fn test_blocking_client_against_running_server() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(TestServer::spawn(echo));

    let mut stream = std::net::TcpStream::connect(server.addr).unwrap();
    stream.write_all(b"HEAD /x HTTP/1.0\r\n\r\n").unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).unwrap();
    assert!(out.contains("HEAD /x HTTP/1.0"));

    runtime.block_on(server.stop());
}
