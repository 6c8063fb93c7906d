//! HTTP exposition of a RED handle
//!
//! Serves the wire text format so `redstat` (or curl) can poll a process:
//!
//! ```text
//! GET /            -> 200 "<requests>, <errors>, <seconds>"
//! GET /metrics     -> same as /
//! GET /metrics.json -> 200 {"requests":..,"errors":..,"duration":<nanos>}
//! anything else    -> 404 / 405
//! ```
//!
//! Each response is computed with `now()`, so the duration is the time since
//! the aggregator was last reset.

use std::io;
use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

use crate::config::ExpositionConfig;
use crate::red::{Red, Snapshot};

const MAX_REQUEST_HEAD: usize = 8192;

pub async fn bind(config: &ExpositionConfig) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("RED exposition listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept connections forever, answering each from a clone of `red`.
pub async fn serve(listener: TcpListener, red: Red) -> io::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let red = red.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, red, peer_addr).await {
                        error!("Connection error from {}: {}", peer_addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Accept error: {}", e);
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    red: Red,
    peer_addr: SocketAddr,
) -> io::Result<()> {
    let mut buffer = BytesMut::with_capacity(1024);
    let mut read_buf = [0u8; 1024];

    while !head_complete(&buffer) {
        let n = stream.read(&mut read_buf).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&read_buf[..n]);
        if buffer.len() > MAX_REQUEST_HEAD {
            let status = "431 Request Header Fields Too Large";
            return write_response(&mut stream, status, "text/plain", "").await;
        }
    }

    let head = String::from_utf8_lossy(&buffer);
    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    let method = parts.next().unwrap_or_default();
    let path = parts.next().unwrap_or_default();
    debug!("{} {} from {}", method, path, peer_addr);

    match (method, path) {
        ("GET", "/" | "/metrics") => {
            let snapshot = current(red).await?;
            write_response(&mut stream, "200 OK", "text/plain", &snapshot.wire_line()).await
        }
        ("GET", "/metrics.json") => {
            let snapshot = current(red).await?;
            let body = serde_json::to_string(&snapshot).map_err(io::Error::other)?;
            write_response(&mut stream, "200 OK", "application/json", &body).await
        }
        ("GET", _) => {
            write_response(&mut stream, "404 Not Found", "text/plain", "not found\n").await
        }
        _ => {
            let status = "405 Method Not Allowed";
            write_response(&mut stream, status, "text/plain", "method not allowed\n").await
        }
    }
}

/// Handle calls block on the worker, so keep them off the async threads
async fn current(mut red: Red) -> io::Result<Snapshot> {
    tokio::task::spawn_blocking(move || red.now())
        .await
        .map_err(io::Error::other)
}

fn head_complete(buffer: &[u8]) -> bool {
    buffer.windows(4).any(|w| w == b"\r\n\r\n")
}

async fn write_response(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &str,
) -> io::Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AggregatorConfig;
    use crate::red::{Aggregator, Field};

    async fn get(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn serving(red: Red) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, red));
        addr
    }

    #[test]
    fn test_head_complete() {
        assert!(!head_complete(b"GET / HTTP/1.1\r\n"));
        assert!(head_complete(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_serves_text() {
        let aggregator = Aggregator::spawn(AggregatorConfig::default()).unwrap();
        let mut red = aggregator.start_acknowledged();
        red.add(Field::Requests, 4).unwrap();
        red.add(Field::Errors, 1).unwrap();

        let addr = serving(red).await;
        let response = get(addr, "GET /metrics HTTP/1.1\r\nHost: test\r\n\r\n").await;

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        assert!(body.starts_with("4, 1, "), "body was {:?}", body);
        assert!(!body.ends_with('s'), "body was {:?}", body);

        let served: Snapshot = body.parse().unwrap();
        assert_eq!((served.requests, served.errors), (4, 1));
    }

    #[tokio::test]
    async fn test_serves_json() {
        let aggregator = Aggregator::spawn(AggregatorConfig::default()).unwrap();
        let mut red = aggregator.start_acknowledged();
        red.add(Field::Requests, 2).unwrap();

        let addr = serving(red).await;
        let response = get(addr, "GET /metrics.json HTTP/1.1\r\n\r\n").await;

        let body = response.split("\r\n\r\n").nth(1).unwrap();
        let value: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(value["requests"], 2);
        assert_eq!(value["errors"], 0);
        assert!(value["duration"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_unknown_path_and_method() {
        let aggregator = Aggregator::spawn(AggregatorConfig::default()).unwrap();
        let addr = serving(aggregator.start()).await;

        let response = get(addr, "GET /nope HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found"));

        let response = get(addr, "POST / HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed"));
    }
}
