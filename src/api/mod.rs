//! Violation-log and live-stream HTTP surface.
//!
//! A small hand-rolled loopback server: the process boundary only needs four
//! routes, and keeping it dependency-free matches the rest of the daemon.
//!
//! - `GET /health`: liveness probe
//! - `GET /logs?limit=N`: most recent evidence events, newest first
//! - `DELETE /logs/{id}`: idempotent removal of one event
//! - `GET /stream`: multipart MJPEG fed from the stream output
//!
//! `/stream` gets a dedicated thread per viewer (a viewer holds its
//! connection open indefinitely); everything else is handled serially on the
//! accept loop.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::evidence::{ViolationLog, DEFAULT_LOG_LIMIT};
use crate::stream::StreamOutput;

const MAX_REQUEST_BYTES: usize = 8192;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    /// Frame rate offered to MJPEG viewers.
    pub stream_fps: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8793".to_string(),
            stream_fps: 10,
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    log: Arc<ViolationLog>,
    stream: StreamOutput,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, log: Arc<ViolationLog>, stream: StreamOutput) -> Self {
        Self { cfg, log, stream }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, self, shutdown_thread) {
                log::error!("api server stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(listener: TcpListener, server: ApiServer, shutdown: Arc<AtomicBool>) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, &server, &shutdown) {
                    log::warn!("api request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(
    mut stream: TcpStream,
    server: &ApiServer,
    shutdown: &Arc<AtomicBool>,
) -> Result<()> {
    let request = read_request(&mut stream)?;

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        ("GET", "/logs") => {
            let limit = request
                .query
                .get("limit")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_LOG_LIMIT);
            let events = server.log.recent(limit);
            let payload = serde_json::to_vec(&events)?;
            write_response(&mut stream, 200, "application/json", &payload)
        }
        ("DELETE", path) if path.starts_with("/logs/") => {
            let id_part = &path["/logs/".len()..];
            let Ok(id) = id_part.parse::<u64>() else {
                write_json_response(&mut stream, 400, r#"{"error":"invalid_id"}"#)?;
                return Err(anyhow!("invalid log id '{}'", id_part));
            };
            server.log.delete(id);
            write_json_response(&mut stream, 200, r#"{"status":"deleted"}"#)
        }
        ("GET", "/stream") => {
            // A viewer occupies its connection until it disconnects; hand it
            // its own thread so the accept loop stays responsive.
            let output = server.stream.clone();
            let fps = server.cfg.stream_fps;
            let shutdown = shutdown.clone();
            std::thread::spawn(move || {
                if let Err(err) = stream_mjpeg(stream, output, fps, shutdown) {
                    log::debug!("mjpeg viewer disconnected: {}", err);
                }
            });
            Ok(())
        }
        ("GET", _) | ("DELETE", _) => {
            write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#)
        }
        _ => write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#),
    }
}

/// Serve multipart MJPEG until the viewer goes away or the server shuts down.
fn stream_mjpeg(
    mut stream: TcpStream,
    output: StreamOutput,
    fps: u32,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.write_all(
        b"HTTP/1.1 200 OK\r\n\
          Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
          Cache-Control: no-store\r\n\r\n",
    )?;

    let tick = Duration::from_millis((1000 / fps.max(1)) as u64);
    while !shutdown.load(Ordering::SeqCst) {
        let jpeg = output.next_jpeg()?;
        let header = format!(
            "--frame\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            jpeg.len()
        );
        stream.write_all(header.as_bytes())?;
        stream.write_all(&jpeg)?;
        stream.write_all(b"\r\n")?;
        std::thread::sleep(tick);
    }
    Ok(())
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8_lossy(&data);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;

    let (path, query_str) = match raw_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (raw_path, None),
    };
    let mut query = HashMap::new();
    if let Some(query_str) = query_str {
        for pair in query_str.split('&') {
            if let Some((k, v)) = pair.split_once('=') {
                query.insert(k.to_string(), v.to_string());
            }
        }
    }

    Ok(HttpRequest {
        method: method.to_string(),
        path: path.to_string(),
        query,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    query: HashMap<String, String>,
}
