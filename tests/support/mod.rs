//! A minimal hand rolled HTTP/1.1 responder standing in for a real agent
//! in end-to-end tests, so the suite has no external dependencies. One
//! TCP connection per request (`Connection: close`), which is all
//! `reqwest` needs.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub type CallLog = Arc<Mutex<Vec<String>>>;

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Spawns a background task serving `handler(method, path, body, &log)`.
/// Returns the endpoint base URL and a shared log the handler can push
/// onto to let a test assert call ordering.
pub async fn spawn_fake_agent<F>(handler: F) -> (String, CallLog)
where
    F: Fn(&str, &str, &str, &CallLog) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake agent listener");
    let addr = listener.local_addr().expect("local addr");
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let task_log = log.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => break,
            };
            let handler = handler.clone();
            let log = task_log.clone();
            tokio::spawn(serve_one(socket, handler, log));
        }
    });

    (format!("http://{addr}"), log)
}

async fn serve_one<F>(mut socket: tokio::net::TcpStream, handler: Arc<F>, log: CallLog)
where
    F: Fn(&str, &str, &str, &CallLog) -> (u16, String) + Send + Sync + 'static,
{
    let mut buf = vec![0u8; 8192];
    let mut read_total = 0usize;

    let header_end = loop {
        if read_total == buf.len() {
            buf.resize(buf.len() * 2, 0);
        }
        let n = match socket.read(&mut buf[read_total..]).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        read_total += n;
        if let Some(end) = find_header_end(&buf[..read_total]) {
            break end;
        }
    };

    let header_text = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    let content_length: usize = lines
        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    let body_end = body_start + content_length;
    while read_total < body_end {
        if buf.len() < body_end {
            buf.resize(body_end, 0);
        }
        match socket.read(&mut buf[read_total..]).await {
            Ok(0) | Err(_) => break,
            Ok(n) => read_total += n,
        }
    }
    let body = String::from_utf8_lossy(&buf[body_start..read_total.min(body_end)]).to_string();

    let (status, payload) = handler(&method, &path, &body, &log);
    let response = format!(
        "HTTP/1.1 {status} status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}
