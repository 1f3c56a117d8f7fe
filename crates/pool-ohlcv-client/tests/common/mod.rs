use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One scripted answer. `delay` holds the reply back; `truncate` advertises
/// the full `Content-Length` but closes after sending that many body bytes.
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
    pub truncate: Option<usize>,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
            truncate: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn truncated(mut self, sent: usize) -> Self {
        self.truncate = Some(sent);
        self
    }
}

/// Local HTTP responder that answers each connection with the next scripted
/// reply and records the request heads it received.
pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let replies = responses
            .into_iter()
            .map(|(status, body)| Reply::new(status, body))
            .collect();
        Self::start_with(replies).await
    }

    pub async fn start_with(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        let mut queue: VecDeque<Reply> = replies.into();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let head = read_head(&mut stream).await;
                seen.lock().unwrap().push(head);

                let reply = queue
                    .pop_front()
                    .unwrap_or_else(|| Reply::new(404, r#"{"errors":[{"status":"404"}]}"#));
                if let Some(delay) = reply.delay {
                    tokio::time::sleep(delay).await;
                }

                let sent = reply.truncate.map_or(reply.body.len(), |n| n.min(reply.body.len()));
                let response = format!(
                    "HTTP/1.1 {} {}\r\n\
                     Content-Type: application/json\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\r\n{}",
                    reply.status,
                    reason(reply.status),
                    reply.body.len(),
                    &reply.body[..sent]
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            base_url: format!("http://{addr}/api/v2"),
            requests,
        }
    }

    /// Request lines seen so far, e.g. `GET /api/v2/... HTTP/1.1`.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|head| head.lines().next().unwrap_or_default().to_string())
            .collect()
    }

    /// Value of header `name` on the `index`th request, matched case-insensitively.
    pub fn header(&self, index: usize, name: &str) -> Option<String> {
        let requests = self.requests.lock().unwrap();
        requests.get(index)?.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

async fn read_head(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Start of the synthetic candle history used by the tests (2024-01-01T00:00:00Z).
pub const EPOCH: i64 = 1_704_067_200;

/// `count` hourly rows ending at hour `newest`, newest first.
pub fn hourly_rows(newest: i64, count: i64) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let ts = EPOCH + (newest - i) * 3600;
            json!([ts, 1.5, 2.25, 1.25, 2.0, 1234.5])
        })
        .collect()
}

pub fn ohlcv_body(rows: Vec<Value>) -> String {
    json!({
        "data": {
            "id": "2f5c1e0a",
            "type": "ohlcv_request_response",
            "attributes": { "ohlcv_list": rows }
        },
        "meta": {
            "base": { "symbol": "PEPE" },
            "quote": { "symbol": "WETH" }
        }
    })
    .to_string()
}
