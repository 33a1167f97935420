//! Shared mock services for integration tests.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

pub const ISSUER: &str = "rELeasERs3m4inA1UinRLTpXemqyStqzwh";
pub const RECIPIENT: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";

/// One request received by the mock signer.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some(MockRequest {
        method,
        path,
        headers,
        body,
    })
}

/// Start a programmable HTTP signer. Returns the bound address.
pub async fn start_mock_signer<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                let (status, body) = f(request).await;
                let status_text = match status {
                    200 => "200 OK",
                    400 => "400 Bad Request",
                    401 => "401 Unauthorized",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    _ => "200 OK",
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Submit response the signer platform sends for a new payload.
pub fn payload_created(uuid: &str, status_addr: SocketAddr) -> String {
    json!({
        "uuid": uuid,
        "refs": { "websocket_status": format!("ws://{}/{}", status_addr, uuid) },
        "next": { "always": format!("https://sign.example/{}", uuid) }
    })
    .to_string()
}

/// Start a status channel server. `frames` gets the request path and returns
/// the frames sent right after the handshake. The connection stays open until
/// the client closes it.
pub async fn start_status_channel<F>(frames: F) -> SocketAddr
where
    F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let frames = Arc::new(frames);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let frames = frames.clone();
            tokio::spawn(async move {
                let mut path = String::new();
                let capture = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    path = request.uri().path().trim_start_matches('/').to_string();
                    Ok(response)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(socket, capture).await else {
                    return;
                };

                for frame in frames(&path) {
                    if ws.send(Message::text(frame)).await.is_err() {
                        return;
                    }
                }
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_close() {
                        break;
                    }
                }
            });
        }
    });

    addr
}

/// Start a mock ledger node. `handler` maps a request to a response envelope
/// without `id`, or `None` to stay silent.
pub async fn start_mock_ledger<F>(handler: F) -> SocketAddr
where
    F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else {
                        continue;
                    };
                    let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
                        continue;
                    };
                    if let Some(mut response) = handler(&request) {
                        response["id"] = request["id"].clone();
                        if ws.send(Message::text(response.to_string())).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    addr
}

pub fn ledger_success(result: Value) -> Option<Value> {
    Some(json!({ "type": "response", "status": "success", "result": result }))
}

pub fn ledger_error(error: &str) -> Option<Value> {
    Some(json!({ "type": "response", "status": "error", "error": error }))
}

pub fn account_data(account: &str, balance_drops: u64, flags: u32) -> Value {
    json!({
        "account_data": {
            "Account": account,
            "Balance": balance_drops.to_string(),
            "Flags": flags,
            "OwnerCount": 0,
            "Sequence": 4
        },
        "signer_lists": []
    })
}
