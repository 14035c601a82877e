//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use api_gateway::config::loader::{parse_api_config, ConfigFormat};
use api_gateway::APIConfig;

/// Parse a YAML API config, panicking on any issue.
pub fn api_config(yaml: &str) -> APIConfig {
    parse_api_config(yaml, ConfigFormat::Yaml).expect("valid API config")
}

/// A user service: mock lookup, HTTP-backed update, disabled delete.
pub fn user_service(backend: SocketAddr) -> APIConfig {
    api_config(&format!(
        r#"
name: user-service
description: users over http
resources:
  - path: /api/v1
    type: restful
    filters: [access_log]
    resources:
      - path: /user/:id
        type: restful
        methods:
          - httpVerb: GET
            onAir: true
            mock: true
          - httpVerb: PUT
            onAir: true
            timeout: 2s
            inboundRequest:
              requestType: http
              headers:
                - name: X-Tenant
                  type: string
                  required: true
              queryStrings:
                - name: verbose
                  type: bool
              requestBody:
                - definitionName: user
            integrationRequest:
              requestType: http
              httpBackendConfig:
                host: "{backend}"
                path: /users/:uid
              mappingParams:
                - name: path.id
                  mapTo: path.uid
                - name: headers.X-Tenant
                  mapTo: headers.X-Backend-Tenant
                - name: queryStrings.verbose
                  mapTo: queryStrings.debug
                - name: requestBody.name
                  mapTo: requestBody.user.name
          - httpVerb: DELETE
            onAir: false
            mock: true
definitions:
  - name: user
    schema: '{{"type": "object", "required": ["name"], "properties": {{"name": {{"type": "string"}}}}}}'
"#
    ))
}

/// Start a backend that answers every request with a JSON description of
/// what it received: method, target, lower-cased headers and body text.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                write_response(&mut socket, 200, &request.to_string()).await;
            });
        }
    });
    addr
}

/// Start a backend that answers with `statuses` in order, then 200.
/// The returned counter tracks how many requests arrived.
pub async fn start_status_backend(statuses: Vec<u16>) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let statuses = Arc::new(statuses);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let counter = counter.clone();
            let statuses = statuses.clone();
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_none() {
                    return;
                }
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let status = statuses.get(n).copied().unwrap_or(200);
                write_response(&mut socket, status, &json!({ "attempt": n + 1 }).to_string()).await;
            });
        }
    });
    (addr, hits)
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn write_response(socket: &mut TcpStream, status: u16, body: &str) {
    let status_text = match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        504 => "504 Gateway Timeout",
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
}

async fn read_request(socket: &mut TcpStream) -> Option<Value> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let mut headers = Map::new();
    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name == "content-length" {
                content_length = value.parse().unwrap_or(0);
            }
            headers.insert(name, json!(value));
        }
    }

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = (head_end + content_length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[head_end..end]).to_string();

    Some(json!({
        "method": method,
        "target": target,
        "headers": headers,
        "body": body,
    }))
}
