//! Minimal HTTP/1.1 server serving a fixed set of pages for integration tests.
//!
//! Each route has a status, content type and body. A route can be told to
//! answer its first N requests with an interstitial page (200, no content),
//! the way a bot check looks to the extractor. Per-path hit counts are kept.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Serve the interstitial page for this many requests first.
    pub challenge_first: usize,
}

impl Route {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.into().into_bytes(),
            challenge_first: 0,
        }
    }

    pub fn bytes(content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type,
            body,
            challenge_first: 0,
        }
    }

    pub fn challenged(mut self, times: usize) -> Self {
        self.challenge_first = times;
        self
    }
}

const INTERSTITIAL: &str = "<html><body><div class=\"cf\">Checking your browser...</div></body></html>";

#[derive(Clone, Default)]
pub struct SiteServer {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    base: String,
}

impl SiteServer {
    /// Base URL without trailing slash, e.g. `http://127.0.0.1:12345`.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base, path_and_query)
    }

    /// Requests seen for `path_and_query` so far.
    pub fn hits(&self, path_and_query: &str) -> usize {
        self.hits.lock().unwrap().get(path_and_query).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

/// Starts a server in a background thread. Unknown paths get 404. The server
/// runs until the process exits.
pub fn start(routes: HashMap<String, Route>) -> SiteServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let server = SiteServer {
        routes: Arc::new(Mutex::new(routes)),
        hits: Arc::new(Mutex::new(HashMap::new())),
        base: format!("http://127.0.0.1:{}", port),
    };
    let shared = server.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let shared = shared.clone();
            thread::spawn(move || handle(stream, &shared));
        }
    });
    server
}

fn handle(mut stream: std::net::TcpStream, server: &SiteServer) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let target = request
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    let seen = {
        let mut hits = server.hits.lock().unwrap();
        let h = hits.entry(target.clone()).or_insert(0);
        *h += 1;
        *h
    };
    let route = server.routes.lock().unwrap().get(&target).cloned();

    let (status, content_type, body) = match route {
        Some(r) if seen <= r.challenge_first => {
            (200, "text/html; charset=utf-8", INTERSTITIAL.as_bytes().to_vec())
        }
        Some(r) => (r.status, r.content_type, r.body),
        None => (404, "text/plain", b"not found".to_vec()),
    };
    let reason = match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        content_type,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
}
