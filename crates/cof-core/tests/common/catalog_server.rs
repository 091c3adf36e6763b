//! Minimal HTTP/1.1 server for integration tests.
//!
//! Routes are keyed by request target (path plus query, e.g.
//! `/v1/courses/sources/1?limit=2&offset=0`) and may be added after start,
//! so JSON bodies can point at the server's own URLs. Unknown targets get 404.
//! Every request is recorded with its Authorization and User-Agent headers.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Route {
    Ok {
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
    Status {
        code: u16,
        headers: Vec<(String, String)>,
    },
    /// Announces `claimed` bytes, sends `body`, then closes the connection.
    Truncated { body: Vec<u8>, claimed: usize },
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub target: String,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
pub struct CatalogServer {
    base: String,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl CatalogServer {
    /// Starts the server in a background thread. It runs until the process exits.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let server = Self {
            base: format!("http://127.0.0.1:{}", port),
            routes: Arc::new(Mutex::new(HashMap::new())),
            hits: Arc::new(Mutex::new(Vec::new())),
        };
        let shared = server.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let shared = shared.clone();
                thread::spawn(move || shared.handle(stream));
            }
        });
        server
    }

    /// Absolute URL for a request target (`/v1/accounts/`).
    pub fn url(&self, target: &str) -> String {
        format!("{}{}", self.base, target)
    }

    pub fn route(&self, target: &str, route: Route) -> &Self {
        self.routes.lock().unwrap().insert(target.to_string(), route);
        self
    }

    pub fn json(&self, target: &str, value: serde_json::Value) -> &Self {
        self.route(
            target,
            Route::Ok {
                headers: vec![("Content-Type".into(), "application/json".into())],
                body: value.to_string().into_bytes(),
            },
        )
    }

    pub fn file(&self, target: &str, body: Vec<u8>) -> &Self {
        self.route(
            target,
            Route::Ok {
                headers: Vec::new(),
                body,
            },
        )
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hit_count(&self, target: &str) -> usize {
        self.hits().iter().filter(|h| h.target == target).count()
    }

    fn handle(&self, mut stream: TcpStream) {
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
        let mut buf = [0u8; 8192];
        let n = match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let request = match std::str::from_utf8(&buf[..n]) {
            Ok(s) => s,
            Err(_) => return,
        };
        let hit = parse_request(request);
        let route = self.routes.lock().unwrap().get(&hit.target).cloned();
        self.hits.lock().unwrap().push(hit);

        match route {
            Some(Route::Ok { headers, body }) => respond(&mut stream, "200 OK", &headers, &body, body.len()),
            Some(Route::Status { code, headers }) => {
                let status = format!("{} {}", code, reason(code));
                respond(&mut stream, &status, &headers, &[], 0)
            }
            Some(Route::Truncated { body, claimed }) => respond(&mut stream, "200 OK", &[], &body, claimed),
            None => respond(&mut stream, "404 Not Found", &[], &[], 0),
        }
    }
}

fn respond(stream: &mut TcpStream, status: &str, headers: &[(String, String)], body: &[u8], length: usize) {
    let mut head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status, length
    );
    for (k, v) in headers {
        head.push_str(&format!("{}: {}\r\n", k, v));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}

fn reason(code: u16) -> &'static str {
    match code {
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

fn parse_request(request: &str) -> Hit {
    let mut hit = Hit {
        target: String::new(),
        authorization: None,
        user_agent: None,
    };
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if hit.target.is_empty() {
            hit.target = line.split_whitespace().nth(1).unwrap_or("").to_string();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.eq_ignore_ascii_case("authorization") {
                hit.authorization = Some(value.trim().to_string());
            } else if name.eq_ignore_ascii_case("user-agent") {
                hit.user_agent = Some(value.trim().to_string());
            }
        }
    }
    hit
}
