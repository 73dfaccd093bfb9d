//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use reqwest::header::{HeaderMap, SET_COOKIE};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use waypost::config::AppConfig;
use waypost::{HttpServer, Shutdown};

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server to drain.
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap();
    }
}

/// Start the demo application with `config`.
pub async fn start_server(mut config: AppConfig) -> TestServer {
    config.listener.bind_address = "127.0.0.1:0".to_string();
    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let routes = waypost::demo::routes().unwrap();
    let server = HttpServer::new(config, routes).unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, rx));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Fold every `Set-Cookie` in `headers` into `jar` (name → value), the way
/// a browser would. Cookies with an empty value are removed.
pub fn absorb_cookies(jar: &mut Vec<(String, String)>, headers: &HeaderMap) {
    for header in headers.get_all(SET_COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        let Some(pair) = raw.split(';').next() else { continue };
        let Some((name, value)) = pair.split_once('=') else { continue };
        jar.retain(|(n, _)| n != name);
        if !value.is_empty() {
            jar.push((name.to_string(), value.to_string()));
        }
    }
}

/// Render `jar` as a `Cookie` header value.
pub fn cookie_header(jar: &[(String, String)]) -> String {
    jar.iter()
        .map(|(n, v)| format!("{}={}", n, v))
        .collect::<Vec<_>>()
        .join("; ")
}

/// The raw `Set-Cookie` header for cookie `name`.
pub fn set_cookie_for(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find(|raw| raw.starts_with(&format!("{}=", name)))
        .map(str::to_string)
}
