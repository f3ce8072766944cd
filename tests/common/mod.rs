//! Shared stub upstreams and proxy harness for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use relay_proxy::{HttpServer, ProxyConfig, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One request as the stub upstream saw it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[derive(Clone)]
struct EchoState {
    status: StatusCode,
    captured: Arc<Mutex<Vec<Captured>>>,
}

/// Handle to a running echo upstream.
pub struct Upstream {
    pub addr: SocketAddr,
    pub captured: Arc<Mutex<Vec<Captured>>>,
}

impl Upstream {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }
}

/// Start an upstream that records each request and echoes its body back
/// with `status`, plus `Set-Cookie: a=b` and `X-Upstream: echo`.
///
/// `/redirect` answers 302 to `/elsewhere`, which answers 200 `arrived`.
/// `/chunked` answers `hello` in two chunks without a `Content-Length`.
pub async fn spawn_echo_upstream(status: StatusCode) -> Upstream {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = EchoState {
        status,
        captured: captured.clone(),
    };

    let app = Router::new()
        .route("/redirect", get(redirect))
        .route("/elsewhere", get(|| async { "arrived" }))
        .route("/chunked", get(chunked))
        .fallback(echo)
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Upstream { addr, captured }
}

async fn redirect() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/elsewhere")]).into_response()
}

async fn chunked() -> Response {
    let chunks = [Bytes::from_static(b"hel"), Bytes::from_static(b"lo")];
    let stream = futures_util::stream::iter(chunks.map(Ok::<_, std::io::Error>));
    Response::new(Body::from_stream(stream))
}

async fn echo(State(state): State<EchoState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
    state.captured.lock().unwrap().push(Captured {
        method: parts.method.clone(),
        uri: parts.uri.clone(),
        headers: parts.headers.clone(),
        body: body.to_vec(),
    });

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = state.status;
    let headers = response.headers_mut();
    headers.insert(header::SET_COOKIE, "a=b".parse().unwrap());
    headers.insert("x-upstream", "echo".parse().unwrap());
    headers.insert("x-echo-method", parts.method.as_str().parse().unwrap());
    response
}

/// Start a raw TCP upstream that answers every request with `200 ok` and
/// keeps each connection open until the client closes it.
///
/// Returns the address, the count of currently open sockets, and the count
/// of accepted sockets.
pub async fn spawn_counting_upstream() -> (SocketAddr, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let open = Arc::new(AtomicUsize::new(0));
    let accepted = Arc::new(AtomicUsize::new(0));

    let (open_c, accepted_c) = (open.clone(), accepted.clone());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            accepted_c.fetch_add(1, Ordering::SeqCst);
            open_c.fetch_add(1, Ordering::SeqCst);
            let open = open_c.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let mut pending = Vec::new();
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            pending.extend_from_slice(&buf[..n]);
                            // requests carry no body, so a blank line ends each one
                            while let Some(end) = find_head_end(&pending) {
                                pending.drain(..end);
                                let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
                                if socket.write_all(reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
                open.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });

    (addr, open, accepted)
}

/// Start a raw TCP upstream that streams an endless chunked body.
///
/// The flag flips once a write fails, i.e. once the proxy has released the
/// upstream connection.
pub async fn spawn_endless_upstream() -> (SocketAddr, Arc<AtomicBool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let closed = Arc::new(AtomicBool::new(false));

    let closed_c = closed.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let closed = closed_c.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let mut head = Vec::new();
                while find_head_end(&head).is_none() {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }

                let preamble = "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nTransfer-Encoding: chunked\r\n\r\n";
                if socket.write_all(preamble.as_bytes()).await.is_err() {
                    closed.store(true, Ordering::SeqCst);
                    return;
                }

                let mut chunk = format!("{:x}\r\n", 16 * 1024).into_bytes();
                chunk.extend(std::iter::repeat(b'z').take(16 * 1024));
                chunk.extend_from_slice(b"\r\n");
                loop {
                    if socket.write_all(&chunk).await.is_err() {
                        closed.store(true, Ordering::SeqCst);
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            });
        }
    });

    (addr, closed)
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

/// Start the proxy on an ephemeral port.
pub async fn spawn_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// `/proxy?target=<percent-encoded target>` on the proxy.
pub fn proxy_url(proxy: SocketAddr, target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("http://{}/proxy?target={}", proxy, encoded)
}

/// Test client that never follows redirects and ignores system proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check()
}

/// Collects formatted log output from the current thread.
///
/// `#[tokio::test]` runs on a single thread, so the proxy's spawned tasks
/// log into the same capture.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route INFO and above into this capture until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
