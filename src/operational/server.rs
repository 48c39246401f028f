//! Operational HTTP Server
//!
//! Serves `/health`, `/ready`, `/info` and `/metrics` on a background task.
//!
//! ```text
//! Created ──start()──▶ Started ──stop()──▶ Stopped
//! ```

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::config::OperationalServerConfig;
use super::status::{ProbeStatus, Status};
use crate::error::{Error, Result};
use crate::logging::logger;
use crate::metadata::ServiceInfo;
use crate::metrics::MetricsCollector;

/// Time allowed for a client to send request headers
const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause before accepting again after a failed accept, e.g. on fd exhaustion
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Routes served by the operational server
pub const ROUTES: [&str; 4] = ["/health", "/ready", "/info", "/metrics"];

/// Lifecycle state of an [`OperationalServer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed, not yet listening
    Created,
    /// Listening and serving
    Started,
    /// Shut down
    Stopped,
}

enum Lifecycle {
    Created,
    Started {
        addr: SocketAddr,
        shutdown: CancellationToken,
        task: JoinHandle<()>,
    },
    Stopped,
}

/// Request handlers; cheap to clone into every connection
#[derive(Clone)]
struct Endpoints {
    status: Arc<Status>,
    metrics: Arc<MetricsCollector>,
    service_info: Arc<ServiceInfo>,
}

impl Endpoints {
    fn handle<B>(&self, req: &Request<B>) -> Response<Full<Bytes>> {
        let path = req.uri().path();

        if !ROUTES.contains(&path) {
            return text_response(StatusCode::NOT_FOUND, "not found");
        }
        if req.method() != Method::GET {
            let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET"));
            return response;
        }

        match path {
            "/health" => probe_response(self.status.liveness()),
            "/ready" => probe_response(self.status.readiness()),
            "/info" => self.info(),
            _ => self.metrics(),
        }
    }

    fn info(&self) -> Response<Full<Bytes>> {
        match serde_json::to_vec(&self.service_info.as_map()) {
            Ok(body) => response(StatusCode::OK, "application/json", body),
            Err(e) => {
                error!(error = %e, "failed to encode service info");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }

    fn metrics(&self) -> Response<Full<Bytes>> {
        match self.metrics.encode_text() {
            Ok(body) => response(StatusCode::OK, prometheus::TEXT_FORMAT, body),
            Err(e) => {
                error!(error = %e, "failed to encode metrics");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

fn response(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    response(status, "text/plain; charset=utf-8", body)
}

fn probe_response(probe: ProbeStatus) -> Response<Full<Bytes>> {
    let status = if probe.is_up() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    text_response(status, probe.as_str())
}

/// HTTP server exposing status, metadata and metrics
pub struct OperationalServer {
    config: OperationalServerConfig,
    endpoints: Endpoints,
    lifecycle: Lifecycle,
    server_url: Option<String>,
}

impl OperationalServer {
    /// Create a new operational server
    pub fn new(
        config: OperationalServerConfig,
        service_info: ServiceInfo,
        status: Arc<Status>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            config,
            endpoints: Endpoints {
                status,
                metrics,
                service_info: Arc::new(service_info),
            },
            lifecycle: Lifecycle::Created,
            server_url: None,
        }
    }

    /// Get configuration
    pub fn config(&self) -> &OperationalServerConfig {
        &self.config
    }

    /// Get the service metadata served on `/info`
    pub fn service_info(&self) -> &ServiceInfo {
        &self.endpoints.service_info
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServerState {
        match self.lifecycle {
            Lifecycle::Created => ServerState::Created,
            Lifecycle::Started { .. } => ServerState::Started,
            Lifecycle::Stopped => ServerState::Stopped,
        }
    }

    /// Bound address, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.lifecycle {
            Lifecycle::Started { addr, .. } => Some(addr),
            _ => None,
        }
    }

    /// Base URL using the actual bound port, once started
    pub fn server_url(&self) -> Option<&str> {
        self.server_url.as_deref()
    }

    /// Bind the listener and start serving in the background.
    ///
    /// Returns as soon as the listener is bound. Port 0 binds an OS-assigned
    /// port, reported by [`OperationalServer::local_addr`].
    pub async fn start(&mut self) -> Result<()> {
        if !matches!(self.lifecycle, Lifecycle::Created) {
            return Err(Error::InvalidState(format!(
                "cannot start a server in state {:?}",
                self.state()
            )));
        }

        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| Error::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(
            serve(listener, self.endpoints.clone(), shutdown.clone())
                .instrument(logger("operational")),
        );

        self.server_url = Some(server_url(local_addr));
        self.lifecycle = Lifecycle::Started {
            addr: local_addr,
            shutdown,
            task,
        };

        info!(addr = %local_addr, "operational server listening");
        Ok(())
    }

    /// Gracefully stop the server.
    ///
    /// In-flight requests may finish until `deadline`; after that the
    /// remaining connections are dropped and `ShutdownTimeout` is returned.
    /// Stopping a server that never started, or stopping twice, is a no-op.
    pub async fn stop(&mut self, deadline: Duration) -> Result<()> {
        if !matches!(self.lifecycle, Lifecycle::Started { .. }) {
            return Ok(());
        }

        let Lifecycle::Started {
            addr,
            shutdown,
            mut task,
        } = std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped)
        else {
            return Ok(());
        };

        shutdown.cancel();

        match tokio::time::timeout(deadline, &mut task).await {
            Ok(Ok(())) => {
                info!(addr = %addr, "operational server stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(addr = %addr, error = %e, "operational server task failed");
                Ok(())
            }
            Err(_) => {
                task.abort();
                warn!(addr = %addr, ?deadline, "operational server shutdown deadline exceeded");
                Err(Error::ShutdownTimeout { addr, deadline })
            }
        }
    }
}

impl Drop for OperationalServer {
    fn drop(&mut self) {
        if let Lifecycle::Started { shutdown, .. } = &self.lifecycle {
            shutdown.cancel();
        }
    }
}

impl std::fmt::Debug for OperationalServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationalServer")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("server_url", &self.server_url)
            .finish()
    }
}

fn server_url(addr: SocketAddr) -> String {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}", SocketAddr::new(ip, addr.port()))
}

async fn serve(listener: TcpListener, endpoints: Endpoints, shutdown: CancellationToken) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        endpoints.clone(),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    error!(error = %e, "operational server accept error");
                    if !pause_after_accept_error(&shutdown).await {
                        break;
                    }
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    while connections.join_next().await.is_some() {}
}

// Returns false when shutdown is requested during the pause
async fn pause_after_accept_error(shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_ERROR_PAUSE) => true,
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    endpoints: Endpoints,
    shutdown: CancellationToken,
) {
    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
        let response = endpoints.handle(&req);
        async move { Ok::<_, Infallible>(response) }
    });

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(HEADER_READ_TIMEOUT)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        debug!(peer = %peer, error = %e, "operational connection error");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsConfig;
    use http_body_util::BodyExt;

    fn endpoints() -> Endpoints {
        Endpoints {
            status: Arc::new(Status::new()),
            metrics: Arc::new(MetricsCollector::with_config(MetricsConfig::bare()).unwrap()),
            service_info: Arc::new(ServiceInfo::new(
                "test-service",
                "1.0.0",
                "test-instance",
                "abc123",
                "2023-01-01T00:00:00Z",
            )),
        }
    }

    fn get(path: &str) -> Request<()> {
        Request::builder().uri(path).body(()).unwrap()
    }

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_probe_routes_follow_status() {
        let endpoints = endpoints();

        assert_eq!(endpoints.handle(&get("/health")).status(), StatusCode::OK);
        assert_eq!(
            endpoints.handle(&get("/ready")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        endpoints.status.set_ready(true);
        endpoints.status.set_alive(false);
        assert_eq!(endpoints.handle(&get("/ready")).status(), StatusCode::OK);
        assert_eq!(
            endpoints.handle(&get("/health")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_probe_body_names_outcome() {
        let endpoints = endpoints();
        assert_eq!(body_string(endpoints.handle(&get("/health"))).await, "up");
        assert_eq!(body_string(endpoints.handle(&get("/ready"))).await, "down");
    }

    #[tokio::test]
    async fn test_info_route() {
        let response = endpoints().handle(&get("/info"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["service_name"], "test-service");
        assert_eq!(body["version"], "1.0.0");
        assert_eq!(body["instance_id"], "test-instance");
        assert_eq!(body["commit_sha"], "abc123");
        assert_eq!(body["build_time"], "2023-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let endpoints = endpoints();
        endpoints
            .metrics
            .create_counter_vec(prometheus::Opts::new("hits_total", "Hits"), &[])
            .unwrap()
            .with_label_values(&[] as &[&str])
            .inc();

        let response = endpoints.handle(&get("/metrics"));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert!(body_string(response).await.contains("hits_total 1"));
    }

    #[test]
    fn test_unknown_route_and_method() {
        let endpoints = endpoints();
        assert_eq!(
            endpoints.handle(&get("/debug")).status(),
            StatusCode::NOT_FOUND
        );

        let post = Request::builder()
            .method(Method::POST)
            .uri("/health")
            .body(())
            .unwrap();
        let response = endpoints.handle(&post);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET");
    }

    #[test]
    fn test_server_url_rewrites_unspecified() {
        let addr: SocketAddr = "0.0.0.0:8080".parse().unwrap();
        assert_eq!(server_url(addr), "http://127.0.0.1:8080");

        let addr: SocketAddr = "[::]:9090".parse().unwrap();
        assert_eq!(server_url(addr), "http://[::1]:9090");

        let addr: SocketAddr = "10.1.2.3:42069".parse().unwrap();
        assert_eq!(server_url(addr), "http://10.1.2.3:42069");
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let e = endpoints();
        let mut server = OperationalServer::new(
            OperationalServerConfig::new("127.0.0.1", 0),
            (*e.service_info).clone(),
            e.status.clone(),
            e.metrics.clone(),
        );
        assert_eq!(server.state(), ServerState::Created);
        assert!(server.server_url().is_none());

        server.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(server.state(), ServerState::Created);

        server.start().await.unwrap();
        assert_eq!(server.state(), ServerState::Started);
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(
            server.server_url().unwrap(),
            format!("http://127.0.0.1:{}", addr.port())
        );

        assert!(matches!(server.start().await, Err(Error::InvalidState(_))));

        server.stop(Duration::from_secs(5)).await.unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
        server.stop(Duration::from_secs(5)).await.unwrap();

        assert!(matches!(server.start().await, Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let e = endpoints();
        let mut server = OperationalServer::new(
            OperationalServerConfig::default(),
            ServiceInfo::default(),
            e.status,
            e.metrics,
        );

        tokio_test::block_on(server.stop(Duration::ZERO)).unwrap();
        assert_eq!(server.state(), ServerState::Created);
        assert!(server.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_stop_deadline_aborts_stalled_connection() {
        use tokio::io::AsyncWriteExt;

        let e = endpoints();
        let mut server = OperationalServer::new(
            OperationalServerConfig::new("127.0.0.1", 0),
            ServiceInfo::default(),
            e.status,
            e.metrics,
        );
        server.start().await.unwrap();
        let addr = server.local_addr().unwrap();

        // Request head never finishes, so the connection cannot drain
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let deadline = Duration::from_millis(300);
        let started = std::time::Instant::now();
        let result = server.stop(deadline).await;
        let elapsed = started.elapsed();

        match result {
            Err(Error::ShutdownTimeout { addr: timed_out, deadline: d }) => {
                assert_eq!(timed_out, addr);
                assert_eq!(d, deadline);
            }
            other => panic!("expected shutdown timeout, got {other:?}"),
        }
        assert!(elapsed >= deadline);
        assert!(elapsed < Duration::from_secs(3));
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_accept_error_pause() {
        let shutdown = CancellationToken::new();

        let started = std::time::Instant::now();
        assert!(pause_after_accept_error(&shutdown).await);
        assert!(started.elapsed() >= ACCEPT_ERROR_PAUSE);

        shutdown.cancel();
        let started = std::time::Instant::now();
        assert!(!pause_after_accept_error(&shutdown).await);
        assert!(started.elapsed() < ACCEPT_ERROR_PAUSE);
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port();

        let e = endpoints();
        let mut server = OperationalServer::new(
            OperationalServerConfig::new("127.0.0.1", port),
            ServiceInfo::default(),
            e.status,
            e.metrics,
        );

        let result = server.start().await;
        assert!(matches!(result, Err(Error::Bind { .. })));
        assert_eq!(server.state(), ServerState::Created);
    }
}
