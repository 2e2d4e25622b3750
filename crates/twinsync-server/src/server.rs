//! [`ApiServer`] – binds the listener and serves the API router.
//!
//! Listens on `0.0.0.0:8099` (configurable via [`ApiServer::with_port`]).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::{self, ApiState, DEFAULT_BODY_TIMEOUT};

/// Default TCP port for the API.
pub const DEFAULT_PORT: u16 = 8099;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("server stopped: {0}")]
    Serve(#[source] std::io::Error),
}

/// HTTP server exposing the spot API.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use twinsync_memory::SpotStore;
/// use twinsync_runtime::{HaCamera, SpotChecker, VisionAnalyzer};
/// use twinsync_server::{ApiServer, ApiState, ServiceStatus};
///
/// #[tokio::main]
/// async fn main() {
///     let store = Arc::new(SpotStore::open_in_memory().unwrap());
///     let checker = SpotChecker::new(
///         store,
///         Arc::new(HaCamera::new(None, "http://supervisor/core/api")),
///         Arc::new(VisionAnalyzer::new(None, "gemini-2.0-flash-exp")),
///     );
///     ApiServer::new(ApiState::new(checker, ServiceStatus::default()))
///         .run()
///         .await
///         .unwrap();
/// }
/// ```
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    body_timeout: Duration,
}

impl ApiServer {
    pub fn new(state: ApiState) -> Self {
        Self {
            state: Arc::new(state),
            port: DEFAULT_PORT,
            body_timeout: DEFAULT_BODY_TIMEOUT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override how long a client may take to send a request body.
    pub fn with_body_timeout(mut self, timeout: Duration) -> Self {
        self.body_timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind the configured port and serve until the listener fails.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] if the listener cannot bind,
    /// [`ServerError::Serve`] if serving stops with an I/O error.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(%addr, "API listening");
        self.serve(listener).await
    }

    /// Serve connections accepted from an already-bound `listener`.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let app = routes::router_with_body_timeout(self.state, self.body_timeout);
        axum::serve(listener, app).await.map_err(ServerError::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::ServiceStatus;
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use twinsync_memory::SpotStore;
    use twinsync_runtime::{CameraEntity, SnapshotSource, SpotChecker, VisionAnalyzer};

    struct NoCamera;

    #[async_trait]
    impl SnapshotSource for NoCamera {
        async fn cameras(&self) -> Vec<CameraEntity> {
            Vec::new()
        }

        async fn snapshot(&self, _: &str) -> Option<Vec<u8>> {
            None
        }
    }

    fn server() -> ApiServer {
        let store = Arc::new(SpotStore::open_in_memory().unwrap());
        let checker = SpotChecker::new(
            store,
            Arc::new(NoCamera),
            Arc::new(VisionAnalyzer::new(None, "test-model")),
        );
        ApiServer::new(ApiState::new(checker, ServiceStatus::default()))
    }

    async fn spawn(server: ApiServer) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server.serve(listener));
        addr
    }

    /// Write `raw` and read one complete response, framed by its
    /// `content-length`.
    async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            out.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&out).into_owned();
            if n == 0 || response_complete(&text) {
                return text;
            }
        }
    }

    fn response_complete(text: &str) -> bool {
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..head_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        text.len() >= head_end + 4 + length
    }

    #[test]
    fn default_port() {
        let server = server();
        assert_eq!(server.port(), DEFAULT_PORT);
        assert_eq!(server.with_port(9000).port(), 9000);
    }

    #[tokio::test]
    async fn serves_json_over_tcp() {
        let addr = spawn(server()).await;
        let body = r#"{"name":"Desk","description":"Clean desk","camera_entity_id":"camera.desk","spot_type":"desk"}"#;
        let raw = format!(
            "POST /api/spots HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\
             Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let reply = exchange(addr, raw.as_bytes()).await;
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(reply.contains("\"message\":\"Spot created successfully\""));

        let reply = exchange(
            addr,
            b"GET /api/spots HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(reply.contains("\"name\":\"Desk\""));
        assert!(reply.contains("\"voice_id\":\"direct\""));
    }

    #[tokio::test]
    async fn accepts_chunked_bodies() {
        let addr = spawn(server()).await;
        let body = r#"{"name":"Sink","description":"Empty","camera_entity_id":"camera.sink","spot_type":"sink"}"#;
        let raw = format!(
            "POST /api/spots HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\
             Content-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n\
             {:x}\r\n{body}\r\n0\r\n\r\n",
            body.len()
        );
        let reply = exchange(addr, raw.as_bytes()).await;
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"), "{reply}");
        assert!(reply.contains("Spot created successfully"));
    }

    #[tokio::test]
    async fn stalled_body_times_out() {
        let addr = spawn(server().with_body_timeout(Duration::from_millis(200))).await;
        let raw = b"POST /api/spots HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\n\
                    Content-Length: 50\r\n\r\n{";
        let reply = tokio::time::timeout(Duration::from_secs(5), exchange(addr, raw))
            .await
            .expect("server kept a stalled request open");
        assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{reply}");
        assert!(reply.contains("Invalid JSON body"));
    }
}
