//! Recording HTTP server

use crate::{ReceivedRequest, Result, TestServerError};
use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// How the server answers
#[derive(Debug)]
struct ResponsePlan {
    status: u16,
    /// Consumed one per request before falling back to `status`
    sequence: VecDeque<u16>,
    delay: Option<Duration>,
}

impl Default for ResponsePlan {
    fn default() -> Self {
        Self {
            status: 200,
            sequence: VecDeque::new(),
            delay: None,
        }
    }
}

#[derive(Debug, Default)]
struct ServerState {
    received: Mutex<Vec<ReceivedRequest>>,
    plan: Mutex<ResponsePlan>,
    arrived: Notify,
}

impl ServerState {
    /// Record the request and pick the response for it
    fn record(&self, request: ReceivedRequest) -> (u16, Option<Duration>) {
        let (status, delay) = {
            let mut plan = self.plan.lock();
            let status = plan.sequence.pop_front().unwrap_or(plan.status);
            (status, plan.delay)
        };
        self.received.lock().push(request);
        self.arrived.notify_waiters();
        (status, delay)
    }
}

/// An HTTP server on localhost that records every request it receives
///
/// Answers `200` with an empty body unless told otherwise. Stopped on
/// [`TestServer::stop`] or when dropped.
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: CancellationToken,
    accept_loop: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start listening on `127.0.0.1:port`; port `0` picks a free port
    pub async fn create(port: u16) -> Result<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TestServerError::Bind { addr, source })?;
        let addr = listener.local_addr()?;

        let state = Arc::new(ServerState::default());
        let shutdown = CancellationToken::new();
        let accept_loop = tokio::spawn(accept(listener, state.clone(), shutdown.clone()));

        info!("Test server listening on http://{}", addr);

        Ok(Self {
            addr,
            state,
            shutdown,
            accept_loop: Some(accept_loop),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Base URL, e.g. `http://127.0.0.1:40123`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL for a path on this server
    pub fn url_for(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    /// Every request received so far, in arrival order
    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.state.received.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.received.lock().len()
    }

    /// Answer every later request with `status`
    pub fn respond_with(&self, status: u16) {
        let mut plan = self.state.plan.lock();
        plan.status = status;
        plan.sequence.clear();
    }

    /// Answer the next requests with `statuses` in order, then with the
    /// default status
    pub fn respond_with_sequence(&self, statuses: impl IntoIterator<Item = u16>) {
        self.state.plan.lock().sequence = statuses.into_iter().collect();
    }

    /// Hold every response for `delay` after recording the request
    pub fn with_delay(&self, delay: Duration) {
        self.state.plan.lock().delay = Some(delay);
    }

    /// Wait until at least `count` requests have arrived.
    ///
    /// Returns whether the count was reached before `timeout`.
    pub async fn wait_for_requests(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.state.arrived.notified();
            if self.request_count() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.request_count() >= count;
            }
        }
    }

    /// Forget recorded requests and reset responses
    pub fn clear(&self) {
        self.state.received.lock().clear();
        *self.state.plan.lock() = ResponsePlan::default();
    }

    /// Stop accepting connections and drop open ones
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.accept_loop.take() {
            let _ = handle.await;
        }
        debug!(addr = %self.addr, "test server stopped");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn accept(listener: TcpListener, state: Arc<ServerState>, shutdown: CancellationToken) {
    loop {
        let stream = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(err) => {
                    error!("Test server accept error: {}", err);
                    continue;
                }
            },
        };

        let io = TokioIo::new(stream);
        let state = state.clone();
        let shutdown = shutdown.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(handle(req, &state).await) }
            });

            tokio::select! {
                _ = shutdown.cancelled() => {}
                served = http1::Builder::new().serve_connection(io, service) => {
                    if let Err(err) = served {
                        debug!("Test server connection error: {}", err);
                    }
                }
            }
        });
    }
}

async fn handle(req: Request<Incoming>, state: &ServerState) -> Response<Full<Bytes>> {
    let method = req.method().to_string();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| "/".to_string());

    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = req
        .collect()
        .await
        .map(|b| b.to_bytes().to_vec())
        .unwrap_or_default();

    debug!(%method, %path, bytes = body.len(), "test server received request");

    let (status, delay) = state.record(ReceivedRequest {
        method,
        path,
        headers,
        body,
        received_at: Utc::now(),
    });

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    response
}
