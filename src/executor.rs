//! The request lifecycle: send, observe, cancel, reset.
//!
//! A [`RequestExecutor`] owns at most one in-flight request. Every transition
//! of [`RequestStatus`] happens here and is published through a `watch`
//! channel, so front ends only ever read the `{status, response, error}`
//! tuple and never see an `Err` from a request.

use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ExplorerError;
use crate::types::{ApiResponse, RequestConfig, RequestStatus, ResponseBody};

pub const CANCELLED_MESSAGE: &str = "Request cancelled";
pub const FALLBACK_ERROR_MESSAGE: &str = "Request failed";

/// The state a response panel renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorSnapshot {
    pub status: RequestStatus,
    pub response: Option<ApiResponse>,
    pub error: Option<String>,
    /// Request that owns this state; 0 when detached.
    request_id: u64,
}

impl ExecutorSnapshot {
    pub fn request_id(&self) -> Option<u64> {
        (self.request_id != 0).then_some(self.request_id)
    }
}

/// Why a request did not produce a response.
#[derive(Debug)]
enum Failure {
    Cancelled,
    Failed(String),
}

impl Failure {
    fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            Failure::Failed(FALLBACK_ERROR_MESSAGE.to_string())
        } else {
            Failure::Failed(message)
        }
    }
}

struct InFlight {
    id: u64,
    token: CancellationToken,
}

struct Shared {
    client: reqwest::Client,
    state: watch::Sender<ExecutorSnapshot>,
    in_flight: Mutex<Option<InFlight>>,
    next_id: AtomicU64,
}

impl Shared {
    fn in_flight(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome of request `id`, unless a newer request (or a
    /// detaching reset) has taken over the state in the meantime.
    fn finish(&self, id: u64, outcome: Result<ApiResponse, Failure>) -> RequestStatus {
        let status = match &outcome {
            Ok(_) => RequestStatus::Success,
            Err(Failure::Cancelled) => RequestStatus::Cancelled,
            Err(Failure::Failed(_)) => RequestStatus::Error,
        };

        let mut in_flight = self.in_flight();
        if in_flight.as_ref().map(|f| f.id) == Some(id) {
            *in_flight = None;
        }

        let applied = self.state.send_if_modified(|snapshot| {
            if snapshot.request_id != id {
                return false;
            }
            snapshot.status = status;
            match outcome {
                Ok(response) => {
                    snapshot.response = Some(response);
                    snapshot.error = None;
                }
                Err(Failure::Cancelled) => {
                    snapshot.response = None;
                    snapshot.error = Some(CANCELLED_MESSAGE.to_string());
                }
                Err(Failure::Failed(message)) => {
                    snapshot.response = None;
                    snapshot.error = Some(message);
                }
            }
            true
        });

        if applied {
            log::debug!("request #{} finished: {}", id, status);
        } else {
            log::debug!("request #{} finished as {} after losing the state", id, status);
        }

        status
    }
}

/// Handle to one request started by [`RequestExecutor::execute`].
pub struct RequestHandle {
    id: u64,
    join: JoinHandle<RequestStatus>,
}

impl RequestHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for this particular request to settle and return its final status.
    ///
    /// A superseded request reports `Cancelled` here even though it no
    /// longer owns the executor state.
    pub async fn wait(self) -> RequestStatus {
        match self.join.await {
            Ok(status) => status,
            Err(e) => {
                log::error!("request #{} task failed: {}", self.id, e);
                RequestStatus::Error
            }
        }
    }
}

/// Runs one logical request at a time.
#[derive(Clone)]
pub struct RequestExecutor {
    shared: Arc<Shared>,
}

impl RequestExecutor {
    /// Executor with a default `reqwest` client.
    pub fn new() -> Result<Self, ExplorerError> {
        Self::with_timeout(None)
    }

    /// Executor whose client gives up after `timeout`. `None` keeps the
    /// platform default.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, ExplorerError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        let (state, _) = watch::channel(ExecutorSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                client,
                state,
                in_flight: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Current `{status, response, error}`.
    pub fn snapshot(&self) -> ExecutorSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn status(&self) -> RequestStatus {
        self.shared.state.borrow().status
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ExecutorSnapshot> {
        self.shared.state.subscribe()
    }

    /// Whether a request is currently in flight.
    pub fn is_in_flight(&self) -> bool {
        self.shared.in_flight().is_some()
    }

    /// Start `config`, cancelling whatever request is still in flight.
    ///
    /// Must be called from within a tokio runtime. The result is observed
    /// through [`snapshot`](Self::snapshot) or [`subscribe`](Self::subscribe);
    /// the returned handle only reports this request's final status.
    pub fn execute(&self, config: RequestConfig) -> RequestHandle {
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();

        {
            let mut in_flight = self.shared.in_flight();
            if let Some(previous) = in_flight.replace(InFlight {
                id,
                token: token.clone(),
            }) {
                log::debug!("request #{} superseded by #{}", previous.id, id);
                previous.token.cancel();
            }

            self.shared.state.send_modify(|snapshot| {
                snapshot.status = RequestStatus::Loading;
                snapshot.response = None;
                snapshot.error = None;
                snapshot.request_id = id;
            });
        }

        log::info!("#{} {} {}", id, config.method(), config.url());

        let shared = self.shared.clone();
        let join = tokio::spawn(async move {
            let start = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(Failure::Cancelled),
                result = perform(&shared.client, &config, start) => result,
            };
            shared.finish(id, outcome)
        });

        RequestHandle { id, join }
    }

    /// Abort the in-flight request, if any.
    ///
    /// The status changes once the aborted request notices, not here.
    pub fn cancel(&self) {
        if let Some(in_flight) = self.shared.in_flight().as_ref() {
            log::debug!("cancelling request #{}", in_flight.id);
            in_flight.token.cancel();
        }
    }

    /// Back to `Idle` with no response and no error.
    ///
    /// An in-flight request keeps running and may still write its outcome
    /// when it settles; use [`cancel_and_reset`](Self::cancel_and_reset) to
    /// drop it.
    pub fn reset(&self) {
        self.shared.state.send_modify(|snapshot| {
            snapshot.status = RequestStatus::Idle;
            snapshot.response = None;
            snapshot.error = None;
        });
    }

    /// Cancel the in-flight request and reset, detaching the state from it so
    /// its late outcome is discarded.
    pub fn cancel_and_reset(&self) {
        let in_flight = self.shared.in_flight();
        if let Some(current) = in_flight.as_ref() {
            current.token.cancel();
        }
        self.shared.state.send_modify(|snapshot| {
            snapshot.status = RequestStatus::Idle;
            snapshot.response = None;
            snapshot.error = None;
            snapshot.request_id = 0;
        });
    }
}

/// Every response header in wire order. Non-UTF-8 values are decoded lossily.
fn collect_headers(map: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    map.iter()
        .map(|(key, value)| {
            (
                key.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

async fn perform(
    client: &reqwest::Client,
    config: &RequestConfig,
    start: Instant,
) -> Result<ApiResponse, Failure> {
    let method = reqwest::Method::from_bytes(config.method().as_str().as_bytes())
        .map_err(|e| Failure::failed(e.to_string()))?;

    let mut request = client.request(method, config.url());
    for (key, value) in config.outgoing_headers() {
        request = request.header(key, value);
    }
    if let Some(body) = config.outgoing_body() {
        request = request.body(body.to_string());
    }

    let response = request
        .send()
        .await
        .map_err(|e| Failure::failed(e.to_string()))?;
    let timing = start.elapsed().as_millis() as u64;

    let status = response.status();
    let headers = collect_headers(response.headers());
    let is_json = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Failure::failed(e.to_string()))?;
        bytes.extend_from_slice(&chunk);
    }

    // A JSON content-type with nothing in it (e.g. 204) is shown as empty text.
    let body = if is_json && !bytes.is_empty() {
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| Failure::failed(format!("Failed to parse JSON response: {}", e)))?;
        ResponseBody::Json(value)
    } else {
        ResponseBody::Text(String::from_utf8_lossy(&bytes).to_string())
    };

    Ok(ApiResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        headers,
        body,
        timing,
        size: Some(bytes.len()),
    })
}
