//! # Rate-limited request queue
//!
//! The metadata API enforces a hard requests-per-minute ceiling. A channel
//! scan fans out many calls at once, and if every caller throttled itself
//! independently the effective rate during a burst would be N times the
//! limit. Every outbound call therefore funnels through one queue with one
//! drain loop, which spaces dispatches at least `60_000 / limit` ms apart in
//! strict enqueue order.
//!
//! The queue is either idle or being drained by exactly one loop. The loop
//! exits once a pop finds the queue empty; the next enqueue starts a fresh
//! one. A failed request settles only its own caller and never stalls the
//! loop.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use crate::clock::Clock;
use crate::error::ApiError;

pub type RequestFuture = Pin<Box<dyn Future<Output = Result<Value, ApiError>> + Send>>;
pub type RequestFn = Box<dyn FnOnce() -> RequestFuture + Send>;

struct QueuedRequest {
    invoke: RequestFn,
    settled: oneshot::Sender<Result<Value, ApiError>>,
}

struct QueueState {
    pending: VecDeque<QueuedRequest>,
    draining: bool,
    last_dispatch_ms: Option<u64>,
}

struct Inner {
    min_interval_ms: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
}

pub struct RequestQueue {
    inner: Arc<Inner>,
}

impl RequestQueue {
    pub fn new(requests_per_minute: u32, clock: Arc<dyn Clock>) -> Self {
        let limit = requests_per_minute.max(1);

        Self {
            inner: Arc::new(Inner {
                min_interval_ms: 60_000 / u64::from(limit),
                clock,
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    draining: false,
                    last_dispatch_ms: None,
                }),
            }),
        }
    }

    /// Appends a request and resolves once that request settles. Dispatch
    /// order is enqueue order.
    pub async fn enqueue<F, Fut>(&self, request: F) -> Result<Value, ApiError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        let (settled, receiver) = oneshot::channel();
        let invoke: RequestFn = Box::new(move || Box::pin(request()) as RequestFuture);

        let start_drain = {
            let mut state = self.inner.state.lock().unwrap();
            state.pending.push_back(QueuedRequest { invoke, settled });
            if state.draining {
                false
            } else {
                state.draining = true;
                true
            }
        };

        if start_drain {
            tokio::spawn(drain(Arc::clone(&self.inner)));
        }

        receiver
            .await
            .unwrap_or_else(|_| Err(ApiError::Network("request dropped before settling".to_string())))
    }
}

async fn drain(inner: Arc<Inner>) {
    loop {
        let request = {
            let mut state = inner.state.lock().unwrap();
            match state.pending.pop_front() {
                Some(request) => request,
                None => {
                    state.draining = false;
                    return;
                }
            }
        };

        let wait_ms = {
            let state = inner.state.lock().unwrap();
            match state.last_dispatch_ms {
                Some(last) => {
                    let elapsed = inner.clock.now_ms().saturating_sub(last);
                    inner.min_interval_ms.saturating_sub(elapsed)
                }
                None => 0,
            }
        };

        if wait_ms > 0 {
            inner.clock.sleep(Duration::from_millis(wait_ms)).await;
        }

        inner.state.lock().unwrap().last_dispatch_ms = Some(inner.clock.now_ms());

        let result = (request.invoke)().await;
        if request.settled.send(result).is_err() {
            warn!("queued request settled after its caller went away");
        }
    }
}
