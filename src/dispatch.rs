//! The request dispatcher: the single entry point that turns a canonical
//! thread into a vendor call and a stream of canonical deltas.
//!
//! All translation happens through the adapter captured at request start, so
//! a registry reload mid-flight never touches an outstanding request. The
//! transport is a trait collaborator; the crate ships an HTTP implementation
//! but tests drive the dispatcher with channel-backed fakes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use crate::errors::{ChatError, Result};
use crate::models::{Message, Thread};
use crate::providers::base::{Adapter, Capability, ChatDelta};
use crate::providers::registry::AdapterRegistry;
use crate::providers::utils::decode_vendor_error;

/// What the dispatcher hands the transport: everything vendor-specific is
/// already baked in by the adapter.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// The I/O collaborator. `post` is a unary JSON exchange; `post_stream`
/// yields one frame per line of the response body, in arrival order.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: &TransportRequest) -> Result<Value>;

    async fn post_stream(
        &self,
        request: &TransportRequest,
    ) -> Result<BoxStream<'static, Result<String>>>;
}

/// HTTP transport backed by reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    async fn issue(&self, request: &TransportRequest) -> Result<reqwest::Response> {
        let mut builder = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| ChatError::Transport(e.to_string()))?;
            return Err(decode_vendor_error(status.as_u16(), &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &TransportRequest) -> Result<Value> {
        let response = self.issue(request).await?;
        response
            .json()
            .await
            .map_err(|e| ChatError::Decode(format!("response body is not JSON: {}", e)))
    }

    async fn post_stream(
        &self,
        request: &TransportRequest,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let response = self.issue(request).await?;
        let mut bytes = response.bytes_stream();

        let frames = async_stream::try_stream! {
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| ChatError::Transport(e.to_string()))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim_end_matches('\r').to_string();
                    buffer.drain(..=newline);
                    yield line;
                }
            }
            if !buffer.is_empty() {
                yield buffer;
            }
        };
        Ok(frames.boxed())
    }
}

/// One event on a response handle. Terminal events are `Completed`,
/// `Failed`, and channel close after an abort.
#[derive(Debug)]
pub enum StreamEvent {
    /// An incremental canonical delta, in arrival order.
    Delta(ChatDelta),
    /// The completed canonical messages, one per choice. For streamed
    /// requests this carries what the adapter assembled into whole messages;
    /// callers that consumed deltas may ignore it.
    Completed(Vec<Message>),
    /// The request terminated with an error. Deltas already received remain
    /// valid; nothing is retried.
    Failed(ChatError),
}

struct AbortState {
    flag: AtomicBool,
    notify: Notify,
}

impl AbortState {
    fn new() -> Self {
        AbortState {
            flag: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        while !self.is_aborted() {
            self.notify.notified().await;
        }
    }
}

/// Handle to one outstanding request. Dropping the handle does not abort;
/// call [`ResponseHandle::abort`] to cancel cooperatively.
pub struct ResponseHandle {
    rx: mpsc::Receiver<StreamEvent>,
    abort: Arc<AbortState>,
}

impl ResponseHandle {
    /// The next event, or `None` once the request has wound down.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Cancel the request. Safe to call at any point in the stream's
    /// lifetime, including before the first byte and after completion;
    /// repeated calls are no-ops.
    pub fn abort(&self) {
        self.abort.trigger();
    }

    /// Whether this request was cancelled. Distinguishes cancellation from
    /// transport failure: an aborted handle closes without a `Failed` event.
    pub fn aborted(&self) -> bool {
        self.abort.is_aborted()
    }
}

/// Issues requests against the active adapter and assembles ordered
/// canonical deltas for the caller.
pub struct Dispatcher {
    registry: Arc<AdapterRegistry>,
    transport: Arc<dyn Transport>,
    in_flight: Arc<Mutex<HashMap<String, Arc<AbortState>>>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<AdapterRegistry>, transport: Arc<dyn Transport>) -> Self {
        Dispatcher {
            registry,
            transport,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Send a thread for a complete (non-streamed) response.
    pub fn send(&self, thread: &Thread) -> Result<ResponseHandle> {
        self.dispatch(thread, false)
    }

    /// Send a thread for a streamed response. Requires the active adapter
    /// to advertise streaming.
    pub fn stream(&self, thread: &Thread) -> Result<ResponseHandle> {
        self.dispatch(thread, true)
    }

    fn dispatch(&self, thread: &Thread, streaming: bool) -> Result<ResponseHandle> {
        // Capture the adapter up front: reloads must not affect this request.
        let adapter = self.registry.active()?;
        check_capabilities(adapter.as_ref(), thread, streaming)?;

        // Snapshot before any await point; mutation of the caller's thread
        // cannot corrupt the translation.
        let snapshot = thread.clone();
        let payload = adapter.to_request(&snapshot)?;

        let abort = Arc::new(AbortState::new());
        self.replace_in_flight(&snapshot.id, Arc::clone(&abort));

        let (tx, rx) = mpsc::channel(32);
        let transport = Arc::clone(&self.transport);
        let request = TransportRequest {
            url: adapter.endpoint(streaming),
            headers: adapter.headers(),
            body: if streaming {
                adapter.streaming_payload(payload)
            } else {
                payload
            },
        };

        debug!(
            adapter = adapter.name(),
            thread = %snapshot.id,
            streaming,
            "dispatching request"
        );

        let task_abort = Arc::clone(&abort);
        let in_flight = Arc::clone(&self.in_flight);
        let thread_id = snapshot.id.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = task_abort.wait() => {
                    debug!(thread = %thread_id, "request aborted");
                }
                _ = run_request(adapter, transport, request, tx, streaming) => {}
            }
            // Channel closes when tx drops; an aborted request emits nothing
            // further and nothing is synthesized.
            let mut in_flight = in_flight.lock().expect("dispatcher lock poisoned");
            if let Some(current) = in_flight.get(&thread_id) {
                if Arc::ptr_eq(current, &task_abort) {
                    in_flight.remove(&thread_id);
                }
            }
        });

        Ok(ResponseHandle { rx, abort })
    }

    /// Only one outstanding request per thread: a new send implicitly
    /// aborts the previous one so partial deltas stay attributable.
    fn replace_in_flight(&self, thread_id: &str, abort: Arc<AbortState>) {
        let mut in_flight = self.in_flight.lock().expect("dispatcher lock poisoned");
        if let Some(previous) = in_flight.insert(thread_id.to_string(), abort) {
            if !previous.is_aborted() {
                warn!(thread = thread_id, "superseding outstanding request");
                previous.trigger();
            }
        }
    }
}

fn check_capabilities(adapter: &dyn Adapter, thread: &Thread, streaming: bool) -> Result<()> {
    let mut required = Vec::new();
    if !thread.tools.is_empty() {
        required.push(Capability::Tools);
    }
    if thread.has_images() {
        required.push(Capability::Images);
    }
    if thread.config.n.map_or(false, |n| n > 1) {
        required.push(Capability::MultipleChoices);
    }
    if streaming {
        required.push(Capability::Streaming);
    }

    for capability in required {
        if !adapter.supports(capability) {
            return Err(ChatError::UnsupportedCapability {
                adapter: adapter.name(),
                capability,
            });
        }
    }
    Ok(())
}

async fn run_request(
    adapter: Arc<dyn Adapter>,
    transport: Arc<dyn Transport>,
    request: TransportRequest,
    tx: mpsc::Sender<StreamEvent>,
    streaming: bool,
) {
    if streaming {
        run_streaming(adapter, transport, request, tx).await;
    } else {
        run_unary(adapter, transport, request, tx).await;
    }
}

async fn run_unary(
    adapter: Arc<dyn Adapter>,
    transport: Arc<dyn Transport>,
    request: TransportRequest,
    tx: mpsc::Sender<StreamEvent>,
) {
    let event = match transport.post(&request).await {
        Ok(response) => match adapter.from_response(&response) {
            Ok(messages) => {
                for (choice_index, message) in messages.iter().enumerate() {
                    let delta = ChatDelta::from_message(choice_index, message);
                    if tx.send(StreamEvent::Delta(delta)).await.is_err() {
                        return;
                    }
                }
                StreamEvent::Completed(messages)
            }
            Err(error) => StreamEvent::Failed(error),
        },
        Err(error) => StreamEvent::Failed(error),
    };
    let _ = tx.send(event).await;
}

async fn run_streaming(
    adapter: Arc<dyn Adapter>,
    transport: Arc<dyn Transport>,
    request: TransportRequest,
    tx: mpsc::Sender<StreamEvent>,
) {
    let mut frames = match transport.post_stream(&request).await {
        Ok(frames) => frames,
        Err(error) => {
            let _ = tx.send(StreamEvent::Failed(error)).await;
            return;
        }
    };

    // Whole messages assembled from the deltas, one per choice.
    let mut assembled: HashMap<usize, String> = HashMap::new();

    while let Some(frame) = frames.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(error) => {
                let _ = tx.send(StreamEvent::Failed(error)).await;
                return;
            }
        };

        match adapter.to_stream_chunk(&frame) {
            Ok(Some(delta)) => {
                let text: String = delta
                    .parts
                    .iter()
                    .filter_map(|p| p.as_text())
                    .collect();
                assembled.entry(delta.choice_index).or_default().push_str(&text);
                if tx.send(StreamEvent::Delta(delta)).await.is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(error) => {
                // Frames already decoded stay with the caller.
                warn!(error = %error, "stream frame decode failed");
                let _ = tx.send(StreamEvent::Failed(error)).await;
                return;
            }
        }
    }

    let mut choices: Vec<(usize, String)> = assembled.into_iter().collect();
    choices.sort_by_key(|(index, _)| *index);
    let messages = choices
        .into_iter()
        .map(|(_, text)| Message::assistant().with_text(text))
        .collect();
    let _ = tx.send(StreamEvent::Completed(messages)).await;
}
