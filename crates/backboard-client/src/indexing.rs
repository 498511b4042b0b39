//! Document indexing status polling.
//!
//! Documents attached to a turn are indexed server-side. Until every
//! tracked document reaches a terminal status (`indexed` or `failed`), a
//! repeating timer polls the status endpoint and surfaces transitions as
//! [`IndexingEvent`]s for toast display.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use backboard_common::{
    ApiError, Attachment, DocumentStatus, DocumentStatusResponse, Notification,
};

/// Constant polling period. No backoff: the status endpoint is cheap and
/// indexing completes within a few ticks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Source of document status, injected so the poller can be driven against
/// a stub in tests. Implemented by the REST client.
#[async_trait]
pub trait DocumentStatusSource: Send + Sync {
    async fn document_status(&self, document_id: &str)
        -> Result<DocumentStatusResponse, ApiError>;
}

/// A status transition observed by the poller.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexingEvent {
    /// A non-terminal status change (pending → processing).
    StatusChanged {
        document_id: String,
        status: DocumentStatus,
    },
    /// The document finished indexing. Raised exactly once.
    Indexed { document_id: String, filename: String },
    /// Indexing failed. Raised exactly once.
    Failed {
        document_id: String,
        filename: String,
        message: Option<String>,
    },
}

impl IndexingEvent {
    /// Toast-style rendering of terminal transitions.
    pub fn to_notification(&self) -> Option<Notification> {
        match self {
            IndexingEvent::StatusChanged { .. } => None,
            IndexingEvent::Indexed { filename, .. } => Some(Notification::success(
                "Document indexed",
                format!("\"{filename}\" indexed successfully"),
            )),
            IndexingEvent::Failed {
                filename, message, ..
            } => Some(Notification::error(
                "Document indexing failed",
                format!(
                    "\"{}\" failed to index: {}",
                    filename,
                    message.as_deref().unwrap_or("Unknown error")
                ),
            )),
        }
    }
}

/// Tracked documents plus the timer task's run state. One lock covers
/// both, so the task's exit decision and `track`'s restart decision never
/// interleave: the task only clears `running` under the same lock in
/// which it observed the set empty.
#[derive(Default)]
struct PollerState {
    docs: HashMap<String, Attachment>,
    running: bool,
}

type SharedState = Arc<Mutex<PollerState>>;

/// Polls tracked documents on a fixed interval until the pending set drains.
pub struct IndexingPoller {
    source: Arc<dyn DocumentStatusSource>,
    state: SharedState,
    events: mpsc::UnboundedSender<IndexingEvent>,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl IndexingPoller {
    /// Create a poller and the receiving end of its event channel.
    pub fn new(
        source: Arc<dyn DocumentStatusSource>,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<IndexingEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                source,
                state: Arc::new(Mutex::new(PollerState::default())),
                events,
                interval,
                task: None,
            },
            rx,
        )
    }

    /// Add a document to the polling set and start the timer task if it is
    /// not running. A document that is already terminal on arrival still
    /// owes the caller its one notification: its event is emitted
    /// immediately instead of polling it.
    pub async fn track(&mut self, doc: Attachment) {
        if doc.status.is_terminal() {
            let _ = self.events.send(terminal_event(doc));
            return;
        }
        debug!(document_id = %doc.document_id, "tracking document for indexing");

        let spawn = {
            let mut state = self.state.lock().await;
            state.docs.insert(doc.document_id.clone(), doc);
            if state.running {
                false
            } else {
                state.running = true;
                true
            }
        };
        if spawn {
            self.spawn_task();
        }
    }

    /// Number of documents still awaiting a terminal status.
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.docs.len()
    }

    /// Cancel the timer and forget all tracked documents. Used when the
    /// user navigates to a different thread.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let mut state = self.state.lock().await;
        state.docs.clear();
        state.running = false;
    }

    fn spawn_task(&mut self) {
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let interval = self.interval;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                poll_once(source.as_ref(), &state, &events).await;

                // Exit check and run-state clear under one lock: a track()
                // racing this either inserts before the check (the loop
                // continues) or finds running == false and spawns afresh.
                let mut state = state.lock().await;
                if state.docs.is_empty() {
                    state.running = false;
                    break;
                }
            }
        }));
    }
}

impl Drop for IndexingPoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// The one-time event for a document that reached terminal status.
fn terminal_event(doc: Attachment) -> IndexingEvent {
    match doc.status {
        DocumentStatus::Failed => IndexingEvent::Failed {
            document_id: doc.document_id,
            filename: doc.filename,
            message: doc.status_message,
        },
        _ => IndexingEvent::Indexed {
            document_id: doc.document_id,
            filename: doc.filename,
        },
    }
}

/// One polling pass: request the status of every tracked document
/// concurrently, apply the results, and emit transition events. A failed
/// status request is logged and retried on the next tick.
async fn poll_once(
    source: &dyn DocumentStatusSource,
    state: &SharedState,
    events: &mpsc::UnboundedSender<IndexingEvent>,
) {
    let snapshot: Vec<Attachment> = state.lock().await.docs.values().cloned().collect();
    if snapshot.is_empty() {
        return;
    }

    let polls = snapshot
        .iter()
        .map(|doc| source.document_status(&doc.document_id));
    let results = join_all(polls).await;

    let mut state = state.lock().await;
    for (doc, result) in snapshot.into_iter().zip(results) {
        let status = match result {
            Ok(resp) => resp,
            Err(e) => {
                warn!(document_id = %doc.document_id, error = %e, "status poll failed");
                continue;
            }
        };

        // The document may have been removed while the request was in
        // flight (thread navigation); a missing entry is not re-added.
        let Some(tracked) = state.docs.get_mut(&doc.document_id) else {
            continue;
        };
        tracked.status = status.status;
        tracked.status_message = status.status_message.clone();

        match status.status {
            DocumentStatus::Indexed => {
                let tracked = state.docs.remove(&doc.document_id).unwrap_or(doc);
                let _ = events.send(IndexingEvent::Indexed {
                    document_id: tracked.document_id,
                    filename: tracked.filename,
                });
            }
            DocumentStatus::Failed => {
                let tracked = state.docs.remove(&doc.document_id).unwrap_or(doc);
                let _ = events.send(IndexingEvent::Failed {
                    document_id: tracked.document_id,
                    filename: tracked.filename,
                    message: status.status_message,
                });
            }
            status => {
                if status != doc.status {
                    let _ = events.send(IndexingEvent::StatusChanged {
                        document_id: doc.document_id,
                        status,
                    });
                }
            }
        }
    }
}
