//! Chat turn orchestration.
//!
//! A [`ChatSession`] is scoped to one thread. It sends the turn, drives the
//! streaming pipeline (or the complete-JSON fallback), surfaces incremental
//! snapshots through a callback, and collects attachments that still need
//! indexing. Navigation away from the thread marks the session stale via
//! [`ActiveThread`]; a stale session stops publishing snapshots and its
//! final result is flagged for the caller to drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use backboard_common::{
    temp_id, Attachment, ChatMessage, ClientError, DocumentStatus, MessageResponse, Result, Role,
};

use crate::api::{BackboardClient, SendMessageRequest, SendReply};
use crate::interpreter::{StreamInterpreter, StreamSignal};
use crate::streaming::relay_sse_lines;

/// Shared record of which thread is currently displayed. Streams that
/// outlive a navigation check it before publishing.
#[derive(Clone, Default)]
pub struct ActiveThread {
    current: Arc<Mutex<Option<String>>>,
}

impl ActiveThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, thread_id: impl Into<String>) {
        *self.current.lock().unwrap() = Some(thread_id.into());
    }

    pub fn clear(&self) {
        *self.current.lock().unwrap() = None;
    }

    pub fn is_current(&self, thread_id: &str) -> bool {
        self.current
            .lock()
            .unwrap()
            .as_deref()
            .map_or(true, |current| current == thread_id)
    }
}

/// Guard that clears the `busy` flag on drop, so it is released even if the
/// future is cancelled or an early return occurs.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(ClientError::Busy);
        }
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The optimistic user message (placeholder id, pending attachments).
    pub user_message: ChatMessage,
    /// The finalized assistant message.
    pub assistant_message: ChatMessage,
    /// Attachments reported by the reply that are not yet indexed; the
    /// caller registers these with the indexing poller.
    pub pending_attachments: Vec<Attachment>,
    /// False when the transport dropped mid-stream: the assistant message
    /// holds the partial content that arrived and the failure should be
    /// surfaced as a notification.
    pub completed: bool,
    /// True when the thread was navigated away from while the turn was in
    /// flight. The caller must not apply this outcome to the UI.
    pub discarded: bool,
}

/// One thread's chat session.
pub struct ChatSession {
    client: Arc<BackboardClient>,
    thread_id: String,
    active: ActiveThread,
    busy: AtomicBool,
}

impl ChatSession {
    pub fn new(client: Arc<BackboardClient>, thread_id: impl Into<String>) -> Self {
        let thread_id = thread_id.into();
        let active = ActiveThread::new();
        active.set(thread_id.clone());
        Self {
            client,
            thread_id,
            active,
            busy: AtomicBool::new(false),
        }
    }

    /// Share the active-thread gate with the navigation layer.
    pub fn with_active_thread(mut self, active: ActiveThread) -> Self {
        self.active = active;
        self
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Send one turn. `on_update` receives a snapshot of the assistant
    /// message every time its content or citations change.
    pub async fn send(
        &self,
        request: SendMessageRequest,
        mut on_update: impl FnMut(&ChatMessage),
    ) -> Result<TurnOutcome> {
        let _guard = BusyGuard::acquire(&self.busy)?;

        let user_message = build_user_message(&self.thread_id, &request);

        let reply = self
            .client
            .send_message(&self.thread_id, request)
            .await
            .map_err(ClientError::Api)?;

        match reply {
            SendReply::Streaming(response) => {
                self.consume_stream(response, user_message, &mut on_update)
                    .await
            }
            SendReply::Complete(body) => {
                let (assistant_message, pending_attachments) =
                    outcome_from_complete(&self.thread_id, *body);
                if self.active.is_current(&self.thread_id) {
                    on_update(&assistant_message);
                }
                Ok(TurnOutcome {
                    user_message,
                    assistant_message,
                    pending_attachments,
                    completed: true,
                    discarded: !self.active.is_current(&self.thread_id),
                })
            }
        }
    }

    async fn consume_stream(
        &self,
        response: reqwest::Response,
        user_message: ChatMessage,
        on_update: &mut impl FnMut(&ChatMessage),
    ) -> Result<TurnOutcome> {
        let mut interp = StreamInterpreter::new(&self.thread_id);
        let mut pending_attachments: Vec<Attachment> = Vec::new();

        let relay_result = relay_sse_lines(response, |line| {
            for signal in interp.process_line(line) {
                match signal {
                    StreamSignal::ContentUpdated(snapshot) => {
                        if self.active.is_current(&self.thread_id) {
                            on_update(&snapshot);
                        }
                    }
                    StreamSignal::MetadataUpdated => {}
                    StreamSignal::TrackDocument(doc) => pending_attachments.push(doc),
                    StreamSignal::Completed => {
                        debug!(thread_id = %self.thread_id, "stream completed");
                    }
                }
            }
        })
        .await;

        // Transport drop mid-stream: partial content already delivered
        // stays; the turn is reported not-completed, never rolled back.
        let completed = match relay_result {
            Ok(()) => true,
            Err(e) => {
                warn!(thread_id = %self.thread_id, error = %e, "stream transport error");
                false
            }
        };

        // End of read without a terminal event counts as normal completion
        // with whatever content accumulated.
        let assistant_message = interp.finalize();

        Ok(TurnOutcome {
            user_message,
            assistant_message,
            pending_attachments,
            completed,
            discarded: !self.active.is_current(&self.thread_id),
        })
    }
}

/// Optimistic user message shown immediately on send, with a placeholder
/// id and pending placeholders for each uploaded file.
fn build_user_message(thread_id: &str, request: &SendMessageRequest) -> ChatMessage {
    let mut msg = ChatMessage::new(
        temp_id("temp"),
        thread_id,
        Role::User,
        request.content.clone(),
    );
    msg.attachments = request
        .files
        .iter()
        .enumerate()
        .map(|(i, file)| Attachment {
            document_id: format!("temp-{i}"),
            filename: file.filename.clone(),
            status: DocumentStatus::Pending,
            status_message: None,
        })
        .collect();
    msg
}

/// Build the assistant message and the to-be-polled attachment list from a
/// complete (non-streaming) reply.
fn outcome_from_complete(
    thread_id: &str,
    body: MessageResponse,
) -> (ChatMessage, Vec<Attachment>) {
    let message_id = body
        .message_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| temp_id("resp"));

    let mut msg = ChatMessage::new(
        message_id,
        thread_id,
        Role::Assistant,
        body.content.unwrap_or_default(),
    );
    msg.retrieved_memories = body.retrieved_memories;
    msg.retrieved_files = body.retrieved_files;

    let pending = body
        .attachments
        .into_iter()
        .filter(|a| a.status != DocumentStatus::Indexed)
        .collect();

    (msg, pending)
}
