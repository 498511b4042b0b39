//! In-progress assistant message reconstruction.

use backboard_common::{temp_id, ChatMessage, Memory, RetrievedFile, Role};

/// Holds the assistant message being rebuilt from a stream.
///
/// Content is append-only while live; citations are snapshot-overwritten;
/// the message id starts as a client-side placeholder and is replaced by
/// whichever server-supplied id arrives last. `finalize` freezes the
/// message; later deltas are ignored and repeated finalize calls return
/// the identical snapshot.
#[derive(Debug)]
pub struct MessageAccumulator {
    thread_id: String,
    message_id: String,
    content: String,
    retrieved_memories: Vec<Memory>,
    retrieved_files: Vec<RetrievedFile>,
    frozen: Option<ChatMessage>,
}

impl MessageAccumulator {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            message_id: temp_id("resp"),
            content: String::new(),
            retrieved_memories: Vec::new(),
            retrieved_files: Vec::new(),
            frozen: None,
        }
    }

    /// Append a content delta. Returns `true` if the content changed
    /// (empty deltas and post-finalize deltas are no-ops).
    pub fn apply_delta(&mut self, delta: &str) -> bool {
        if self.frozen.is_some() || delta.is_empty() {
            return false;
        }
        self.content.push_str(delta);
        true
    }

    /// Replace accumulated content wholesale. Used only for the terminal
    /// full-content recovery path, and only while nothing has accumulated.
    pub fn adopt_content(&mut self, content: &str) -> bool {
        if self.frozen.is_some() || !self.content.is_empty() || content.is_empty() {
            return false;
        }
        self.content.push_str(content);
        true
    }

    /// Last-write-wins server message id.
    pub fn set_message_id(&mut self, id: &str) {
        if self.frozen.is_none() && !id.is_empty() {
            self.message_id = id.to_string();
        }
    }

    /// Citations arrive as full snapshots, not deltas: overwrite.
    pub fn overwrite_metadata(
        &mut self,
        memories: Option<Vec<Memory>>,
        files: Option<Vec<RetrievedFile>>,
    ) {
        if self.frozen.is_some() {
            return;
        }
        if let Some(memories) = memories {
            self.retrieved_memories = memories;
        }
        if let Some(files) = files {
            self.retrieved_files = files;
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.frozen.is_some()
    }

    /// Live snapshot of the in-progress message, for incremental UI update.
    pub fn snapshot(&self) -> ChatMessage {
        if let Some(ref frozen) = self.frozen {
            return frozen.clone();
        }
        let mut msg = ChatMessage::new(
            self.message_id.clone(),
            self.thread_id.clone(),
            Role::Assistant,
            self.content.clone(),
        );
        msg.retrieved_memories = self.retrieved_memories.clone();
        msg.retrieved_files = self.retrieved_files.clone();
        msg
    }

    /// Freeze the message and return the terminal snapshot. Idempotent:
    /// the snapshot is taken once and every later call returns a clone of
    /// that same frozen value.
    pub fn finalize(&mut self) -> ChatMessage {
        if self.frozen.is_none() {
            self.frozen = Some(self.snapshot());
        }
        self.frozen.clone().unwrap_or_else(|| self.snapshot())
    }
}
