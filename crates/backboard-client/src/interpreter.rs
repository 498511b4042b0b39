//! SSE event interpretation and incremental message reconstruction.
//!
//! The upstream stream is loosely framed: payloads may be JSON or plain
//! text, deltas arrive under several field names, the user's own message is
//! sometimes echoed back, and completion can be signalled by a terminal
//! event name or by the literal `[DONE]` sentinel. [`StreamInterpreter`]
//! normalizes all of that into a small set of [`StreamSignal`]s while
//! building the assistant message in a [`MessageAccumulator`].

use serde_json::Value;
use tracing::debug;

use backboard_common::{Attachment, ChatMessage, DocumentStatus, Memory, RetrievedFile};

use crate::accumulator::MessageAccumulator;
use crate::streaming::{parse_sse_line, SseLine};

/// Event names that signal the logical end of the stream.
const TERMINAL_EVENTS: &[&str] = &["done", "end", "complete", "message_stop", "message_complete"];

/// Sentinel data payload that ends the stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Fallback order for content-delta fields in a JSON payload.
const DELTA_FIELDS: &[&str] = &["content", "delta", "text", "chunk"];

/// Side effects of interpreting one line, surfaced to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    /// Accumulated content changed; carries a live snapshot for UI update.
    ContentUpdated(ChatMessage),
    /// Retrieved-memory or retrieved-file citations were replaced.
    MetadataUpdated,
    /// An attachment in non-terminal status should be polled to completion.
    TrackDocument(Attachment),
    /// The stream ended. Raised exactly once per stream.
    Completed,
}

/// Per-stream interpretation state: the current event name (persisting
/// across consecutive `data:` lines) and the one-way completed flag.
#[derive(Debug)]
pub struct StreamInterpreter {
    current_event: String,
    completed: bool,
    acc: MessageAccumulator,
}

impl StreamInterpreter {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            current_event: String::new(),
            completed: false,
            acc: MessageAccumulator::new(thread_id),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Live snapshot of the message built so far.
    pub fn snapshot(&self) -> ChatMessage {
        self.acc.snapshot()
    }

    /// Freeze and return the final message. Used both after a terminal
    /// signal and when the transport closes without one (the stream is then
    /// treated as normally completed with whatever content accumulated).
    pub fn finalize(&mut self) -> ChatMessage {
        self.completed = true;
        self.acc.finalize()
    }

    /// Interpret one raw line from the stream.
    pub fn process_line(&mut self, line: &str) -> Vec<StreamSignal> {
        if line.is_empty() {
            // Blank line ends the current SSE event frame.
            self.current_event.clear();
            return Vec::new();
        }

        match parse_sse_line(line) {
            None => Vec::new(),
            Some(SseLine::Event(name)) => {
                self.current_event = name;
                Vec::new()
            }
            Some(SseLine::Data(payload)) => self.process_data(&payload),
        }
    }

    fn process_data(&mut self, payload: &str) -> Vec<StreamSignal> {
        if payload == DONE_SENTINEL {
            return self.mark_completed();
        }
        if self.completed {
            // Trailing data after completion is ignored, not an error.
            return Vec::new();
        }

        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(_) => {
                // Plain-text payloads are not role-tagged: append as-is.
                let mut signals = Vec::new();
                if self.acc.apply_delta(payload) {
                    signals.push(StreamSignal::ContentUpdated(self.acc.snapshot()));
                }
                return signals;
            }
        };

        // Echo of the user's own submitted message: discard entirely.
        if value.get("role").and_then(Value::as_str) == Some("user") {
            debug!("discarding echoed user message from stream");
            return Vec::new();
        }

        let mut signals = Vec::new();

        if let Some(id) = value.get("message_id").and_then(Value::as_str) {
            self.acc.set_message_id(id);
        }

        let memories = extract_list::<Memory>(&value, "retrieved_memories");
        let files = extract_list::<RetrievedFile>(&value, "retrieved_files");
        if memories.is_some() || files.is_some() {
            self.acc.overwrite_metadata(memories, files);
            signals.push(StreamSignal::MetadataUpdated);
        }

        if let Some(attachments) = extract_list::<Attachment>(&value, "attachments") {
            for doc in attachments {
                if doc.status != DocumentStatus::Indexed {
                    signals.push(StreamSignal::TrackDocument(doc));
                }
            }
        }

        if TERMINAL_EVENTS.contains(&self.current_event.as_str()) {
            // Some upstream variants deliver the whole answer only in the
            // terminal event. Adopt it as full content, but never override
            // content already built from deltas.
            if !self.acc.has_content() {
                if let Some(content) = value.get("content").and_then(Value::as_str) {
                    if self.acc.adopt_content(content) {
                        signals.push(StreamSignal::ContentUpdated(self.acc.snapshot()));
                    }
                }
            }
            signals.extend(self.mark_completed());
            return signals;
        }

        // Default branch: look for a content delta.
        if let Some(delta) = first_delta_field(&value) {
            let role = value.get("role").and_then(Value::as_str);
            if matches!(role, None | Some("assistant")) && self.acc.apply_delta(delta) {
                signals.push(StreamSignal::ContentUpdated(self.acc.snapshot()));
            }
        }

        signals
    }

    fn mark_completed(&mut self) -> Vec<StreamSignal> {
        if self.completed {
            return Vec::new();
        }
        self.completed = true;
        vec![StreamSignal::Completed]
    }
}

/// Deserialize an optional list field, tolerating malformed entries by
/// treating the whole field as absent.
fn extract_list<T: serde::de::DeserializeOwned>(value: &Value, field: &str) -> Option<Vec<T>> {
    value
        .get(field)
        .filter(|v| v.is_array())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// First non-empty string among the delta fallback fields.
fn first_delta_field(value: &Value) -> Option<&str> {
    DELTA_FIELDS
        .iter()
        .filter_map(|field| value.get(field).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(interp: &mut StreamInterpreter, lines: &[&str]) -> Vec<StreamSignal> {
        let mut signals = Vec::new();
        for line in lines {
            signals.extend(interp.process_line(line));
        }
        signals
    }

    fn content_updates(signals: &[StreamSignal]) -> usize {
        signals
            .iter()
            .filter(|s| matches!(s, StreamSignal::ContentUpdated(_)))
            .count()
    }

    #[test]
    fn assistant_deltas_concatenate_in_order() {
        let mut interp = StreamInterpreter::new("t1");
        feed(
            &mut interp,
            &[
                r#"data: {"content":"one "}"#,
                r#"data: {"content":"two "}"#,
                r#"data: {"content":"three"}"#,
            ],
        );
        assert_eq!(interp.snapshot().content, "one two three");
    }

    #[test]
    fn done_sentinel_completes_exactly_once() {
        let mut interp = StreamInterpreter::new("t1");
        let signals = feed(&mut interp, &["data: [DONE]", "data: [DONE]", "data: [DONE]"]);
        let completions = signals
            .iter()
            .filter(|s| matches!(s, StreamSignal::Completed))
            .count();
        assert_eq!(completions, 1);
        assert!(interp.is_completed());
    }

    #[test]
    fn data_after_completion_is_ignored() {
        let mut interp = StreamInterpreter::new("t1");
        feed(&mut interp, &[r#"data: {"content":"kept"}"#, "data: [DONE]"]);
        let signals = feed(&mut interp, &[r#"data: {"content":" dropped"}"#]);
        assert!(signals.is_empty());
        assert_eq!(interp.snapshot().content, "kept");
    }

    #[test]
    fn user_echo_is_never_appended() {
        let mut interp = StreamInterpreter::new("t1");
        let signals = feed(
            &mut interp,
            &[r#"data: {"role":"user","content":"my own question"}"#],
        );
        assert!(signals.is_empty());
        assert_eq!(interp.snapshot().content, "");
    }

    #[test]
    fn unknown_role_passes_through_unappended() {
        let mut interp = StreamInterpreter::new("t1");
        feed(&mut interp, &[r#"data: {"role":"tool","content":"output"}"#]);
        assert_eq!(interp.snapshot().content, "");
    }

    #[test]
    fn plain_text_payload_is_a_raw_delta() {
        let mut interp = StreamInterpreter::new("t1");
        let signals = feed(&mut interp, &["data: not json at all"]);
        assert_eq!(content_updates(&signals), 1);
        assert_eq!(interp.snapshot().content, "not json at all");
    }

    #[test]
    fn empty_data_payload_is_a_noop() {
        let mut interp = StreamInterpreter::new("t1");
        let signals = feed(&mut interp, &["data:"]);
        assert!(signals.is_empty());
        assert_eq!(interp.snapshot().content, "");
    }

    #[test]
    fn delta_field_fallback_order() {
        let mut interp = StreamInterpreter::new("t1");
        feed(
            &mut interp,
            &[
                r#"data: {"delta":"A"}"#,
                r#"data: {"text":"B"}"#,
                r#"data: {"chunk":"C"}"#,
                r#"data: {"content":"D","delta":"ignored"}"#,
            ],
        );
        assert_eq!(interp.snapshot().content, "ABCD");
    }

    #[test]
    fn empty_delta_fields_are_skipped() {
        let mut interp = StreamInterpreter::new("t1");
        feed(&mut interp, &[r#"data: {"content":"","delta":"real"}"#]);
        assert_eq!(interp.snapshot().content, "real");
    }

    #[test]
    fn stream_without_event_lines() {
        // No `event:` line at all, just deltas plus the sentinel.
        let mut interp = StreamInterpreter::new("t1");
        let signals = feed(
            &mut interp,
            &[r#"data: {"delta":"A"}"#, r#"data: {"delta":"B"}"#, "data: [DONE]"],
        );
        assert_eq!(interp.snapshot().content, "AB");
        assert!(signals.contains(&StreamSignal::Completed));
    }

    #[test]
    fn terminal_event_does_not_override_accumulated_content() {
        // A delta is already present, so the terminal event's full
        // content must not replace it.
        let mut interp = StreamInterpreter::new("t1");
        feed(
            &mut interp,
            &[
                "event: content",
                r#"data: {"content":"Hi"}"#,
                "event: done",
                r#"data: {"content":"Hi there","retrieved_files":[]}"#,
                "data: [DONE]",
            ],
        );
        let final_msg = interp.finalize();
        assert_eq!(final_msg.content, "Hi");
    }

    #[test]
    fn terminal_event_adopts_content_when_nothing_accumulated() {
        let mut interp = StreamInterpreter::new("t1");
        let signals = feed(
            &mut interp,
            &["event: done", r#"data: {"content":"whole answer"}"#],
        );
        assert_eq!(interp.snapshot().content, "whole answer");
        assert!(signals.contains(&StreamSignal::Completed));
        assert_eq!(content_updates(&signals), 1);
    }

    #[test]
    fn all_terminal_event_names_complete() {
        for name in ["done", "end", "complete", "message_stop", "message_complete"] {
            let mut interp = StreamInterpreter::new("t1");
            let signals = feed(
                &mut interp,
                &[&format!("event: {name}"), "data: {}"],
            );
            assert!(
                signals.contains(&StreamSignal::Completed),
                "event {name} should complete the stream"
            );
        }
    }

    #[test]
    fn event_name_persists_across_data_lines_until_blank() {
        let mut interp = StreamInterpreter::new("t1");
        // Blank line resets the frame, so the later data line is no longer
        // under the metadata event and falls into the delta branch.
        feed(
            &mut interp,
            &[
                "event: metadata",
                r#"data: {"retrieved_memories":[]}"#,
                "",
                r#"data: {"content":"after"}"#,
            ],
        );
        assert_eq!(interp.snapshot().content, "after");
    }

    #[test]
    fn message_id_last_write_wins() {
        let mut interp = StreamInterpreter::new("t1");
        feed(
            &mut interp,
            &[
                r#"data: {"message_id":"m-1","content":"x"}"#,
                r#"data: {"message_id":"m-2"}"#,
            ],
        );
        assert_eq!(interp.snapshot().message_id, "m-2");
    }

    #[test]
    fn metadata_snapshot_overwrite() {
        let mut interp = StreamInterpreter::new("t1");
        let signals = feed(
            &mut interp,
            &[
                "event: metadata",
                r#"data: {"retrieved_memories":[{"memory_id":"a","content":"x","created_at":"2024-01-01T00:00:00Z"}]}"#,
                r#"data: {"retrieved_memories":[{"memory_id":"b","content":"y","created_at":"2024-01-01T00:00:00Z"}]}"#,
            ],
        );
        let metadata_updates = signals
            .iter()
            .filter(|s| matches!(s, StreamSignal::MetadataUpdated))
            .count();
        assert_eq!(metadata_updates, 2);
        let snap = interp.snapshot();
        assert_eq!(snap.retrieved_memories.len(), 1);
        assert_eq!(snap.retrieved_memories[0].memory_id, "b");
    }

    #[test]
    fn pending_attachments_raise_track_signals() {
        let mut interp = StreamInterpreter::new("t1");
        let signals = feed(
            &mut interp,
            &[
                "event: done",
                r#"data: {"attachments":[
                    {"document_id":"d1","filename":"a.pdf","status":"pending"},
                    {"document_id":"d2","filename":"b.pdf","status":"indexed"},
                    {"document_id":"d3","filename":"c.pdf","status":"processing"}
                ]}"#,
            ],
        );
        let tracked: Vec<_> = signals
            .iter()
            .filter_map(|s| match s {
                StreamSignal::TrackDocument(doc) => Some(doc.document_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tracked, vec!["d1", "d3"]);
    }

    #[test]
    fn comment_lines_are_ignored() {
        let mut interp = StreamInterpreter::new("t1");
        let signals = feed(&mut interp, &[": keep-alive", r#"data: {"content":"ok"}"#]);
        assert_eq!(content_updates(&signals), 1);
        assert_eq!(interp.snapshot().content, "ok");
    }

    #[test]
    fn finalize_without_terminal_event() {
        // Transport closed without [DONE]: treat as normal completion with
        // whatever content accumulated.
        let mut interp = StreamInterpreter::new("t1");
        feed(&mut interp, &[r#"data: {"content":"partial"}"#]);
        let msg = interp.finalize();
        assert_eq!(msg.content, "partial");
        assert!(interp.is_completed());
        assert_eq!(interp.finalize(), msg);
    }

    #[test]
    fn cross_chunk_roundtrip_with_line_buffer() {
        // Bytes split mid-payload across two chunks, end to end.
        use crate::streaming::LineBuffer;

        let mut buf = LineBuffer::new();
        let mut interp = StreamInterpreter::new("t1");

        for chunk in [&b"event: delta\ndata: {\"content\":\"Hel"[..], &b"lo\"}\n\n"[..]] {
            for line in buf.push(chunk) {
                interp.process_line(&line);
            }
        }
        assert_eq!(interp.snapshot().content, "Hello");
    }
}
