//! Client engine for the Backboard assistant API.
//!
//! Provides:
//! - A typed REST client (assistants, threads, messages, document status)
//! - SSE streaming with incremental message reconstruction
//! - Document-indexing status polling
//! - Chat session orchestration (streaming + non-streaming turns)
//! - Best-effort thread-title persistence

pub mod accumulator;
pub mod api;
pub mod config;
pub mod indexing;
pub mod interpreter;
pub mod session;
pub mod streaming;
pub mod titles;

pub use accumulator::MessageAccumulator;
pub use api::{BackboardClient, FileUpload, SendMessageRequest, SendReply};
pub use config::BackboardConfig;
pub use indexing::{DocumentStatusSource, IndexingEvent, IndexingPoller, POLL_INTERVAL};
pub use interpreter::{StreamInterpreter, StreamSignal};
pub use session::{ActiveThread, ChatSession, TurnOutcome};
pub use streaming::{parse_sse_line, LineBuffer, SseLine};
pub use titles::{derive_title, FileTitleStore, TitleCache, TitleStore};
