pub mod errors;
pub mod id;
pub mod notifications;
pub mod types;

pub use errors::{ApiError, ClientError, StoreError};
pub use id::{new_id, temp_id};
pub use notifications::{Notification, NotificationLevel};
pub use types::{
    Assistant, Attachment, ChatMessage, DocumentStatus, DocumentStatusResponse, MemoryMode,
    Memory, MessageResponse, ModelConfig, RetrievedFile, Role, Thread,
};

pub type Result<T> = std::result::Result<T, ClientError>;
