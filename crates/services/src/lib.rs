//! Persistence: named JSON blobs, the chat transcript and learner progress.

pub mod learner_store;
pub mod store;
pub mod transcript;

pub use learner_store::{LearnerStore, LEARNER_STATE_BLOB};
pub use store::{BlobStore, FileStore, MemoryStore};
pub use transcript::{LoadSource, TranscriptStore, CHAT_HISTORY_BLOB};
