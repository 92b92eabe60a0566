pub mod chat;
pub mod file;
pub mod progress;

pub use chat::{ChatMessage, MessageId, Role};
pub use file::{FileCandidate, FileId, FileRecord, FileSource, FileStatus, Preview, StatusUpdate};
pub use progress::{SessionProgress, TrainingState};
