pub mod chat;
pub mod library;
pub mod notifications;
pub mod sync;

pub use chat::{ChatOptions, ChatService};
pub use library::DocumentLibrary;
pub use notifications::{NoticeLevel, Notifier, UiEvent};
pub use sync::StoreSync;
