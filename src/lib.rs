pub mod client;
pub mod config;
pub mod domains;
pub mod error;
pub mod factories;
pub mod interfaces;
pub mod presentation;
pub mod providers;
pub mod services;
pub mod store;

pub use crate::client::RagDesk;
pub use crate::config::Config;
pub use crate::domains::chat::{Chat, ChatMode, Message, Reaction, Role};
pub use crate::error::{RagDeskError, Result};
pub use crate::store::ChatStore;
