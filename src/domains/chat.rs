use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domains::document::ChunkRef;
use crate::error::RagDeskError;

pub type ChatId = String;
pub type MessageId = String;

pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Chat,
    Rag,
    Summarize,
    Search,
}

impl ChatMode {
    pub const ALL: [ChatMode; 4] = [
        ChatMode::Chat,
        ChatMode::Rag,
        ChatMode::Summarize,
        ChatMode::Search,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Chat => "chat",
            ChatMode::Rag => "rag",
            ChatMode::Summarize => "summarize",
            ChatMode::Search => "search",
        }
    }

    /// Whether answers in this mode are grounded in the chat's documents.
    pub fn uses_documents(&self) -> bool {
        !matches!(self, ChatMode::Chat)
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatMode {
    type Err = RagDeskError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "chat" => Ok(ChatMode::Chat),
            "rag" => Ok(ChatMode::Rag),
            "summarize" | "summary" => Ok(ChatMode::Summarize),
            "search" => Ok(ChatMode::Search),
            other => Err(RagDeskError::Validation(format!("unknown mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    ThumbsUp,
    ThumbsDown,
    Star,
}

impl FromStr for Reaction {
    type Err = RagDeskError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "up" | "thumbs_up" | "like" => Ok(Reaction::ThumbsUp),
            "down" | "thumbs_down" | "dislike" => Ok(Reaction::ThumbsDown),
            "star" => Ok(Reaction::Star),
            other => Err(RagDeskError::Validation(format!(
                "unknown reaction '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub role: Role,
    pub timestamp: i64,
    pub mode: ChatMode,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub reactions: BTreeSet<Reaction>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<ChunkRef>,
}

impl Message {
    pub fn has_reaction(&self, reaction: Reaction) -> bool {
        self.reactions.contains(&reaction)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub mode: ChatMode,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Chat {
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// Renders the conversation as markdown, one heading per message.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n_mode: {}_\n", self.title, self.mode);
        for message in &self.messages {
            out.push_str(&format!(
                "\n## {} ({})\n\n{}\n",
                message.role,
                crate::domains::format_timestamp(message.timestamp),
                message.content.trim_end()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_text() {
        for mode in ChatMode::ALL {
            assert_eq!(mode.to_string().parse::<ChatMode>().unwrap(), mode);
        }
        assert_eq!("Summary".parse::<ChatMode>().unwrap(), ChatMode::Summarize);
        assert!("nope".parse::<ChatMode>().is_err());
        assert!(!ChatMode::Chat.uses_documents());
        assert!(ChatMode::Search.uses_documents());
    }

    #[test]
    fn message_serializes_without_empty_fields() {
        let message = Message {
            id: "m1".to_string(),
            content: "hi".to_string(),
            role: Role::User,
            timestamp: 1,
            mode: ChatMode::Rag,
            reactions: BTreeSet::new(),
            edited: false,
            parent_id: None,
            sources: Vec::new(),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["mode"], "rag");
        assert_eq!(value["role"], "user");
        assert!(value.get("reactions").is_none());
        assert!(value.get("parent_id").is_none());
    }
}
