//! Chat-message rows written alongside each run.
//!
//! The engine writes two rows per run (the user message and the API
//! message) and on resume clears the `action` field of the most recent
//! actionable row. Persistence beyond this trait belongs to the host.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One `{role, content}` pair of the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    #[default]
    #[serde(rename = "userMessage")]
    UserMessage,
    #[serde(rename = "apiMessage")]
    ApiMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub agentflow_id: String,
    pub chat_id: String,
    pub session_id: String,
    pub content: String,
    /// Human-input action descriptor, populated while a pause awaits the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_documents: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_tools: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_annotations: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Value>,
    pub created_date: DateTime<Utc>,
}

/// A chat message about to be persisted; the store assigns id and timestamp
/// unless the caller fixed them (the API message id doubles as
/// `apiMessageId` in the `$flow` namespace, so it is minted up front).
#[derive(Debug, Clone, Default)]
pub struct NewChatMessage {
    pub id: Option<String>,
    pub role: ChatRole,
    pub agentflow_id: String,
    pub chat_id: String,
    pub session_id: String,
    pub content: String,
    pub action: Option<Value>,
    pub source_documents: Option<Value>,
    pub used_tools: Option<Value>,
    pub file_annotations: Option<Value>,
    pub artifacts: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatStoreError {
    #[error("Chat storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait ChatMessageStore: Send + Sync {
    async fn add(&self, message: NewChatMessage) -> Result<ChatMessage, ChatStoreError>;

    /// Clear the `action` field on the most recent row of this chat that has
    /// one. Called when a resume consumes the pending human-input action.
    async fn clear_latest_action(&self, chat_id: &str) -> Result<(), ChatStoreError>;
}

#[derive(Default)]
pub struct MemoryChatMessageStore {
    messages: tokio::sync::RwLock<Vec<ChatMessage>>,
}

impl MemoryChatMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl ChatMessageStore for MemoryChatMessageStore {
    async fn add(&self, message: NewChatMessage) -> Result<ChatMessage, ChatStoreError> {
        let row = ChatMessage {
            id: message.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            role: message.role,
            agentflow_id: message.agentflow_id,
            chat_id: message.chat_id,
            session_id: message.session_id,
            content: message.content,
            action: message.action,
            source_documents: message.source_documents,
            used_tools: message.used_tools,
            file_annotations: message.file_annotations,
            artifacts: message.artifacts,
            created_date: Utc::now(),
        };
        self.messages.write().await.push(row.clone());
        Ok(row)
    }

    async fn clear_latest_action(&self, chat_id: &str) -> Result<(), ChatStoreError> {
        let mut messages = self.messages.write().await;
        if let Some(row) = messages
            .iter_mut()
            .rev()
            .find(|m| m.chat_id == chat_id && m.action.is_some())
        {
            row.action = None;
        }
        Ok(())
    }
}
