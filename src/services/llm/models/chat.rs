use serde::{Deserialize, Serialize};

use crate::{services::llm::models::base::BaseRequest, Message, Tool};

#[derive(Serialize, Debug, Clone)]
pub struct ChatRequest {
    #[serde(flatten)]
    pub base: BaseRequest,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ChatResponse {
    pub model: String,
    pub created_at: String,
    pub message: Message,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u32>,
}

/// One increment of a streamed reply. The last chunk has `done == true`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatStreamChunk {
    pub model: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
}

impl ChatStreamChunk {
    pub fn content(model: impl Into<String>, created_at: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            created_at: created_at.into(),
            message: Some(Message::assistant(text)),
            done: false,
            done_reason: None,
        }
    }

    pub fn finished(done_reason: impl Into<String>) -> Self {
        Self {
            model: String::new(),
            created_at: String::new(),
            message: None,
            done: true,
            done_reason: Some(done_reason.into()),
        }
    }

    /// Text carried by this chunk, if any.
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.content.as_deref())
            .filter(|s| !s.is_empty())
    }
}
