use std::{pin::Pin, sync::Arc};

use async_trait::async_trait;
use futures::Stream;

use crate::services::llm::{
    models::{
        chat::{ChatRequest, ChatResponse, ChatStreamChunk},
        errors::ModelClientError,
    },
    ClientConfig,
};

use super::providers::{ollama::OllamaClient, openai::OpenAiCompatibleClient};

/// Ordered, finite sequence of reply increments from the model service.
pub type ChatStream =
    Pin<Box<dyn Stream<Item = Result<ChatStreamChunk, ModelClientError>> + Send + 'static>>;

/// The chat-completion boundary the orchestrator talks to.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One complete, non-streamed reply.
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ModelClientError>;

    /// A streamed reply; the stream ends when the service closes it.
    async fn chat_stream(&self, req: ChatRequest) -> Result<ChatStream, ModelClientError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Provider {
    /// Any `/v1/chat/completions` server, LM Studio by default.
    #[default]
    OpenAiCompatible,
    Ollama,
}

#[derive(Debug, Clone)]
enum ClientInner {
    OpenAiCompatible(OpenAiCompatibleClient),
    Ollama(OllamaClient),
}

#[derive(Clone, Debug)]
pub struct InferenceClient {
    config: ClientConfig,
    inner: Arc<ClientInner>,
}

impl InferenceClient {
    pub fn get_config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl ChatModel for InferenceClient {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ModelClientError> {
        match &*self.inner {
            ClientInner::OpenAiCompatible(c) => c.chat(req).await,
            ClientInner::Ollama(c) => c.chat(req).await,
        }
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<ChatStream, ModelClientError> {
        match &*self.inner {
            ClientInner::OpenAiCompatible(c) => c.chat_stream(req).await,
            ClientInner::Ollama(c) => c.chat_stream(req).await,
        }
    }
}

impl TryFrom<ClientConfig> for InferenceClient {
    type Error = ModelClientError;

    fn try_from(cfg: ClientConfig) -> Result<Self, Self::Error> {
        let config = cfg.clone();
        let Some(provider) = cfg.provider else {
            return Err(ModelClientError::Config("Provider not defined".into()));
        };
        let inner = match provider {
            Provider::OpenAiCompatible => {
                ClientInner::OpenAiCompatible(OpenAiCompatibleClient::new(cfg)?)
            }
            Provider::Ollama => ClientInner::Ollama(OllamaClient::new(cfg)?),
        };
        Ok(Self {
            config,
            inner: Arc::new(inner),
        })
    }
}
