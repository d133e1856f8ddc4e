use async_stream::try_stream;
use futures::StreamExt;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{error, span, Instrument, Level, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::services::llm::client::ChatStream;
use crate::services::llm::models::{
    chat::{ChatRequest, ChatResponse, ChatStreamChunk},
    errors::ModelClientError,
};
use crate::services::llm::ClientConfig;
use crate::{Message, Role, Tool, ToolCall, ToolCallFunction, ToolType};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OllamaClient {
    pub client: Client,
    pub base_url: String,
}

impl OllamaClient {
    pub fn new(cfg: ClientConfig) -> Result<Self, ModelClientError> {
        let base_url = cfg.base_url.unwrap_or(DEFAULT_OLLAMA_URL.into());
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T, R>(&self, endpoint: &str, request_body: &T) -> Result<R, ModelClientError>
    where
        T: Serialize + fmt::Debug,
        R: DeserializeOwned + fmt::Debug,
    {
        let url = format!("{}{}", self.base_url, endpoint);

        let span = span!(
            Level::INFO,
            "Ollama HTTP Request",
            "langfuse.observation.name" = format!("POST {}", endpoint).as_str(),
            "langfuse.observation.type" = "span",
            "http.request.method" = "POST",
            "url.full" = url.as_str(),
            "server.address" = self.base_url.as_str(),
        );

        if let Ok(body) = serde_json::to_string(request_body) {
            span.set_attribute("langfuse.observation.input", body);
        }

        async {
            let response = self
                .client
                .post(&url)
                .json(request_body)
                .send()
                .await
                .map_err(|e| {
                    Span::current().set_status(opentelemetry::trace::Status::Error {
                        description: e.to_string().into(),
                    });
                    ModelClientError::Request(e.to_string())
                })?;

            let status = response.status();

            Span::current().set_attribute("http.response.status_code", status.as_u16() as i64);

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Failed to read error body".into());

                error!(%status, body = %error_text, "request failed");

                Span::current().set_status(opentelemetry::trace::Status::Error {
                    description: format!("HTTP {}", status).into(),
                });

                return Err(ModelClientError::Api(format!(
                    "Ollama request failed: {status} - {error_text}"
                )));
            }

            let response_text = response.text().await.map_err(|e| {
                ModelClientError::Request(format!("Failed to read response text: {e}"))
            })?;

            Span::current().set_attribute("langfuse.observation.output", response_text.clone());

            serde_json::from_str::<R>(&response_text).map_err(|e| {
                error!(%e, raw = %response_text, "deserialization error");
                Span::current().set_status(opentelemetry::trace::Status::Error {
                    description: "Deserialization Error".into(),
                });
                ModelClientError::Serialization(format!(
                    "Error decoding response body: {e}. Raw JSON was: '{response_text}'"
                ))
            })
        }
        .instrument(span)
        .await
    }

    async fn post_stream<T>(&self, endpoint: &str, body: &T) -> Result<ChatStream, ModelClientError>
    where
        T: Serialize + fmt::Debug,
    {
        let url = format!("{}{}", self.base_url, endpoint);

        let span = span!(
            Level::INFO,
            "Ollama HTTP stream",
            "langfuse.observation.name" = format!("POST (Stream) {}", endpoint).as_str(),
            "langfuse.observation.type" = "span",
            "http.request.method" = "POST",
            "url.full" = url.as_str(),
        );

        if let Ok(b) = serde_json::to_string(body) {
            span.set_attribute("langfuse.observation.input", b);
        }

        let stream_span = span.clone();

        let resp = async {
            let resp = self
                .client
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(|e| {
                    Span::current().set_status(opentelemetry::trace::Status::Error {
                        description: e.to_string().into(),
                    });
                    ModelClientError::Request(e.to_string())
                })?;

            let status = resp.status();
            Span::current().set_attribute("http.response.status_code", status.as_u16() as i64);

            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(ModelClientError::Api(format!("HTTP {status} - {text}")));
            }
            Ok(resp)
        }
        .instrument(span)
        .await?;

        let byte_stream = resp.bytes_stream();

        let s = try_stream! {
            let mut buf = Vec::<u8>::new();
            futures::pin_mut!(byte_stream);

            let mut chunk_count: i64 = 0;

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        stream_span.set_status(opentelemetry::trace::Status::Error {
                            description: e.to_string().into(),
                        });
                        Err(ModelClientError::Request(e.to_string()))?
                    }
                };

                buf.extend_from_slice(&chunk);

                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = &line[..line.len() - 1];
                    if line.is_empty() { continue; }

                    let parsed = match serde_json::from_slice::<OllamaChatResponse>(line) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            stream_span.set_status(opentelemetry::trace::Status::Error {
                                description: e.to_string().into(),
                            });
                            Err(ModelClientError::Serialization(e.to_string()))?
                        }
                    };

                    chunk_count += 1;
                    let chunk = parsed.into_chunk();
                    let done = chunk.done;
                    yield chunk;
                    if done {
                        stream_span.set_attribute("stream.chunk_count", chunk_count);
                        return;
                    }
                }
            }

            stream_span.set_attribute("stream.chunk_count", chunk_count);
        };

        Ok(Box::pin(s))
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ModelClientError> {
        let mut body = OllamaChatRequest::from(request);
        body.stream = false;
        let resp: OllamaChatResponse = self.post("/api/chat", &body).await?;
        Ok(resp.into_response())
    }

    pub async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, ModelClientError> {
        let mut body = OllamaChatRequest::from(request);
        body.stream = true;
        self.post_stream("/api/chat", &body).await
    }
}

#[derive(Serialize, Debug)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize, Debug, Default)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i32>,
}

impl From<ChatRequest> for OllamaChatRequest {
    fn from(value: ChatRequest) -> Self {
        let ChatRequest { base, messages, tools } = value;
        let options = base.options.filter(|o| !o.is_empty()).map(|o| OllamaOptions {
            temperature: o.temperature,
            top_p: o.top_p,
            num_predict: o.max_tokens,
            seed: o.seed,
        });
        Self {
            model: base.model,
            messages: messages.iter().map(OllamaMessage::from).collect(),
            tools: tools.filter(|t| !t.is_empty()),
            stream: base.stream.unwrap_or(false),
            options,
        }
    }
}

/// Ollama's message shape: tool-call arguments travel as JSON objects.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct OllamaMessage {
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OllamaToolCall {
    function: OllamaToolCallFunction,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OllamaToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl From<&Message> for OllamaMessage {
    fn from(msg: &Message) -> Self {
        let tool_calls = msg
            .tool_calls
            .iter()
            .flatten()
            .map(|call| OllamaToolCall {
                function: OllamaToolCallFunction {
                    name: call.function.name.clone(),
                    arguments: call
                        .function
                        .parsed_arguments()
                        .unwrap_or_else(|_| Value::String(call.function.arguments.clone())),
                },
            })
            .collect();

        Self {
            role: msg.role,
            content: msg.content.clone().unwrap_or_default(),
            tool_calls,
        }
    }
}

impl From<OllamaMessage> for Message {
    fn from(msg: OllamaMessage) -> Self {
        if msg.tool_calls.is_empty() {
            let mut out = Message::assistant(msg.content);
            out.role = msg.role;
            return out;
        }

        let calls = msg
            .tool_calls
            .into_iter()
            .map(|call| ToolCall {
                id: None,
                tool_type: ToolType::Function,
                function: ToolCallFunction {
                    name: call.function.name,
                    arguments: match call.function.arguments {
                        Value::String(raw) => raw,
                        Value::Null => "{}".to_string(),
                        other => other.to_string(),
                    },
                },
            })
            .collect();

        let content = Some(msg.content).filter(|c| !c.is_empty());
        Message::assistant_tool_calls(content, calls)
    }
}

#[derive(Deserialize, Debug)]
struct OllamaChatResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaChatResponse {
    fn into_response(self) -> ChatResponse {
        ChatResponse {
            model: self.model,
            created_at: self.created_at,
            message: self
                .message
                .map(Message::from)
                .unwrap_or_else(|| Message::assistant(String::new())),
            done: self.done,
            done_reason: self.done_reason,
            prompt_eval_count: self.prompt_eval_count,
            eval_count: self.eval_count,
        }
    }

    fn into_chunk(self) -> ChatStreamChunk {
        ChatStreamChunk {
            model: self.model,
            created_at: self.created_at,
            message: self.message.map(Message::from),
            done: self.done,
            done_reason: self.done_reason,
        }
    }
}
