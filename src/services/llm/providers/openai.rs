use async_stream::try_stream;
use futures::StreamExt;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, span, Instrument, Level, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::services::llm::client::ChatStream;
use crate::services::llm::models::chat::{ChatRequest, ChatResponse, ChatStreamChunk};
use crate::services::llm::models::errors::ModelClientError;
use crate::services::llm::ClientConfig;
use crate::{Message, Tool, ToolCall};

pub const DEFAULT_OPENAI_COMPATIBLE_URL: &str = "http://localhost:1234/v1";

/// Client for servers speaking the `/chat/completions` dialect
/// (LM Studio, llama.cpp server, vLLM, ...).
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(cfg: ClientConfig) -> Result<Self, ModelClientError> {
        let base_url = cfg
            .base_url
            .unwrap_or_else(|| DEFAULT_OPENAI_COMPATIBLE_URL.to_string());

        let mut headers = HeaderMap::new();
        // Local servers usually run without a key.
        if let Some(api_key) = cfg.api_key.filter(|k| !k.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .map_err(|e| ModelClientError::Config(format!("Invalid api_key header: {e}")))?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(extra) = cfg.extra_headers {
            for (k, v) in extra.into_iter() {
                let name = HeaderName::from_bytes(k.as_bytes())
                    .map_err(|_| ModelClientError::Config(format!("Invalid header name: {k}")))?;
                let value = HeaderValue::from_str(&v)
                    .map_err(|_| ModelClientError::Config(format!("Invalid header value for {k}")))?;
                headers.insert(name, value);
            }
        }

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self { client, base_url })
    }

    async fn chat_inner(&self, req: ChatRequest, stream: bool) -> Result<reqwest::Response, ModelClientError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut body = OaiChatRequest::from(req);
        body.stream = stream;

        let observation = if stream {
            "POST (Stream) /chat/completions"
        } else {
            "POST /chat/completions"
        };
        let span = span!(
            Level::INFO,
            "OpenAI-compatible HTTP Request",
            "langfuse.observation.name" = observation,
            "langfuse.observation.type" = "generation",
            "gen_ai.request.model" = body.model.as_str(),
            "http.request.method" = "POST",
            "url.full" = url.as_str(),
            "server.address" = self.base_url.as_str(),
        );

        if let Ok(input) = serde_json::to_string(&body.messages) {
            span.set_attribute("langfuse.observation.input", input);
        }

        async {
            let resp = self.client.post(&url).json(&body).send().await.map_err(|e| {
                Span::current().set_status(opentelemetry::trace::Status::Error {
                    description: e.to_string().into(),
                });
                ModelClientError::from(e)
            })?;

            let status = resp.status();
            Span::current().set_attribute("http.response.status_code", status.as_u16() as i64);
            if !status.is_success() {
                Span::current().set_status(opentelemetry::trace::Status::Error {
                    description: format!("HTTP {status}").into(),
                });
            }
            Ok::<_, ModelClientError>(resp)
        }
        .instrument(span)
        .await
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ModelClientError> {
        let resp = self.chat_inner(req, false).await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            error!(%status, body = %text, "request failed");
            if let Some(e) = parse_error_envelope(&text) {
                return Err(e);
            }
            return Err(ModelClientError::Api(format!("Request failed: {status} - {text}")));
        }

        // HTTP 200 but body is an error envelope
        if let Some(e) = parse_error_envelope(&text) {
            return Err(e);
        }

        let oai: OaiChatResponse = serde_json::from_str(&text)
            .map_err(|e| ModelClientError::Serialization(format!("decode error: {e}; raw: {text}")))?;

        let choice = oai.choices.into_iter().next();
        let done_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let message = match choice {
            Some(OaiChoice { message, .. }) => match message.tool_calls.filter(|calls| !calls.is_empty()) {
                Some(calls) => Message::assistant_tool_calls(message.content, calls),
                None => Message::assistant(message.content.unwrap_or_default()),
            },
            None => Message::assistant(String::new()),
        };

        Ok(ChatResponse {
            model: oai.model,
            created_at: oai.created.to_string(),
            message,
            done: true,
            done_reason,
            prompt_eval_count: oai.usage.as_ref().and_then(|u| u.prompt_tokens),
            eval_count: oai.usage.as_ref().and_then(|u| u.completion_tokens),
        })
    }

    pub async fn chat_stream(&self, req: ChatRequest) -> Result<ChatStream, ModelClientError> {
        let resp = self.chat_inner(req, true).await?;
        let status = resp.status();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            if let Some(e) = parse_error_envelope(&text) {
                return Err(e);
            }
            return Err(ModelClientError::Api(format!("Request failed: {status} - {text}")));
        }

        let byte_stream = resp.bytes_stream();
        let s = try_stream! {
            let mut buf = Vec::<u8>::new();
            futures::pin_mut!(byte_stream);

            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk.map_err(|e| ModelClientError::Request(e.to_string()))?;
                buf.extend_from_slice(&chunk);

                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line).trim().to_string();

                    match parse_sse_line(&line)? {
                        SseEvent::Skip => continue,
                        SseEvent::Done => {
                            yield ChatStreamChunk::finished("stop");
                            return;
                        }
                        SseEvent::Chunk(chunk) => yield chunk,
                    }
                }
            }

            yield ChatStreamChunk::finished("eof");
        };

        Ok(Box::pin(s))
    }
}

enum SseEvent {
    Skip,
    Done,
    Chunk(ChatStreamChunk),
}

/// Interprets one trimmed line of the event stream.
fn parse_sse_line(line: &str) -> Result<SseEvent, ModelClientError> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(SseEvent::Skip);
    }
    let Some(data) = line.strip_prefix("data:").map(str::trim) else {
        return Ok(SseEvent::Skip);
    };

    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    // if the SSE data payload is an error envelope, surface it and stop
    if let Some(e) = parse_error_envelope(data) {
        return Err(e);
    }

    let parsed: OaiStreamChunk = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            debug!(err = %e, raw = %data, "stream json decode error");
            return Ok(SseEvent::Skip);
        }
    };

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();

    Ok(SseEvent::Chunk(ChatStreamChunk::content(
        parsed.model,
        parsed.created.to_string(),
        text,
    )))
}

#[derive(Serialize)]
struct OaiChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i32>,
}

impl From<ChatRequest> for OaiChatRequest {
    fn from(value: ChatRequest) -> Self {
        let ChatRequest { base, messages, tools } = value;
        let options = base.options.unwrap_or_default();
        Self {
            model: base.model,
            messages,
            tools: tools.filter(|t| !t.is_empty()),
            stream: base.stream.unwrap_or(false),
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            seed: options.seed,
        }
    }
}

#[derive(Deserialize)]
struct OaiChatResponse {
    #[serde(default)]
    created: u64,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<OaiChoice>,
    #[serde(default)]
    usage: Option<OaiUsage>,
}

#[derive(Deserialize)]
struct OaiChoice {
    message: OaiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OaiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct OaiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct OaiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OaiDeltaChoice {
    delta: OaiDelta,
}

#[derive(Deserialize)]
struct OaiStreamChunk {
    #[serde(default)]
    created: u64,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<OaiDeltaChoice>,
}

#[derive(Deserialize, Debug)]
struct OaiErrorEnvelope {
    error: OaiErrorBody,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum OaiErrorBody {
    Detailed {
        message: String,
        #[serde(default)]
        code: Option<serde_json::Value>,
    },
    Plain(String),
}

fn parse_error_envelope(text: &str) -> Option<ModelClientError> {
    let s = text.trim_start();
    if !s.starts_with('{') || !s.contains("\"error\"") {
        return None;
    }
    match serde_json::from_str::<OaiErrorEnvelope>(s).ok()?.error {
        OaiErrorBody::Detailed { message, code: Some(code) } => {
            Some(ModelClientError::Api(format!("error {code}: {message}")))
        }
        OaiErrorBody::Detailed { message, code: None } | OaiErrorBody::Plain(message) => {
            Some(ModelClientError::Api(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::models::base::{BaseRequest, InferenceOptions};

    #[test]
    fn request_flattens_options_and_keeps_tool_linkage() {
        let assistant = Message::assistant_tool_calls(
            None,
            vec![serde_json::from_str(
                r#"{"id":"call_1","type":"function","function":{"name":"search_products","arguments":"{\"query\":\"dell\"}"}}"#,
            )
            .unwrap()],
        );

        let req = ChatRequest {
            base: BaseRequest {
                model: "qwen2.5-7b-instruct".into(),
                options: Some(InferenceOptions { temperature: Some(0.2), ..Default::default() }),
                stream: Some(true),
            },
            messages: vec![Message::user("hi"), assistant, Message::tool("{}", "call_1")],
            tools: None,
        };

        let json = serde_json::to_value(OaiChatRequest::from(req)).unwrap();
        assert_eq!(json["model"], "qwen2.5-7b-instruct");
        assert_eq!(json["stream"], true);
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert!(json.get("tools").is_none());
        assert_eq!(json["messages"][1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(json["messages"][1]["tool_calls"][0]["function"]["arguments"], "{\"query\":\"dell\"}");
        assert_eq!(json["messages"][2]["tool_call_id"], "call_1");
    }

    #[test]
    fn response_with_tool_calls_decodes() {
        let raw = r#"{"id":"chatcmpl-1","object":"chat.completion","created":1700000000,"model":"qwen","choices":[{"index":0,"message":{"role":"assistant","content":null,"tool_calls":[{"id":"365174485","type":"function","function":{"name":"search_products","arguments":"{\"query\":\"Dell\",\"max_price\":30}"}}]},"finish_reason":"tool_calls"}],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let parsed: OaiChatResponse = serde_json::from_str(raw).unwrap();
        let choice = &parsed.choices[0];
        let calls = choice.message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id.as_deref(), Some("365174485"));
        assert_eq!(calls[0].function.name, "search_products");
        assert_eq!(choice.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(parsed.usage.unwrap().completion_tokens, Some(5));
    }

    #[test]
    fn sse_lines_are_classified() {
        assert!(matches!(parse_sse_line("").unwrap(), SseEvent::Skip));
        assert!(matches!(parse_sse_line(": keep-alive").unwrap(), SseEvent::Skip));
        assert!(matches!(parse_sse_line("data: [DONE]").unwrap(), SseEvent::Done));

        let line = r#"data: {"id":"c","created":1,"model":"qwen","choices":[{"index":0,"delta":{"content":"Hel"}}]}"#;
        let SseEvent::Chunk(chunk) = parse_sse_line(line).unwrap() else {
            panic!("expected chunk");
        };
        assert_eq!(chunk.text(), Some("Hel"));
        assert!(!chunk.done);
    }

    #[test]
    fn sse_error_payload_is_surfaced() {
        let err = parse_sse_line(r#"data: {"error":{"message":"model not loaded","code":404}}"#)
            .err()
            .unwrap();
        assert!(err.to_string().contains("model not loaded"));
    }

    #[test]
    fn plain_string_error_envelope() {
        let err = parse_error_envelope(r#"{"error":"No models loaded"}"#).unwrap();
        assert_eq!(err.to_string(), "API Error: No models loaded");
        assert!(parse_error_envelope("plain text").is_none());
    }
}
