//! One round of tool calling: ask, run the requested tool, stream the answer.

mod config;
mod error;
pub mod report;
mod token_stream;

pub use config::{OrchestratorConfig, DEFAULT_MODEL};
pub use error::OrchestratorError;
pub use token_stream::TokenStream;

use std::collections::HashSet;
use std::io::Write;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    capabilities::{Capability, CapabilityResult},
    services::llm::{BaseRequest, ChatModel, ChatRequest},
    Message, Tool, ToolCall, ToolExecutionError,
};

/// A tool call the model made and what running it produced.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub call: ToolCall,
    pub result: CapabilityResult,
}

#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Every message exchanged, in order, ending with the final answer.
    pub conversation: Vec<Message>,
    /// Concatenation of the streamed fragments.
    pub answer: String,
    pub invocations: Vec<Invocation>,
    /// The answer stream was cut short by cancellation.
    pub cancelled: bool,
}

pub struct Orchestrator<M> {
    model: M,
    config: OrchestratorConfig,
    tools: Vec<Tool>,
    cancel: CancellationToken,
}

impl<M: ChatModel> Orchestrator<M> {
    pub fn new(model: M, config: OrchestratorConfig) -> Self {
        Self {
            model,
            config,
            tools: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Registers a tool. Its function name decides which capability it serves.
    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Cancelling this token ends any answer stream in progress.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs `query` against the model with only `capability` on offer,
    /// writing progress and the streamed answer to `out`.
    ///
    /// On failure the error is printed once as `Error: ...` and returned.
    pub async fn process_query<W: Write>(
        &self,
        query: &str,
        capability: Capability,
        out: &mut W,
    ) -> Result<QueryOutcome, OrchestratorError> {
        match self.run(query, capability, out).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(error = %e, "query failed");
                let _ = report::failure(out, &e);
                Err(e)
            }
        }
    }

    #[instrument(name = "orchestrator.query", skip_all, fields(capability = capability.tool_name()))]
    async fn run<W: Write>(
        &self,
        query: &str,
        capability: Capability,
        out: &mut W,
    ) -> Result<QueryOutcome, OrchestratorError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == capability.tool_name())
            .ok_or(OrchestratorError::CapabilityUnavailable(capability))?;

        let mut conversation = vec![Message::system(capability.persona()), Message::user(query)];

        report::query_header(out, query)?;
        report::thinking(out)?;

        let request = self.request(&conversation, Some(vec![tool.clone()]), false);
        let response = self.model.chat(request).await?;

        let mut invocations = Vec::new();
        let mut stream = if !response.message.has_tool_calls() {
            info!("model answered without calling a tool");
            report::direct(out)?;
            let text = response.message.content.clone().unwrap_or_default();
            TokenStream::from_text(text, self.cancel.child_token())
        } else {
            let calls = assign_call_ids(response.message.tool_calls.clone().unwrap_or_default());
            conversation.push(Message::assistant_tool_calls(
                response.message.content.clone(),
                calls.clone(),
            ));

            for call in calls {
                let result = self.invoke(tool, capability, &call, out).await?;
                let call_id = call.id.clone().unwrap_or_default();
                conversation.push(Message::tool(result.to_message_content()?, call_id));
                invocations.push(Invocation { call, result });
            }

            report::generating(out)?;
            let request = self.request(&conversation, None, true);
            TokenStream::new(self.model.chat_stream(request).await?, self.cancel.child_token())
        };

        let mut answer = String::new();
        while let Some(fragment) = stream.next_fragment().await {
            let fragment = fragment?;
            report::fragment(out, &fragment)?;
            answer.push_str(&fragment);
        }
        report::finish(out)?;

        if stream.is_cancelled() {
            warn!("answer stream cancelled");
        }

        conversation.push(Message::assistant(answer.clone()));

        Ok(QueryOutcome {
            conversation,
            answer,
            invocations,
            cancelled: stream.is_cancelled(),
        })
    }

    async fn invoke<W: Write>(
        &self,
        tool: &Tool,
        capability: Capability,
        call: &ToolCall,
        out: &mut W,
    ) -> Result<CapabilityResult, OrchestratorError> {
        let name = &call.function.name;
        if name != tool.name() {
            warn!(requested = %name, offered = tool.name(), "model called a tool that was not offered");
            return Err(ToolExecutionError::ToolNotFound(name.clone()).into());
        }

        let args = call
            .function
            .parsed_arguments()
            .map_err(|source| OrchestratorError::Arguments {
                tool: name.clone(),
                source,
            })?;

        info!(target: "tool", tool = %name, call_id = ?call.id, args = %args, "executing tool call");
        report::tool_call(out, capability, &args)?;

        let result = tool.execute(args).await?;
        info!(target: "tool", tool = %name, success = result.is_success(), "tool call finished");
        report::tool_result(out, capability, &result)?;

        Ok(result)
    }

    fn request(&self, conversation: &[Message], tools: Option<Vec<Tool>>, stream: bool) -> ChatRequest {
        ChatRequest {
            base: BaseRequest {
                model: self.config.model.clone(),
                options: self.config.options.clone(),
                stream: Some(stream),
            },
            messages: conversation.to_vec(),
            tools,
        }
    }
}

/// Gives every call a distinct id, generating one where the model left it
/// out or reused an earlier one.
fn assign_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            let usable = call
                .id
                .as_deref()
                .is_some_and(|id| !id.is_empty() && !seen.contains(id));
            if !usable {
                call.id = Some(format!("call_{}", Uuid::new_v4().simple()));
            }
            if let Some(id) = &call.id {
                seen.insert(id.clone());
            }
            call
        })
        .collect()
}
