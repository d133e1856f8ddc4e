use std::{collections::HashMap, fmt, future::Future, pin::Pin, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ToolExecutionError;
use crate::capabilities::CapabilityResult;

/// Defines the type of tool available. Currently, only 'function' is supported.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Function,
}

/// Signature for an asynchronous tool executor function.
///
/// Accepts the decoded JSON arguments and produces a [`CapabilityResult`],
/// or a [`ToolExecutionError`] when the call itself is unusable.
pub type AsyncToolFn = Arc<
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<CapabilityResult, ToolExecutionError>> + Send>>
        + Send
        + Sync,
>;

/// Wraps an async closure into an [`AsyncToolFn`].
pub fn tool_fn<F, Fut>(f: F) -> AsyncToolFn
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CapabilityResult, ToolExecutionError>> + Send + 'static,
{
    Arc::new(
        move |args: Value| -> Pin<Box<dyn Future<Output = Result<CapabilityResult, ToolExecutionError>> + Send>> {
            Box::pin(f(args))
        },
    )
}

/// A capability offered to the model: its descriptor plus the code that runs it.
///
/// Serializes to the `{"type":"function","function":{...}}` descriptor; the
/// executor never leaves the process.
#[derive(Serialize, Clone)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: Function,
    #[serde(skip)]
    pub executor: AsyncToolFn,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("tool_type", &self.tool_type)
            .field("function", &self.function)
            .field("executor", &"<async_fn>")
            .finish()
    }
}

impl Tool {
    /// Runs the executor on its own task. A panic inside it surfaces as
    /// [`ToolExecutionError::ExecutionFailed`] instead of tearing down the caller.
    pub async fn execute(&self, args: Value) -> Result<CapabilityResult, ToolExecutionError> {
        tokio::spawn((self.executor)(args)).await?
    }

    /// Gets the name of the tool from its function definition.
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Defines a function, its description, and its arguments.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Function {
    pub name: String,
    pub description: String,
    pub parameters: FunctionParameters,
}

/// Defines the arguments for a function using a JSON schema-like structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FunctionParameters {
    #[serde(rename = "type")]
    pub param_type: String,
    pub properties: HashMap<String, Property>,
    pub required: Vec<String>,
}

/// Defines a single property within function arguments.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Property {
    #[serde(rename = "type")]
    pub property_type: String,
    pub description: String,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

/// Represents a tool call requested by the model.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolCall {
    /// Identifier the tool result must echo back.
    ///
    /// Ollama never sends one; the orchestrator fills it in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "default_tool_call_type")]
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: ToolCallFunction,
}

fn default_tool_call_type() -> ToolType {
    ToolType::Function
}

/// Contains the name and the JSON-encoded arguments for a function call.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: String,
}

impl ToolCallFunction {
    /// Decodes the argument blob. An empty blob is treated as `{}`.
    pub fn parsed_arguments(&self) -> Result<Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&self.arguments)
    }
}
