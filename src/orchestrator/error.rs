use crate::{capabilities::Capability, ModelClientError, ToolExecutionError};

/// Everything that can abort a query.
#[derive(Debug)]
pub enum OrchestratorError {
    /// The model service call failed or its stream broke.
    Model(ModelClientError),
    /// The model's argument blob for `tool` is not valid JSON.
    Arguments { tool: String, source: serde_json::Error },
    /// The capability was selected but no tool for it was registered.
    CapabilityUnavailable(Capability),
    /// Tool lookup or execution failure, including a call to a tool that was not offered.
    Tool(ToolExecutionError),
    /// A capability result could not be encoded for the conversation.
    Serialization(serde_json::Error),
    /// Writing to the console failed.
    Output(std::io::Error),
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorError::Model(e) => write!(f, "{e}"),
            OrchestratorError::Arguments { tool, source } => {
                write!(f, "Invalid arguments for {tool}: {source}")
            }
            OrchestratorError::CapabilityUnavailable(c) => {
                write!(f, "No tool registered for capability {}", c.tool_name())
            }
            OrchestratorError::Tool(e) => write!(f, "{e}"),
            OrchestratorError::Serialization(e) => write!(f, "Serialization error: {e}"),
            OrchestratorError::Output(e) => write!(f, "Output error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OrchestratorError::Model(e) => Some(e),
            OrchestratorError::Arguments { source, .. } => Some(source),
            OrchestratorError::CapabilityUnavailable(_) => None,
            OrchestratorError::Tool(e) => Some(e),
            OrchestratorError::Serialization(e) => Some(e),
            OrchestratorError::Output(e) => Some(e),
        }
    }
}

impl From<ModelClientError> for OrchestratorError {
    fn from(err: ModelClientError) -> Self {
        OrchestratorError::Model(err)
    }
}

impl From<ToolExecutionError> for OrchestratorError {
    fn from(err: ToolExecutionError) -> Self {
        OrchestratorError::Tool(err)
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        OrchestratorError::Serialization(err)
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(err: std::io::Error) -> Self {
        OrchestratorError::Output(err)
    }
}
