/// Why a tool call could not produce a [`CapabilityResult`](crate::CapabilityResult).
///
/// Capability-level faults (network, no match) are not represented here;
/// they travel back to the model as an error-status result.
#[derive(Debug)]
pub enum ToolExecutionError {
    /// The argument blob does not fit the tool's parameter schema.
    ArgumentParsingError(String),
    /// The executor aborted (panicked or was cancelled) before returning.
    ExecutionFailed(String),
    /// The model named a tool that is not on offer.
    ToolNotFound(String),
}

impl std::fmt::Display for ToolExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolExecutionError::ArgumentParsingError(s) => write!(f, "Invalid tool arguments: {s}"),
            ToolExecutionError::ExecutionFailed(s) => write!(f, "Tool aborted: {s}"),
            ToolExecutionError::ToolNotFound(s) => write!(f, "Tool not offered: {s}"),
        }
    }
}

impl std::error::Error for ToolExecutionError {}

impl From<serde_json::Error> for ToolExecutionError {
    fn from(err: serde_json::Error) -> Self {
        ToolExecutionError::ArgumentParsingError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ToolExecutionError {
    fn from(err: tokio::task::JoinError) -> Self {
        ToolExecutionError::ExecutionFailed(err.to_string())
    }
}
