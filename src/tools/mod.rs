mod errors;
mod tool;
mod tool_builder;

pub use errors::ToolExecutionError;
pub use tool::*;
pub use tool_builder::*;
