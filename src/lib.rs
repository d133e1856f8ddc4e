pub(crate) mod services;
pub mod capabilities;
pub mod observability;
pub mod orchestrator;
pub mod tools;

pub use tools::*;

pub use capabilities::{Capability, CapabilityResult, Catalog, WikipediaClient};
pub use observability::init_default_tracing;
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorError, QueryOutcome};
pub use services::llm::models::{
    BaseRequest, ChatRequest, ChatResponse, ChatStreamChunk, InferenceOptions, Message,
    ModelClientError, Role,
};
pub use services::llm::{ChatModel, ChatStream, ClientBuilder, ClientConfig, InferenceClient, Provider};
