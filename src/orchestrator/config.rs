use crate::InferenceOptions;

pub const DEFAULT_MODEL: &str = "qwen2.5-7b-instruct";

/// Model selection and sampling for every request of a query.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Identifier of the model loaded in the service.
    pub model: String,
    pub options: Option<InferenceOptions>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            options: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: InferenceOptions) -> Self {
        self.options = Some(options).filter(|o| !o.is_empty());
        self
    }
}
