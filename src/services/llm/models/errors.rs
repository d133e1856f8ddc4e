/// Failures raised while talking to the model service.
#[derive(Debug)]
pub enum ModelClientError {
    /// Transport level failure (connect, read, broken stream).
    Request(String),
    /// The service answered, but with an error status or error envelope.
    Api(String),
    /// A body could not be encoded or decoded.
    Serialization(String),
    /// The client configuration is unusable.
    Config(String),
}

impl std::fmt::Display for ModelClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelClientError::Request(s) => write!(f, "Request Error: {s}"),
            ModelClientError::Api(s) => write!(f, "API Error: {s}"),
            ModelClientError::Serialization(s) => write!(f, "Serialization Error: {s}"),
            ModelClientError::Config(s) => write!(f, "Config Error: {s}"),
        }
    }
}

impl std::error::Error for ModelClientError {}

impl From<reqwest::Error> for ModelClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ModelClientError::Serialization(err.to_string())
        } else {
            ModelClientError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ModelClientError {
    fn from(err: serde_json::Error) -> Self {
        ModelClientError::Serialization(err.to_string())
    }
}
