use serde::{Deserialize, Serialize};

use super::products::ProductSearch;
use super::wikipedia::Article;

/// Why a capability could not produce its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// The lookup ran fine but found nothing.
    NoMatch(String),
    /// Transport, status or decoding fault while running the capability.
    Execution(String),
}

impl std::fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityError::NoMatch(s) => write!(f, "{s}"),
            CapabilityError::Execution(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for CapabilityError {}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        CapabilityError::Execution(err.to_string())
    }
}

/// Structured outcome handed back to the model as a tool message.
///
/// Serialized flat with a `status` tag, e.g.
/// `{"status":"success","products":[...],"total":3}` or
/// `{"status":"error","message":"..."}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CapabilityResult {
    Success(CapabilityPayload),
    Error { message: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum CapabilityPayload {
    Products(ProductSearch),
    Article(Article),
}

impl CapabilityResult {
    pub fn error(message: impl Into<String>) -> Self {
        CapabilityResult::Error { message: message.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CapabilityResult::Success(_))
    }

    /// Text form placed into the tool-result message.
    pub fn to_message_content(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<ProductSearch> for CapabilityResult {
    fn from(search: ProductSearch) -> Self {
        CapabilityResult::Success(CapabilityPayload::Products(search))
    }
}

impl From<Article> for CapabilityResult {
    fn from(article: Article) -> Self {
        CapabilityResult::Success(CapabilityPayload::Article(article))
    }
}

impl<T> From<Result<T, CapabilityError>> for CapabilityResult
where
    T: Into<CapabilityResult>,
{
    fn from(result: Result<T, CapabilityError>) -> Self {
        match result {
            Ok(payload) => payload.into(),
            Err(e) => CapabilityResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::products::Product;
    use crate::Message;
    use serde_json::json;

    fn sample_search() -> ProductSearch {
        ProductSearch::new(vec![
            Product::new("Dell USB Mouse", 12.99),
            Product::new("Dell Keyboard Cover", 19.99),
        ])
    }

    #[test]
    fn success_is_flattened_with_status_tag() {
        let value = serde_json::to_value(CapabilityResult::from(sample_search())).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["total"], 2);
        assert_eq!(value["products"][0], json!({"name": "Dell USB Mouse", "price": 12.99}));
    }

    #[test]
    fn error_carries_message() {
        let value = serde_json::to_value(CapabilityResult::error("boom")).unwrap();
        assert_eq!(value, json!({"status": "error", "message": "boom"}));
    }

    #[test]
    fn tool_message_round_trips_the_result() {
        let results = [
            CapabilityResult::from(sample_search()),
            CapabilityResult::from(Article {
                title: "Rust (programming language)".into(),
                content: "Rust is a general-purpose programming language.".into(),
            }),
            CapabilityResult::error("No Wikipedia article found for 'x'"),
        ];

        for original in results {
            let msg = Message::tool(original.to_message_content().unwrap(), "call_1");
            let parsed: CapabilityResult =
                serde_json::from_str(msg.content.as_deref().unwrap()).unwrap();
            assert_eq!(parsed, original);
        }
    }

    #[test]
    fn no_match_and_fault_both_become_error_status() {
        let no_match: Result<Article, _> = Err(CapabilityError::NoMatch("nothing".into()));
        let fault: Result<Article, _> = Err(CapabilityError::Execution("timeout".into()));
        assert_eq!(CapabilityResult::from(no_match), CapabilityResult::error("nothing"));
        assert_eq!(CapabilityResult::from(fault), CapabilityResult::error("timeout"));
    }
}
