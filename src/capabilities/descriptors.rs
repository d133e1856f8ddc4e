use std::sync::Arc;

use serde_json::Value;

use super::{
    products::{Catalog, SearchProductsArgs},
    result::CapabilityResult,
    wikipedia::{FetchWikipediaArgs, WikipediaClient},
};
use crate::{tool_fn, Tool, ToolBuilder, ToolBuilderError, ToolExecutionError};

pub const SEARCH_PRODUCTS: &str = "search_products";
pub const FETCH_WIKIPEDIA_CONTENT: &str = "fetch_wikipedia_content";

pub const PRODUCT_CATEGORIES: [&str; 4] = ["electronics", "clothing", "home", "outdoor"];

/// The capability offered to the model for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ProductSearch,
    Wikipedia,
}

impl Capability {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Capability::ProductSearch => SEARCH_PRODUCTS,
            Capability::Wikipedia => FETCH_WIKIPEDIA_CONTENT,
        }
    }

    /// System prompt seeding the conversation.
    pub fn persona(&self) -> &'static str {
        match self {
            Capability::ProductSearch => concat!(
                "You are a helpful shopping assistant that can search for products. ",
                "When asked about products, you can search the catalog and provide ",
                "detailed information about availability and pricing."
            ),
            Capability::Wikipedia => concat!(
                "You are a helpful assistant that can search Wikipedia for information. ",
                "When asked about topics, people, or events, you can retrieve Wikipedia articles ",
                "and provide detailed, accurate information based on them."
            ),
        }
    }
}

pub fn product_search_tool(catalog: Arc<Catalog>) -> Result<Tool, ToolBuilderError> {
    let executor = tool_fn(move |args: Value| {
        let catalog = catalog.clone();
        async move {
            serde_json::from_value::<SearchProductsArgs>(args)
                .map(|args| CapabilityResult::from(catalog.search_with(&args)))
                .map_err(ToolExecutionError::from)
        }
    });

    ToolBuilder::new()
        .function_name(SEARCH_PRODUCTS)
        .function_description(
            "Search the product catalog by various criteria. Use this whenever a customer asks \
             about product availability, pricing, or specifications.",
        )
        .add_property("query", "string", "Search terms or product name")
        .add_enum_property("category", "Product category to filter by", PRODUCT_CATEGORIES)
        .add_property("max_price", "number", "Maximum price in dollars")
        .add_required_property("query")
        .executor(executor)
        .build()
}

pub fn wikipedia_tool(client: WikipediaClient) -> Result<Tool, ToolBuilderError> {
    let executor = tool_fn(move |args: Value| {
        let client = client.clone();
        async move {
            match serde_json::from_value::<FetchWikipediaArgs>(args) {
                Ok(args) => Ok(client.fetch_wikipedia_content(&args.search_query).await),
                Err(e) => Err(ToolExecutionError::from(e)),
            }
        }
    });

    ToolBuilder::new()
        .function_name(FETCH_WIKIPEDIA_CONTENT)
        .function_description(
            "Search Wikipedia and fetch the introduction of the most relevant article",
        )
        .add_property(
            "search_query",
            "string",
            "Search query for finding the Wikipedia article",
        )
        .add_required_property("search_query")
        .executor(executor)
        .build()
}
