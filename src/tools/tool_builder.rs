use std::collections::HashMap;

use super::tool::{AsyncToolFn, Function, FunctionParameters, Property, Tool, ToolType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolBuilderError {
    MissingFunctionName,
    MissingFunctionDescription,
    MissingExecutor,
    /// A required property was never declared with `add_property`.
    UnknownRequiredProperty(String),
}

impl std::fmt::Display for ToolBuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolBuilderError::MissingFunctionName => write!(f, "Function name is required."),
            ToolBuilderError::MissingFunctionDescription => write!(f, "Function description is required."),
            ToolBuilderError::MissingExecutor => write!(f, "Executor function is required for the tool."),
            ToolBuilderError::UnknownRequiredProperty(name) => {
                write!(f, "Required property '{name}' was not declared.")
            }
        }
    }
}

impl std::error::Error for ToolBuilderError {}

#[derive(Default)]
pub struct ToolBuilder {
    function_name: Option<String>,
    function_description: Option<String>,
    function_properties: HashMap<String, Property>,
    function_required: Vec<String>,
    executor: Option<AsyncToolFn>,
}

impl std::fmt::Debug for ToolBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBuilder")
            .field("function_name", &self.function_name)
            .field("function_description", &self.function_description)
            .field("function_properties", &self.function_properties)
            .field("function_required", &self.function_required)
            .field("executor", &self.executor.as_ref().map(|_| "<async_fn>"))
            .finish()
    }
}

impl ToolBuilder {
    /// Creates a new `ToolBuilder` for a `function` tool with `object` parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of the function for the tool. (Required)
    pub fn function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    /// Sets the description of the function for the tool. (Required)
    pub fn function_description<T>(mut self, description: T) -> Self
    where
        T: Into<String>,
    {
        self.function_description = Some(description.into());
        self
    }

    /// Adds a property to the function's parameters.
    ///
    /// # parameters
    /// * `name` - The name of the property.
    /// * `property_type` - The JSON schema type of the property (e.g., "string", "number").
    /// * `description` - A description of what the property represents.
    pub fn add_property(
        mut self,
        name: impl Into<String>,
        property_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.function_properties.insert(
            name.into(),
            Property {
                property_type: property_type.into(),
                description: description.into(),
                allowed_values: None,
            },
        );
        self
    }

    /// Adds a string property restricted to a fixed set of values.
    pub fn add_enum_property<I, S>(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.function_properties.insert(
            name.into(),
            Property {
                property_type: "string".into(),
                description: description.into(),
                allowed_values: Some(values.into_iter().map(Into::into).collect()),
            },
        );
        self
    }

    /// Marks a previously added property as required.
    pub fn add_required_property(mut self, name: impl Into<String>) -> Self {
        self.function_required.push(name.into());
        self
    }

    /// Sets the asynchronous executor function for the tool. (Required for building)
    pub fn executor(mut self, exec: AsyncToolFn) -> Self {
        self.executor = Some(exec);
        self
    }

    /// Consumes the builder and attempts to create a `Tool`.
    ///
    /// # Errors
    /// Returns a `ToolBuilderError` if required fields are missing.
    pub fn build(self) -> Result<Tool, ToolBuilderError> {
        let function_name = self.function_name.ok_or(ToolBuilderError::MissingFunctionName)?;
        let function_description = self
            .function_description
            .ok_or(ToolBuilderError::MissingFunctionDescription)?;
        let executor = self.executor.ok_or(ToolBuilderError::MissingExecutor)?;

        if let Some(missing) = self
            .function_required
            .iter()
            .find(|name| !self.function_properties.contains_key(*name))
        {
            return Err(ToolBuilderError::UnknownRequiredProperty(missing.clone()));
        }

        Ok(Tool {
            tool_type: ToolType::Function,
            function: Function {
                name: function_name,
                description: function_description,
                parameters: FunctionParameters {
                    param_type: "object".to_string(),
                    properties: self.function_properties,
                    required: self.function_required,
                },
            },
            executor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityResult;
    use crate::{tool_fn, ToolExecutionError};
    use serde_json::Value;

    fn create_dummy_executor() -> AsyncToolFn {
        tool_fn(|_args: Value| async {
            Ok::<_, ToolExecutionError>(CapabilityResult::error("dummy execution"))
        })
    }

    #[test]
    fn tool_builder_valid_tool() {
        let tool = ToolBuilder::new()
            .function_name("test_tool")
            .function_description("A tool for testing")
            .add_property("param1", "string", "A string parameter")
            .add_required_property("param1")
            .executor(create_dummy_executor())
            .build()
            .unwrap();

        assert_eq!(tool.name(), "test_tool");
        assert_eq!(tool.function.parameters.properties["param1"].property_type, "string");
        assert!(tool.function.parameters.required.contains(&"param1".to_string()));
    }

    #[test]
    fn descriptor_serializes_in_function_schema_shape() {
        let tool = ToolBuilder::new()
            .function_name("search_products")
            .function_description("Search the catalog")
            .add_property("query", "string", "Search terms")
            .add_enum_property("category", "Category", ["electronics", "home"])
            .add_required_property("query")
            .executor(create_dummy_executor())
            .build()
            .unwrap();

        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "search_products");
        assert_eq!(json["function"]["parameters"]["type"], "object");
        assert_eq!(json["function"]["parameters"]["required"], serde_json::json!(["query"]));
        assert_eq!(
            json["function"]["parameters"]["properties"]["category"]["enum"],
            serde_json::json!(["electronics", "home"])
        );
        assert!(json["function"]["parameters"]["properties"]["query"].get("enum").is_none());
        assert!(json.get("executor").is_none());
    }

    #[test]
    fn tool_builder_missing_name_fails() {
        let err = ToolBuilder::new()
            .function_description("A tool missing a name")
            .executor(create_dummy_executor())
            .build()
            .unwrap_err();
        assert_eq!(err, ToolBuilderError::MissingFunctionName);
    }

    #[test]
    fn tool_builder_missing_description_fails() {
        let err = ToolBuilder::new()
            .function_name("test_tool_no_desc")
            .executor(create_dummy_executor())
            .build()
            .unwrap_err();
        assert_eq!(err, ToolBuilderError::MissingFunctionDescription);
    }

    #[test]
    fn tool_builder_missing_executor_fails() {
        let err = ToolBuilder::new()
            .function_name("test_tool_no_exec")
            .function_description("A tool missing an executor")
            .build()
            .unwrap_err();
        assert_eq!(err, ToolBuilderError::MissingExecutor);
    }

    #[test]
    fn required_property_must_be_declared() {
        let err = ToolBuilder::new()
            .function_name("t")
            .function_description("d")
            .add_required_property("ghost")
            .executor(create_dummy_executor())
            .build()
            .unwrap_err();
        assert_eq!(err, ToolBuilderError::UnknownRequiredProperty("ghost".into()));
    }
}
