use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool the model may call, declared with a JSON-schema parameter object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDeclaration {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON schema for the arguments the tool accepts
    pub parameters: Value,
}

impl ToolDeclaration {
    pub fn new<N, D>(name: N, description: D, parameters: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ToolDeclaration {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
