//! Tool declarations, call requests and call results.
//!
//! Declarations are advertised to the model; call requests come back from it
//! and are answered by the dispatcher with call results.

use serde::{Deserialize, Serialize};
use crate::message::FileId;

/// Primitive type of a declared tool argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
}

impl ParamType {
    fn as_schema_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
        }
    }
}

/// One named argument of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// Allowed values for string parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

impl Parameter {
    pub fn required(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            allowed: Vec::new(),
        }
    }

    pub fn optional(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed = values.iter().map(|v| v.to_string()).collect();
        self
    }
}

/// A callable operation as advertised to the model.
///
/// The description is policy text: it is the only lever to steer when the
/// model calls the tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl ToolDeclaration {
    pub fn new(name: &str, description: &str, parameters: Vec<Parameter>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Render the argument list as an OpenAPI-style object schema.
    pub fn parameters_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for p in &self.parameters {
            let mut prop = serde_json::json!({
                "type": p.kind.as_schema_type(),
                "description": p.description,
            });
            if !p.allowed.is_empty() {
                prop["enum"] = serde_json::json!(p.allowed);
            }
            properties.insert(p.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        let mut schema = serde_json::json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = serde_json::json!(required);
        }
        schema
    }
}

/// The model's request to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Name of the tool to execute
    pub name: String,

    /// Arguments as an untyped JSON object
    #[serde(default)]
    pub args: serde_json::Value,
}

impl CallRequest {
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// What the orchestrator should do with a call result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallOutcome {
    /// Feed the result back to the model in the next round
    Continue,
    /// Stop the loop and show `text` to the user as-is
    Reply {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachment: Option<FileId>,
    },
}

/// The dispatcher's answer to one call request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    /// Echo of the requested tool name
    pub name: String,

    /// Result bag passed verbatim to the model
    pub response: serde_json::Value,

    pub outcome: CallOutcome,
}

impl CallResult {
    pub fn ok(name: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            response,
            outcome: CallOutcome::Continue,
        }
    }

    /// A failed operation, reported to the model instead of raised.
    pub fn failed(name: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self {
            name: name.into(),
            response: serde_json::json!({
                "success": false,
                "error": cause.to_string(),
            }),
            outcome: CallOutcome::Continue,
        }
    }

    pub fn reply(
        name: impl Into<String>,
        response: serde_json::Value,
        text: impl Into<String>,
        attachment: Option<FileId>,
    ) -> Self {
        Self {
            name: name.into(),
            response,
            outcome: CallOutcome::Reply {
                text: text.into(),
                attachment,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.response
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }
}
