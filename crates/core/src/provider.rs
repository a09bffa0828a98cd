//! Provider trait: the abstraction over the generative model.
//!
//! The model speaks a two-role vocabulary (`user` / `model`) and exchanges
//! turns made of parts: text, inline binary data, function calls and
//! function responses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Role;
use crate::tool::{CallRequest, CallResult, ToolDeclaration};

/// The model's role vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    User,
    Model,
}

impl From<Role> for ModelRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ModelRole::User,
            Role::Assistant => ModelRole::Model,
        }
    }
}

/// One part of a model-shaped turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    /// Base64-encoded binary payload
    InlineData { mime_type: String, data: String },
    FunctionCall(CallRequest),
    FunctionResponse {
        name: String,
        response: serde_json::Value,
    },
}

/// A turn in the shape the model consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTurn {
    pub role: ModelRole,
    pub parts: Vec<Part>,
}

impl ModelTurn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ModelRole::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: ModelRole::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// The model turn that records a round's call requests.
    pub fn calls(calls: &[CallRequest]) -> Self {
        Self {
            role: ModelRole::Model,
            parts: calls.iter().cloned().map(Part::FunctionCall).collect(),
        }
    }

    /// The user turn that answers a round's call requests, in request order.
    pub fn results(results: &[CallResult]) -> Self {
        Self {
            role: ModelRole::User,
            parts: results
                .iter()
                .map(|r| Part::FunctionResponse {
                    name: r.name.clone(),
                    response: r.response.clone(),
                })
                .collect(),
        }
    }
}

/// A request to generate the next model output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The model to use (e.g., "gemini-2.0-flash")
    pub model: String,

    /// Rolling history, oldest first
    pub history: Vec<ModelTurn>,

    /// System instruction built from user state
    pub system_instruction: String,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclaration>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The model's output for one round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Generated text, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Function calls requested this round, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<CallRequest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Which model actually responded
    #[serde(default)]
    pub model: String,
}

impl GenerateResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn calls(calls: Vec<CallRequest>) -> Self {
        Self {
            calls,
            ..Self::default()
        }
    }

    /// Text with surrounding whitespace removed; `None` if nothing is left.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// The core Provider trait.
///
/// The orchestrator calls `generate()` without knowing which backend is used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send the history and get the next output.
    async fn generate(&self, request: GenerateRequest) -> std::result::Result<GenerateResponse, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
