//! Gemini `generateContent` provider implementation.
//!
//! Speaks the two-role (`user` / `model`) content format with
//! function calling:
//! - text and inline binary parts
//! - `functionCall` parts coming back from the model
//! - `functionResponse` parts carrying dispatcher results

use async_trait::async_trait;
use offerdesk_core::error::ProviderError;
use offerdesk_core::provider::*;
use offerdesk_core::tool::{CallRequest, ToolDeclaration};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A Gemini provider talking to the public REST endpoint (or a compatible proxy).
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a provider against `base_url` with a per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Provider for the public Gemini API.
    pub fn public(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(DEFAULT_BASE_URL, api_key, std::time::Duration::from_secs(120))
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    /// Convert our turns to the wire format.
    fn to_api_contents(history: &[ModelTurn]) -> Vec<ApiContent> {
        history
            .iter()
            .map(|turn| ApiContent {
                role: match turn.role {
                    ModelRole::User => "user".into(),
                    ModelRole::Model => "model".into(),
                },
                parts: turn.parts.iter().map(ApiPart::from_part).collect(),
            })
            .collect()
    }

    /// Convert tool declarations to the wire format.
    fn to_api_tools(tools: &[ToolDeclaration]) -> Vec<ApiTool> {
        if tools.is_empty() {
            return Vec::new();
        }
        vec![ApiTool {
            function_declarations: tools
                .iter()
                .map(|t| ApiFunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters_schema(),
                })
                .collect(),
        }]
    }

    fn build_body(request: &GenerateRequest) -> ApiRequest {
        ApiRequest {
            contents: Self::to_api_contents(&request.history),
            system_instruction: (!request.system_instruction.is_empty()).then(|| ApiContent {
                role: "user".into(),
                parts: vec![ApiPart::text(&request.system_instruction)],
            }),
            tools: Self::to_api_tools(&request.tools),
            generation_config: ApiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        }
    }

    /// Turn a successful wire response into our response shape.
    fn parse_response(api: ApiResponse, requested_model: &str) -> Result<GenerateResponse, ProviderError> {
        if let Some(reason) = api.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ProviderError::Blocked(reason));
        }

        let usage = api.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });
        let model = api.model_version.unwrap_or_else(|| requested_model.to_string());

        // No candidate is an empty answer, not a transport error.
        let Some(candidate) = api.candidates.into_iter().next() else {
            return Ok(GenerateResponse {
                usage,
                model,
                ..GenerateResponse::default()
            });
        };

        let mut text = String::new();
        let mut calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(fc) = part.function_call {
                calls.push(CallRequest::new(fc.name, fc.args.unwrap_or_else(|| serde_json::json!({}))));
            }
        }

        Ok(GenerateResponse {
            text: (!text.is_empty()).then_some(text),
            calls,
            usage,
            model,
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<GenerateResponse, ProviderError> {
        let url = self.endpoint(&request.model);
        let body = Self::build_body(&request);

        debug!(
            model = %request.model,
            turns = request.history.len(),
            tools = request.tools.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(ProviderError::ModelNotFound(request.model));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        Self::parse_response(api_response, &request.model)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<ApiInlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
}

impl ApiPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    fn from_part(part: &Part) -> Self {
        match part {
            Part::Text(t) => Self::text(t),
            Part::InlineData { mime_type, data } => Self {
                inline_data: Some(ApiInlineData {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                }),
                ..Self::default()
            },
            Part::FunctionCall(call) => Self {
                function_call: Some(ApiFunctionCall {
                    name: call.name.clone(),
                    args: Some(call.args.clone()),
                }),
                ..Self::default()
            },
            Part::FunctionResponse { name, response } => Self {
                function_response: Some(ApiFunctionResponse {
                    name: name.clone(),
                    response: response.clone(),
                }),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTool {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsage>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<ApiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use offerdesk_core::tool::{CallResult, ParamType, Parameter};

    fn request(history: Vec<ModelTurn>, tools: Vec<ToolDeclaration>) -> GenerateRequest {
        GenerateRequest {
            model: "gemini-2.0-flash".into(),
            history,
            system_instruction: "Be brief".into(),
            tools,
            temperature: 0.2,
            max_output_tokens: Some(512),
        }
    }

    #[test]
    fn endpoint_includes_model() {
        let provider = GeminiProvider::public("key").unwrap();
        assert_eq!(
            provider.endpoint("gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn body_maps_roles_and_parts() {
        let calls = vec![CallRequest::new("get_offer", serde_json::json!({"offer_id": 1}))];
        let results = vec![CallResult::ok("get_offer", serde_json::json!({"success": true}))];
        let history = vec![
            ModelTurn::user_text("I need a quote"),
            ModelTurn {
                role: ModelRole::User,
                parts: vec![Part::InlineData {
                    mime_type: "image/png".into(),
                    data: "aGVsbG8=".into(),
                }],
            },
            ModelTurn::calls(&calls),
            ModelTurn::results(&results),
        ];
        let body = serde_json::to_value(GeminiProvider::build_body(&request(history, vec![]))).unwrap();

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "I need a quote");
        assert_eq!(contents[1]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(contents[2]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["functionCall"]["name"], "get_offer");
        assert_eq!(contents[3]["parts"][0]["functionResponse"]["response"]["success"], true);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn tools_are_grouped_into_one_declaration_block() {
        let tools = vec![
            ToolDeclaration::new("list_offers", "List offers", vec![]),
            ToolDeclaration::new(
                "get_offer",
                "Read one offer",
                vec![Parameter::required("offer_id", ParamType::Integer, "Offer id")],
            ),
        ];
        let body = serde_json::to_value(GeminiProvider::build_body(&request(vec![], tools))).unwrap();
        let decls = body["tools"][0]["functionDeclarations"].as_array().unwrap();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[1]["parameters"]["required"][0], "offer_id");
    }

    #[test]
    fn parse_text_response() {
        let api: ApiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Hello"}, {"text": " there"}]}}],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 2, "totalTokenCount": 12},
            "modelVersion": "gemini-2.0-flash-001"
        }))
        .unwrap();
        let response = GeminiProvider::parse_response(api, "gemini-2.0-flash").unwrap();
        assert_eq!(response.text.as_deref(), Some("Hello there"));
        assert!(response.calls.is_empty());
        assert_eq!(response.usage.unwrap().total_tokens, 12);
        assert_eq!(response.model, "gemini-2.0-flash-001");
    }

    #[test]
    fn parse_function_calls_in_order() {
        let api: ApiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "create_offer", "args": {"product": "laptop"}}},
                {"functionCall": {"name": "list_offers"}}
            ]}}]
        }))
        .unwrap();
        let response = GeminiProvider::parse_response(api, "m").unwrap();
        assert_eq!(response.text, None);
        assert_eq!(response.calls.len(), 2);
        assert_eq!(response.calls[0].name, "create_offer");
        assert_eq!(response.calls[0].args["product"], "laptop");
        assert_eq!(response.calls[1].args, serde_json::json!({}));
        assert_eq!(response.model, "m");
    }

    #[test]
    fn parse_no_candidates_is_empty_output() {
        let api: ApiResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        let response = GeminiProvider::parse_response(api, "m").unwrap();
        assert!(response.text.is_none());
        assert!(response.calls.is_empty());
    }

    #[test]
    fn parse_blocked_prompt_is_error() {
        let api: ApiResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = GeminiProvider::parse_response(api, "m").unwrap_err();
        assert!(matches!(err, ProviderError::Blocked(reason) if reason == "SAFETY"));
    }
}
