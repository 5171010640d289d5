//! Gemini API backend.

use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolOutcome,
    ToolSpec, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiToolConfig>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolConfig {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct ApiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

/// A Gemini content part. Exactly one of the fields is set in practice.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Gemini `generateContent` backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }

    fn message_to_api(msg: &Message) -> ApiContent {
        let parts = msg
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => ApiPart {
                    text: Some(text.clone()),
                    ..ApiPart::default()
                },
                Part::ToolCall(call) => ApiPart {
                    function_call: Some(ApiFunctionCall {
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                    ..ApiPart::default()
                },
                Part::ToolResult(result) => {
                    // The API keys function responses by name; error and
                    // success travel in the payload shape.
                    let response = match &result.outcome {
                        ToolOutcome::Success { output } => json!({ "result": output }),
                        ToolOutcome::Error { message } => json!({ "error": message }),
                    };
                    ApiPart {
                        function_response: Some(ApiFunctionResponse {
                            name: result.name.clone(),
                            response,
                        }),
                        ..ApiPart::default()
                    }
                }
            })
            .collect();

        ApiContent {
            role: Self::role_to_api(msg.role).to_string(),
            parts,
        }
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiFunctionDeclaration {
        ApiFunctionDeclaration {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.schema.clone(),
        }
    }

    fn response_to_message(response: ApiResponse) -> Message {
        let parts = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts)
            .unwrap_or_default();

        let parts = parts
            .into_iter()
            .filter_map(|part| {
                if let Some(text) = part.text {
                    Some(Part::Text(text))
                } else {
                    // The wire format carries no call IDs; synthesize one
                    // so results can be correlated downstream.
                    part.function_call.map(|call| {
                        Part::ToolCall(ToolCall {
                            id: format!("call-{}", Uuid::new_v4()),
                            name: call.name,
                            arguments: call.args,
                        })
                    })
                }
            })
            .collect();

        Message {
            role: Role::Assistant,
            parts,
        }
    }
}

impl std::fmt::Display for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gemini({})", self.model)
    }
}

impl Backend for GeminiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let contents: Vec<ApiContent> = request.messages.iter().map(Self::message_to_api).collect();

        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![ApiToolConfig {
                function_declarations: request.tools.iter().map(Self::tool_to_api).collect(),
            }]
        };

        let api_request = ApiRequest {
            contents,
            tools,
            generation_config: ApiGenerationConfig {
                temperature: request.temperature,
            },
        };

        let url = format!("{GEMINI_API_BASE}/{}:generateContent", self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let usage = api_response
            .usage_metadata
            .as_ref()
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        let message = Self::response_to_message(api_response);

        Ok(ModelResponse { message, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolResult;

    #[test]
    fn parses_function_call_response() {
        let raw = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Let me look that up."},
                        {"functionCall": {"name": "search_menu", "args": {"query": "wings"}}}
                    ]
                }
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 7}
        }"#;
        let response: ApiResponse = serde_json::from_str(raw).unwrap();
        let message = GeminiBackend::response_to_message(response);

        assert_eq!(message.text(), "Let me look that up.");
        let calls = message.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search_menu");
        assert_eq!(calls[0].arguments, json!({"query": "wings"}));
        assert!(calls[0].id.starts_with("call-"));
    }

    #[test]
    fn empty_candidates_become_empty_message() {
        let response: ApiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        let message = GeminiBackend::response_to_message(response);
        assert!(message.parts.is_empty());
        assert_eq!(message.text(), "");
    }

    #[test]
    fn tool_results_serialize_as_function_responses() {
        let msg = Message::tool_results(vec![
            ToolResult::success("call-1", "view_order", "1x 14SCREEN"),
            ToolResult::error("call-2", "apply_coupon", "invalid coupon"),
        ]);
        let api = GeminiBackend::message_to_api(&msg);
        assert_eq!(api.role, "user");

        let first = api.parts[0].function_response.as_ref().unwrap();
        assert_eq!(first.name, "view_order");
        assert_eq!(first.response, json!({"result": "1x 14SCREEN"}));

        let second = api.parts[1].function_response.as_ref().unwrap();
        assert_eq!(second.response, json!({"error": "invalid coupon"}));
    }

    #[test]
    fn assistant_maps_to_model_role() {
        let api = GeminiBackend::message_to_api(&Message::assistant("hi"));
        assert_eq!(api.role, "model");
        assert_eq!(api.parts[0].text.as_deref(), Some("hi"));
    }
}
