use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Model used for assisted ingredient-name matching.
pub const ASSIST_MATCH_MODEL: &str = "qwen/qwen3-32b";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct JsonSchemaProperty {
    #[serde(rename = "type")]
    pub property_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct JsonSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, JsonSchemaProperty>,
    pub required: Vec<String>,
    #[serde(rename = "additionalProperties")]
    pub additional_properties: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct JsonSchemaDefinition {
    pub name: String,
    pub strict: bool,
    pub schema: JsonSchema,
}

#[derive(Debug, Serialize, Clone)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub json_schema: JsonSchemaDefinition,
}

#[derive(Debug, Serialize, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionResponseMessage {
    pub content: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionResponseMessage,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
}

/// Response schema forcing the model to answer with a single candidate index
/// (1-based, 0 for no match).
pub fn best_match_json_schema(candidate_count: usize) -> JsonSchemaDefinition {
    let mut properties = HashMap::new();
    properties.insert(
        "best_match_index".to_string(),
        JsonSchemaProperty {
            property_type: "integer".to_string(),
            description: Some(format!(
                "The 1-based index of the best matching candidate (1 to {}). 0 if no candidate matches.",
                candidate_count
            )),
        },
    );

    JsonSchemaDefinition {
        name: "best_match_schema".to_string(),
        strict: true,
        schema: JsonSchema {
            schema_type: "object".to_string(),
            properties,
            required: vec!["best_match_index".to_string()],
            additional_properties: false,
        },
    }
}
