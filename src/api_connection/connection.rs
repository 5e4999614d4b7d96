use dotenv::dotenv;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::endpoints::{
    best_match_json_schema, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    ResponseFormat, ASSIST_MATCH_MODEL, OPENROUTER_CHAT_URL,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug)]
pub enum AssistMatchError {
    MissingApiKey(String),
    NetworkError(reqwest::Error),
    SerializationError(serde_json::Error),
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
    EmptyResponse,
}

impl fmt::Display for AssistMatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssistMatchError::MissingApiKey(key_name) => {
                write!(f, "API key not found in environment: {}", key_name)
            }
            AssistMatchError::NetworkError(err) => write!(f, "network error: {}", err),
            AssistMatchError::SerializationError(err) => {
                write!(f, "serialization error: {}", err)
            }
            AssistMatchError::ApiError { status, error_body } => {
                write!(f, "API error {}: {}", status, error_body)
            }
            AssistMatchError::EmptyResponse => write!(f, "API returned no response choice"),
        }
    }
}

impl Error for AssistMatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AssistMatchError::NetworkError(err) => Some(err),
            AssistMatchError::SerializationError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AssistMatchError {
    fn from(err: reqwest::Error) -> Self {
        AssistMatchError::NetworkError(err)
    }
}

impl From<serde_json::Error> for AssistMatchError {
    fn from(err: serde_json::Error) -> Self {
        AssistMatchError::SerializationError(err)
    }
}

#[derive(Debug, Deserialize)]
struct BestMatchResponse {
    best_match_index: i32,
}

/// Models occasionally wrap the JSON answer in a markdown code fence.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Client for the external assisted-name-matching collaborator: given a raw
/// ingredient phrase and a bounded candidate list, an LLM picks the best
/// candidate by index, or 0 for no match.
pub struct AssistedNameMatcher {
    client: Client,
    api_key_env_var: String,
    model: String,
}

impl AssistedNameMatcher {
    pub fn from_env(api_key_env_var: &str) -> Self {
        dotenv().ok();
        AssistedNameMatcher {
            client: Client::new(),
            api_key_env_var: api_key_env_var.to_string(),
            model: ASSIST_MATCH_MODEL.to_string(),
        }
    }

    /// Returns the chosen candidate name, or `None` when the model declines
    /// every candidate or answers out of range.
    pub async fn best_match(
        &self,
        raw_name: &str,
        candidates: &[String],
    ) -> Result<Option<String>, AssistMatchError> {
        let api_key = env::var(&self.api_key_env_var)
            .map_err(|_| AssistMatchError::MissingApiKey(self.api_key_env_var.clone()))?;

        let mut candidate_list = String::new();
        for (i, name) in candidates.iter().enumerate() {
            candidate_list.push_str(&format!("{}. \"{}\"\n", i + 1, name));
        }

        let system_prompt = "You are a food item matching assistant. Given a recipe ingredient \
and a numbered list of canonical entries from a nutrition table, choose the entry that denotes \
the same food. Prefer an entry matching the ingredient's form (powder, leaves, whole, raw). \
Respond ONLY with a JSON object: { \"best_match_index\": number }, using the 1-based index of \
your choice, or 0 if no entry is a reasonable match.";

        let user_prompt = format!(
            "Recipe ingredient: \"{}\"\n\nCanonical entries:\n{}\nWhich entry (1 to {}) matches? 0 if none.",
            raw_name,
            candidate_list.trim_end(),
            candidates.len()
        );

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt,
                },
            ],
            response_format: Some(ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: best_match_json_schema(candidates.len()),
            }),
            temperature: Some(0.0),
            max_tokens: Some(50),
        };

        let response = self
            .client
            .post(OPENROUTER_CHAT_URL)
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(AssistMatchError::ApiError { status, error_body });
        }

        let chat_response = response.json::<ChatCompletionResponse>().await?;
        let choice = chat_response
            .choices
            .first()
            .ok_or(AssistMatchError::EmptyResponse)?;

        let content = strip_code_fences(&choice.message.content);
        let parsed: BestMatchResponse = serde_json::from_str(content)?;
        debug!(raw_name, index = parsed.best_match_index, "assisted match response");

        if parsed.best_match_index > 0 && (parsed.best_match_index as usize) <= candidates.len() {
            Ok(Some(candidates[(parsed.best_match_index - 1) as usize].clone()))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(
            strip_code_fences("```json\n{\"best_match_index\": 2}\n```"),
            "{\"best_match_index\": 2}"
        );
        assert_eq!(
            strip_code_fences("```\n{\"best_match_index\": 0}\n```"),
            "{\"best_match_index\": 0}"
        );
        assert_eq!(
            strip_code_fences("{\"best_match_index\": 1}"),
            "{\"best_match_index\": 1}"
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_error() {
        let matcher = AssistedNameMatcher::from_env("THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ");
        let result = matcher
            .best_match("paneer", &["cottage_cheese".to_string()])
            .await;
        assert!(matches!(result, Err(AssistMatchError::MissingApiKey(_))));
    }
}
