//! OpenRouter chat-completion client
//!
//! Thin HTTP client over the OpenRouter-compatible chat completions API.
//! The caller's chosen model, bearer credential and site-identification
//! headers all come from the settings record.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::database::Settings;
use crate::error::AppError;
use crate::util::truncate_chars;

/// OpenRouter chat completions endpoint
pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Site name header fallback
pub const DEFAULT_SITE_NAME: &str = "Cresonia AI";

/// Chat request message
#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: OPENROUTER_API_URL.to_string(),
            // Long-form prose generation can take a while
            timeout_secs: 300,
        }
    }
}

/// Text-generation client
pub struct OpenRouterClient {
    config: OpenRouterConfig,
    client: Client,
}

impl OpenRouterClient {
    pub fn new(config: OpenRouterConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { config, client }
    }

    pub fn with_default_config() -> Self {
        Self::new(OpenRouterConfig::default())
    }

    /// Generate a completion for `prompt` using the model from `settings`
    pub async fn generate(&self, prompt: &str, settings: &Settings) -> Result<String, AppError> {
        self.generate_with_model(prompt, settings, &settings.model).await
    }

    /// Generate a completion with an explicit model identifier
    pub async fn generate_with_model(
        &self,
        prompt: &str,
        settings: &Settings,
        model: &str,
    ) -> Result<String, AppError> {
        log::info!("Generating AI response with model: {}", model);

        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let site_name = if settings.site_name.trim().is_empty() {
            DEFAULT_SITE_NAME
        } else {
            &settings.site_name
        };

        let mut request = self
            .client
            .post(&self.config.base_url)
            .bearer_auth(&settings.api_key)
            .header("X-Title", site_name)
            .json(&body);

        if !settings.site_url.trim().is_empty() {
            request = request.header("HTTP-Referer", &settings.site_url);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Api(format!("Request failed: {}", e)))?;

        let status = response.status();

        // Read the raw body first so shape errors can quote it
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Api(format!("Failed to read response: {}", e)))?;

        let data: ChatResponse = serde_json::from_str(&text).map_err(|_| {
            AppError::Api(format!(
                "Invalid JSON response: {}...",
                truncate_chars(&text, 100)
            ))
        })?;

        if !status.is_success() {
            let message = data
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            log::error!("API error: {}", message);
            return Err(AppError::Api(message));
        }

        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| {
                log::error!("Unexpected API response format");
                AppError::Api("Response did not contain the expected content".to_string())
            })?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hello"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        let content = parsed.choices[0]
            .message
            .as_ref()
            .and_then(|m| m.content.as_deref());
        assert_eq!(content, Some("Hello"));
    }

    #[test]
    fn test_error_body_parsing() {
        let body = r#"{"error":{"message":"Invalid model"}}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.unwrap().message.as_deref(), Some("Invalid model"));
        assert!(parsed.choices.is_empty());
    }
}
