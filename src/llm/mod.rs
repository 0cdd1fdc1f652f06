use crate::config::Config;
use crate::error::AnchorError;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Seam for the language-model judge used during fuzzy resolution. Tests
/// inject deterministic implementations; production uses `OpenAiJudge`.
pub trait JsonCompleter {
    /// Whether a judge is configured and ready. Callers fall back to the
    /// deterministic heuristic when this is false.
    fn is_enabled(&self) -> bool;

    /// Sends system/user prompts and returns the raw response text, which is
    /// expected to be a JSON object.
    fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AnchorError>;
}

/// Judge backed by an OpenAI-style chat-completions endpoint.
pub struct OpenAiJudge {
    api_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiJudge {
    /// Builds the judge from global configuration. Without an API key the
    /// judge reports disabled and resolution degrades to the heuristic.
    pub fn from_config() -> Self {
        let config = Config::get();
        OpenAiJudge {
            api_url: config.llm_api_url().to_string(),
            api_key: config.llm_api_key().map(|k| k.to_string()),
            model: config.llm_model().to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        OpenAiJudge {
            api_url: api_url.into(),
            api_key: Some(api_key.into()),
            model: model.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl JsonCompleter for OpenAiJudge {
    fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AnchorError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| AnchorError::Generic("llm judge not configured".to_string()))?;

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": 0.0,
            "max_tokens": 500,
            "response_format": {"type": "json_object"},
        });

        let response: ChatResponse = ureq::post(&self.api_url)
            .set("Authorization", &format!("Bearer {}", api_key))
            .set("Content-Type", "application/json")
            .timeout(self.timeout)
            .send_json(body)?
            .into_json()?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AnchorError::Generic("llm returned no choices".to_string()))?;

        Ok(choice.message.content)
    }
}
