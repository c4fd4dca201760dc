//! Minimal OpenAI-compatible chat client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use crate::codegen::CodeGenerator;
use crate::config::Config;
use crate::{Error, Result};

const CODEGEN_SYSTEM_PROMPT: &str = "You are an expert test automation engineer. You turn Gherkin \
scenarios and recorded browser interactions (selectors, actions, URLs) into clean, executable test \
automation code, and user stories into well-structured Gherkin. Always answer with exactly one \
fenced code block and nothing else.";

/// A message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl ChatClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("OPENAI_API_KEY not set in environment".to_string()))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            endpoint: config.llm_endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends the conversation and returns the assistant's reply text.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "temperature": self.temperature,
            }))
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error");
            error!("chat completion failed ({status}): {message}");
            return Err(Error::Llm(format!("API error ({status}): {message}")));
        }

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| Error::Llm(format!("no content in response: {body}")))?;
        debug!("model replied with {} chars", content.len());
        Ok(content.to_string())
    }
}

#[async_trait]
impl CodeGenerator for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(&[
            ChatMessage::system(CODEGEN_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .await
        .map_err(|e| Error::Generation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_requires_api_key() {
        let config = Config {
            api_key: None,
            ..Config::default()
        };
        assert!(matches!(ChatClient::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn messages_serialize_as_chat_roles() {
        let msg = ChatMessage::assistant("hi");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "assistant", "content": "hi"})
        );
    }
}
