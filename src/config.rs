//! Runtime configuration, read from the environment (and `.env`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::history::MergePolicy;
use crate::{Error, Result};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_LLM_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_HISTORY_PATH: &str = "agent_history.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub llm_endpoint: String,
    pub temperature: f32,
    /// Page every scenario starts from.
    pub entry_url: String,
    /// Audit trail of raw agent runs, rewritten on every execution.
    pub history_path: PathBuf,
    pub merge_policy: MergePolicy,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    /// Agent steps allowed per scenario.
    pub max_steps: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            llm_endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            temperature: 0.2,
            entry_url: "about:blank".to_string(),
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
            merge_policy: MergePolicy::default(),
            headless: true,
            chrome_path: None,
            max_steps: 25,
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.api_key = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty());

        if let Some(model) = lookup("FORGE_MODEL") {
            config.model = model;
        }
        if let Some(endpoint) = lookup("FORGE_LLM_ENDPOINT") {
            config.llm_endpoint = endpoint;
        }
        if let Some(temperature) = lookup("FORGE_TEMPERATURE") {
            config.temperature = temperature
                .parse()
                .map_err(|_| Error::Config(format!("FORGE_TEMPERATURE is not a number: {temperature}")))?;
        }
        if let Some(url) = lookup("FORGE_ENTRY_URL") {
            config.entry_url = url;
        }
        if let Some(path) = lookup("FORGE_HISTORY_PATH") {
            config.history_path = PathBuf::from(path);
        }
        if let Some(policy) = lookup("FORGE_MERGE_POLICY") {
            config.merge_policy = policy.parse()?;
        }
        if let Some(headless) = lookup("FORGE_HEADLESS") {
            config.headless = parse_flag("FORGE_HEADLESS", &headless)?;
        }
        if let Some(path) = lookup("FORGE_CHROME_PATH") {
            config.chrome_path = Some(PathBuf::from(path));
        }
        if let Some(steps) = lookup("FORGE_MAX_STEPS") {
            config.max_steps = steps
                .parse()
                .map_err(|_| Error::Config(format!("FORGE_MAX_STEPS is not a count: {steps}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::Config("model must not be empty".to_string()));
        }
        if self.llm_endpoint.trim().is_empty() {
            return Err(Error::Config("LLM endpoint must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "temperature must be in [0, 2], got {}",
                self.temperature
            )));
        }
        if self.max_steps == 0 {
            return Err(Error::Config("max_steps must be > 0".to_string()));
        }
        if self.entry_url.trim().is_empty() {
            return Err(Error::Config("entry URL must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{key} must be a boolean, got '{value}'"))),
    }
}
