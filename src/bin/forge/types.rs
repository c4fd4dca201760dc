use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single atomic step the LLM asks the agent to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Step {
    Navigate { url: String },
    WaitFor { selector: String, timeout_ms: u64 },
    TypeInto { index: u32, text: String },
    Click { index: u32 },
    PressKey { key: String },
    GetXpath { index: u32 },
    Extract { selector: String, label: String },
    Done { summary: String },
}

impl Step {
    /// Name recorded in the agent run for this step.
    pub fn action_name(&self) -> &'static str {
        match self {
            Step::Navigate { .. } => "go_to_url",
            Step::WaitFor { .. } => "wait_for_element",
            Step::TypeInto { .. } => "input_text",
            Step::Click { .. } => "click_element",
            Step::PressKey { .. } => "send_keys",
            Step::GetXpath { .. } => "get_xpath",
            Step::Extract { .. } => "extract_content",
            Step::Done { .. } => "done",
        }
    }

    /// The step's fields without the `action` tag.
    pub fn params(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(map) = value.as_object_mut() {
            map.remove("action");
        }
        value
    }
}

/// What the agent observes after executing a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageState {
    pub url: String,
    pub title: String,
    pub dom_snapshot: String,
    pub extracted: Vec<String>,
    pub error: Option<String>,
}

pub const DOM_SNAPSHOT_MAX_CHARS: usize = 4000;
pub const EXTRACT_MAX_CHARS: usize = 2000;
