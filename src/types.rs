use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::locator::ElementXPathMap;

/// One raw step reported by the automation engine.
///
/// `params` is kept verbatim for the code generator. `locator` is the
/// structured xpath channel; `interacted_element` is the engine's free-text
/// element description, which may embed `xpath='...'`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAction {
    pub name: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interacted_element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
}

impl RawAction {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
            interacted_element: None,
            locator: None,
        }
    }

    pub fn with_interacted_element(mut self, description: impl Into<String>) -> Self {
        self.interacted_element = Some(description.into());
        self
    }

    pub fn with_locator(mut self, xpath: impl Into<String>) -> Self {
        self.locator = Some(xpath.into());
        self
    }

    /// The `index` parameter, if the step targets an engine element handle.
    pub fn index(&self) -> Option<u32> {
        self.params
            .get("index")
            .and_then(Value::as_u64)
            .and_then(|i| u32::try_from(i).ok())
    }
}

/// Element correlation attached to an [`ActionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDetails {
    pub index: u32,
    pub xpath: Option<String>,
}

/// One atomic step, numbered within its scenario and correlated to a locator
/// where the evidence allows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub name: String,
    pub sequence_index: usize,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_details: Option<ElementDetails>,
}

/// What the recorder hands to an [`AgentSession`](crate::AgentSession) for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub task: String,
    pub initial_actions: Vec<RawAction>,
    pub perceive_visually: bool,
}

impl AgentTask {
    /// A text-only task that opens `entry_url` before the agent takes over.
    pub fn for_scenario(scenario: &str, entry_url: &str) -> Self {
        Self {
            task: scenario.to_string(),
            initial_actions: vec![RawAction::new(
                "go_to_url",
                serde_json::json!({ "url": entry_url }),
            )],
            perceive_visually: false,
        }
    }
}

/// Everything one agent run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRun {
    pub final_result: Option<Value>,
    pub model_actions: Vec<RawAction>,
    pub action_names: Vec<String>,
    pub extracted_content: Vec<String>,
    pub errors: Vec<String>,
    pub urls: Vec<String>,
}

impl AgentRun {
    /// Final result in its structured shape; plain strings are wrapped.
    pub fn structured_result(&self) -> Value {
        match &self.final_result {
            Some(Value::String(status)) => serde_json::json!({
                "status": status,
                "details": "Execution completed",
            }),
            Some(other) => other.clone(),
            None => Value::Null,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub final_result: Value,
    pub actions: Vec<ActionRecord>,
    pub extracted_content: Vec<String>,
    pub errors: Vec<String>,
    pub urls: Vec<String>,
    pub action_names: Vec<String>,
}

/// Framework-agnostic record of a whole feature execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedHistory {
    pub urls: Vec<String>,
    pub action_names: Vec<String>,
    pub detailed_actions: Vec<ActionRecord>,
    pub element_xpaths: ElementXPathMap,
    pub extracted_content: Vec<String>,
    pub errors: Vec<String>,
    pub execution_date: String,
    #[serde(default)]
    pub final_results: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_result_is_wrapped() {
        let run = AgentRun {
            final_result: Some(json!("passed")),
            ..Default::default()
        };
        assert_eq!(
            run.structured_result(),
            json!({"status": "passed", "details": "Execution completed"})
        );
    }

    #[test]
    fn structured_result_is_kept() {
        let run = AgentRun {
            final_result: Some(json!({"success": true})),
            ..Default::default()
        };
        assert_eq!(run.structured_result(), json!({"success": true}));
    }

    #[test]
    fn index_reads_integer_param_only() {
        assert_eq!(RawAction::new("click_element", json!({"index": 7})).index(), Some(7));
        assert_eq!(RawAction::new("click_element", json!({"index": "7"})).index(), None);
        assert_eq!(RawAction::new("done", Value::Null).index(), None);
    }

    #[test]
    fn scenario_task_starts_with_navigation() {
        let task = AgentTask::for_scenario("Scenario: x", "https://example.test");
        assert!(!task.perceive_visually);
        assert_eq!(task.initial_actions[0].name, "go_to_url");
        assert_eq!(task.initial_actions[0].params["url"], "https://example.test");
    }
}
