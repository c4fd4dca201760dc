use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::locator::ElementXPathMap;
use crate::types::{NormalizedHistory, ScenarioResult};
use crate::Error;

/// How per-run lists (`urls`, `action_names`, `errors`) are merged.
///
/// `detailed_actions` and `extracted_content` always accumulate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Only the final scenario's lists are kept.
    #[default]
    LastRun,
    /// Lists are concatenated across scenarios.
    Accumulate,
}

impl FromStr for MergePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "last-run" => Ok(MergePolicy::LastRun),
            "accumulate" => Ok(MergePolicy::Accumulate),
            other => Err(Error::Config(format!(
                "merge policy must be 'last-run' or 'accumulate', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryAggregator {
    policy: MergePolicy,
}

impl HistoryAggregator {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn aggregate(
        &self,
        results: Vec<ScenarioResult>,
        element_xpaths: ElementXPathMap,
        execution_date: String,
    ) -> NormalizedHistory {
        let mut history = NormalizedHistory {
            element_xpaths,
            execution_date,
            ..Default::default()
        };

        let count = results.len();
        for (position, result) in results.into_iter().enumerate() {
            history.detailed_actions.extend(result.actions);
            history.extracted_content.extend(result.extracted_content);
            history.final_results.push(result.final_result);

            let is_last = position + 1 == count;
            match self.policy {
                MergePolicy::Accumulate => {
                    history.urls.extend(result.urls);
                    history.action_names.extend(result.action_names);
                    history.errors.extend(result.errors);
                }
                MergePolicy::LastRun if is_last => {
                    history.urls = result.urls;
                    history.action_names = result.action_names;
                    history.errors = result.errors;
                }
                MergePolicy::LastRun => {}
            }
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionRecord;
    use serde_json::json;

    fn scenario(tag: &str, actions: usize) -> ScenarioResult {
        ScenarioResult {
            final_result: json!({"status": tag}),
            actions: (0..actions)
                .map(|i| ActionRecord {
                    name: format!("{tag}_{i}"),
                    sequence_index: i,
                    params: serde_json::Value::Null,
                    element_details: None,
                })
                .collect(),
            extracted_content: vec![format!("{tag} content")],
            errors: vec![format!("{tag} error")],
            urls: vec![format!("https://{tag}.test"), format!("https://{tag}.test/next")],
            action_names: (0..actions).map(|i| format!("{tag}_{i}")).collect(),
        }
    }

    #[test]
    fn last_run_policy_keeps_asymmetry() {
        let history = HistoryAggregator::new(MergePolicy::LastRun).aggregate(
            vec![scenario("a", 3), scenario("b", 2)],
            ElementXPathMap::new(),
            "2026-01-01 10:00:00".to_string(),
        );
        assert_eq!(history.detailed_actions.len(), 5);
        assert_eq!(history.extracted_content, vec!["a content", "b content"]);
        assert_eq!(history.urls, vec!["https://b.test", "https://b.test/next"]);
        assert_eq!(history.action_names, vec!["b_0", "b_1"]);
        assert_eq!(history.errors, vec!["b error"]);
        assert_eq!(history.final_results.len(), 2);
        assert_eq!(history.execution_date, "2026-01-01 10:00:00");
    }

    #[test]
    fn accumulate_policy_concatenates() {
        let history = HistoryAggregator::new(MergePolicy::Accumulate).aggregate(
            vec![scenario("a", 1), scenario("b", 1)],
            ElementXPathMap::new(),
            String::new(),
        );
        assert_eq!(history.urls.len(), 4);
        assert_eq!(history.action_names, vec!["a_0", "b_0"]);
        assert_eq!(history.errors, vec!["a error", "b error"]);
    }

    #[test]
    fn no_results_gives_empty_history() {
        let history = HistoryAggregator::default().aggregate(
            Vec::new(),
            ElementXPathMap::new(),
            String::new(),
        );
        assert!(history.detailed_actions.is_empty());
        assert!(history.urls.is_empty());
    }

    #[test]
    fn policy_parses() {
        assert_eq!("last-run".parse::<MergePolicy>().unwrap(), MergePolicy::LastRun);
        assert_eq!("accumulate".parse::<MergePolicy>().unwrap(), MergePolicy::Accumulate);
        assert!("merge".parse::<MergePolicy>().is_err());
    }
}
