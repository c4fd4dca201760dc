//! Runs one agent per scenario in a shared browser session and correlates
//! every element interaction back to an XPath.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::gherkin::split_scenarios;
use crate::history::HistoryAggregator;
use crate::locator::{ElementXPathMap, binding_from_content, xpath_from_description};
use crate::store;
use crate::types::{ActionRecord, AgentRun, AgentTask, ElementDetails, NormalizedHistory, RawAction, ScenarioResult};
use crate::{Error, Result};

/// Opens browser sessions. One session serves every scenario of a feature.
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    async fn new_session(&self) -> Result<Box<dyn AgentSession>>;
}

#[async_trait]
pub trait AgentSession: Send {
    /// Runs an agent on `task` to completion.
    async fn run_agent(&mut self, task: AgentTask) -> Result<AgentRun>;

    async fn close(&mut self) -> Result<()>;
}

const LOCATOR_DISCOVERY: &[&str] = &["get_xpath", "get_element_xpath"];
const INTERACTIONS: &[&str] = &[
    "input_text",
    "click_element",
    "click_element_by_index",
    "perform_element_action",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    LocatorDiscovery,
    Interaction,
    Other,
}

impl ActionKind {
    fn classify(name: &str) -> Self {
        if LOCATOR_DISCOVERY.contains(&name) {
            ActionKind::LocatorDiscovery
        } else if INTERACTIONS.contains(&name) {
            ActionKind::Interaction
        } else {
            ActionKind::Other
        }
    }
}

/// Structured locator first, then the `xpath='...'` token of the description.
fn locator_evidence(action: &RawAction) -> Option<&str> {
    action
        .locator
        .as_deref()
        .filter(|x| !x.is_empty())
        .or_else(|| {
            action
                .interacted_element
                .as_deref()
                .and_then(xpath_from_description)
        })
}

/// Turns one agent run into a [`ScenarioResult`], binding any locator
/// evidence it carries into `xpaths`.
pub fn record_run(run: &AgentRun, xpaths: &mut ElementXPathMap) -> ScenarioResult {
    let mut actions = Vec::with_capacity(run.model_actions.len());

    for (sequence_index, raw) in run.model_actions.iter().enumerate() {
        let element_details = match ActionKind::classify(&raw.name) {
            ActionKind::LocatorDiscovery | ActionKind::Interaction => raw.index().map(|index| {
                let evidence = locator_evidence(raw);
                if let Some(xpath) = evidence {
                    if xpaths.bind(index, xpath) {
                        debug!("bound element {index} to {xpath}");
                    }
                }
                // Indices restart on every page, so an action's own locator beats the map.
                let xpath = evidence.or_else(|| xpaths.get(index));
                ElementDetails {
                    index,
                    xpath: xpath.map(str::to_string),
                }
            }),
            ActionKind::Other => None,
        };

        actions.push(ActionRecord {
            name: raw.name.clone(),
            sequence_index,
            params: raw.params.clone(),
            element_details,
        });
    }

    for content in &run.extracted_content {
        if let Some((index, xpath)) = binding_from_content(content) {
            if xpaths.bind(index, xpath.as_str()) {
                debug!("bound element {index} to {xpath} from extracted content");
            }
        }
    }

    // Earlier steps of this run may reference an index bound later in it.
    for details in actions.iter_mut().filter_map(|a| a.element_details.as_mut()) {
        if details.xpath.is_none() {
            details.xpath = xpaths.get(details.index).map(str::to_string);
        }
    }

    ScenarioResult {
        final_result: run.structured_result(),
        actions,
        extracted_content: run.extracted_content.clone(),
        errors: run.errors.clone(),
        urls: run.urls.clone(),
        action_names: run.action_names.clone(),
    }
}

pub struct InteractionRecorder {
    entry_url: String,
    audit_path: Option<PathBuf>,
    aggregator: HistoryAggregator,
}

impl InteractionRecorder {
    pub fn new(entry_url: impl Into<String>, aggregator: HistoryAggregator) -> Self {
        Self {
            entry_url: entry_url.into(),
            audit_path: None,
            aggregator,
        }
    }

    /// Writes every agent run of an execution to `path`, replacing earlier contents.
    pub fn with_audit_trail(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_path = Some(path.into());
        self
    }

    /// Executes every scenario of `document` in order and aggregates the result.
    ///
    /// Any engine failure aborts the whole execution; the session is closed
    /// either way.
    pub async fn execute(
        &self,
        engine: &dyn AutomationEngine,
        document: &str,
    ) -> Result<NormalizedHistory> {
        let scenarios = split_scenarios(document);
        let mut xpaths = ElementXPathMap::new();

        if scenarios.is_empty() {
            warn!("feature has no `Scenario:` blocks, nothing to execute");
            return Ok(self.aggregator.aggregate(Vec::new(), xpaths, execution_date()));
        }

        let mut session = engine.new_session().await.map_err(into_execution_error)?;
        let outcome = self
            .run_scenarios(session.as_mut(), &scenarios, &mut xpaths)
            .await;
        if let Err(e) = session.close().await {
            warn!("failed to close browser session: {e}");
        }

        let results = outcome?;
        info!(
            "executed {} scenario(s), {} element locator(s) bound",
            results.len(),
            xpaths.len()
        );
        Ok(self.aggregator.aggregate(results, xpaths, execution_date()))
    }

    async fn run_scenarios(
        &self,
        session: &mut dyn AgentSession,
        scenarios: &[String],
        xpaths: &mut ElementXPathMap,
    ) -> Result<Vec<ScenarioResult>> {
        let mut results = Vec::with_capacity(scenarios.len());
        let mut runs = Vec::with_capacity(scenarios.len());

        for (number, scenario) in scenarios.iter().enumerate() {
            info!(
                "running scenario {}/{}: {}",
                number + 1,
                scenarios.len(),
                scenario.lines().next().unwrap_or_default().trim()
            );
            let task = AgentTask::for_scenario(scenario, &self.entry_url);
            let run = session.run_agent(task).await.map_err(into_execution_error)?;

            results.push(record_run(&run, xpaths));
            runs.push(run);
            self.write_audit_trail(&runs);
        }
        Ok(results)
    }

    fn write_audit_trail(&self, runs: &[AgentRun]) {
        if let Some(path) = &self.audit_path {
            if let Err(e) = store::save_json(path, runs) {
                warn!("failed to write agent history to {}: {e}", path.display());
            }
        }
    }
}

fn into_execution_error(e: Error) -> Error {
    match e {
        Error::AgentExecution(_) => e,
        other => Error::AgentExecution(other.to_string()),
    }
}

fn execution_date() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
