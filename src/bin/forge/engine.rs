//! Chrome-backed automation engine: the LLM picks steps, Chrome executes them.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use headless_chrome::Tab;
use scenario_forge::llm::ChatClient;
use scenario_forge::{AgentRun, AgentSession, AgentTask, AutomationEngine, Config, Error, RawAction};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::brain::{Brain, Decision};
use crate::face::AgentEvent;
use crate::hands::{self, BrowserSession};
use crate::types::{PageState, Step};

pub struct ChromeEngine {
    client: ChatClient,
    headless: bool,
    chrome_path: Option<PathBuf>,
    max_steps: usize,
    events: Option<broadcast::Sender<AgentEvent>>,
}

impl ChromeEngine {
    pub fn new(config: &Config, client: ChatClient) -> Self {
        Self {
            client,
            headless: config.headless,
            chrome_path: config.chrome_path.clone(),
            max_steps: config.max_steps,
            events: None,
        }
    }

    pub fn with_events(mut self, events: broadcast::Sender<AgentEvent>) -> Self {
        self.events = Some(events);
        self
    }
}

#[async_trait]
impl AutomationEngine for ChromeEngine {
    async fn new_session(&self) -> scenario_forge::Result<Box<dyn AgentSession>> {
        let headless = self.headless;
        let chrome_path = self.chrome_path.clone();
        let browser = tokio::task::spawn_blocking(move || BrowserSession::launch(headless, chrome_path))
            .await
            .map_err(|e| Error::AgentExecution(format!("Browser launch panicked: {}", e)))?
            .map_err(|e| Error::AgentExecution(format!("{:#}", e)))?;

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            brain: Brain::new(self.client.clone()),
            max_steps: self.max_steps,
            events: self.events.clone(),
            scenarios_run: 0,
        }))
    }
}

pub struct ChromeSession {
    browser: Option<BrowserSession>,
    brain: Brain,
    max_steps: usize,
    events: Option<broadcast::Sender<AgentEvent>>,
    scenarios_run: usize,
}

impl ChromeSession {
    fn emit(&self, event: AgentEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Runs one step in a blocking context and records it on `run`.
    async fn perform(&self, tab: &Arc<Tab>, step: Step, run: &mut AgentRun) -> scenario_forge::Result<PageState> {
        let description = format!("{:?}", step);
        info!("step {}: {}", run.model_actions.len() + 1, description);
        self.emit(AgentEvent::Step {
            number: run.model_actions.len() + 1,
            description,
        });

        let tab = tab.clone();
        let step_clone = step.clone();
        let (result, page) = tokio::task::spawn_blocking(move || {
            let result = hands::execute_step_on_tab(&tab, &step_clone);
            let page = capture_page(&tab);
            (result, page)
        })
        .await
        .map_err(|e| Error::AgentExecution(format!("Browser task panicked: {}", e)))?;

        // The page must stay readable; anything else means the browser is gone.
        let (url, title, dom_snapshot) =
            page.map_err(|e| Error::AgentExecution(format!("Lost the browser page: {:#}", e)))?;

        let mut raw = RawAction::new(step.action_name(), step.params());
        let mut extracted = Vec::new();
        let mut error = None;
        match result {
            Ok(outcome) => {
                if let Some(interaction) = outcome.interacted {
                    raw = raw
                        .with_interacted_element(interaction.description)
                        .with_locator(interaction.xpath);
                }
                extracted = outcome.extracted;
            }
            Err(e) => {
                let message = format!("{} failed: {:#}", step.action_name(), e);
                warn!("{}", message);
                self.emit(AgentEvent::StepError {
                    message: message.clone(),
                });
                run.errors.push(message.clone());
                error = Some(message);
            }
        }

        run.model_actions.push(raw);
        run.action_names.push(step.action_name().to_string());
        run.extracted_content.extend(extracted.iter().cloned());
        if run.urls.last() != Some(&url) {
            run.urls.push(url.clone());
        }

        Ok(PageState {
            url,
            title,
            dom_snapshot,
            extracted,
            error,
        })
    }
}

fn capture_page(tab: &Arc<Tab>) -> anyhow::Result<(String, String, String)> {
    let dom_snapshot = crate::dom::capture_dom_snapshot(tab)?;
    let url = crate::dom::get_current_url(tab)?;
    let title = crate::dom::get_page_title(tab).unwrap_or_else(|_| "untitled".into());
    Ok((url, title, dom_snapshot))
}

/// Records an LLM reply that was not a step. The scenario carries on.
fn note_unparsable(run: &mut AgentRun, detail: &str) -> String {
    let message = format!("Unusable LLM reply: {}", detail);
    run.errors.push(message.clone());
    message
}

/// Initial actions arrive in recorder vocabulary; only navigation is supported.
fn initial_step(action: &RawAction) -> scenario_forge::Result<Step> {
    match (action.name.as_str(), action.params.get("url").and_then(Value::as_str)) {
        ("go_to_url", Some(url)) => Ok(Step::Navigate {
            url: url.to_string(),
        }),
        (name, _) => Err(Error::AgentExecution(format!(
            "unsupported initial action '{}'",
            name
        ))),
    }
}

#[async_trait]
impl AgentSession for ChromeSession {
    async fn run_agent(&mut self, task: AgentTask) -> scenario_forge::Result<AgentRun> {
        if task.perceive_visually {
            return Err(Error::AgentExecution(
                "visual perception is not supported, use DOM snapshots".to_string(),
            ));
        }
        let tab = self
            .browser
            .as_ref()
            .map(|b| b.tab.clone())
            .ok_or_else(|| Error::AgentExecution("browser session already closed".to_string()))?;

        self.scenarios_run += 1;
        self.emit(AgentEvent::ScenarioStarted {
            number: self.scenarios_run,
            title: task.task.lines().next().unwrap_or_default().trim().to_string(),
        });

        let mut run = AgentRun::default();
        self.brain.start_task(&task.task);

        for action in &task.initial_actions {
            let step = initial_step(action)?;
            let state = self.perform(&tab, step, &mut run).await?;
            self.brain.observe(&state);
        }

        let mut steps = 0;
        loop {
            if steps >= self.max_steps {
                let message = format!("Reached maximum step limit ({})", self.max_steps);
                warn!("{}", message);
                run.errors.push(message.clone());
                run.final_result = Some(Value::String(message));
                break;
            }

            self.emit(AgentEvent::Thinking);
            let decision = self
                .brain
                .decide_next_step()
                .await
                .map_err(|e| Error::AgentExecution(format!("{:#}", e)))?;
            steps += 1;

            let step = match decision {
                Decision::Step(step) => step,
                Decision::Unparsable(detail) => {
                    let message = note_unparsable(&mut run, &detail);
                    warn!("{}", message);
                    self.emit(AgentEvent::StepError {
                        message: message.clone(),
                    });
                    self.brain.reject(&message);
                    continue;
                }
            };

            if let Step::Done { ref summary } = step {
                info!("scenario complete: {}", summary);
                run.model_actions.push(RawAction::new(step.action_name(), step.params()));
                run.action_names.push(step.action_name().to_string());
                run.final_result = Some(Value::String(summary.clone()));
                self.emit(AgentEvent::ScenarioComplete {
                    summary: summary.clone(),
                });
                break;
            }

            let state = self.perform(&tab, step, &mut run).await?;
            self.brain.observe(&state);
        }

        Ok(run)
    }

    async fn close(&mut self) -> scenario_forge::Result<()> {
        if self.browser.take().is_some() {
            info!("browser session closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn navigation_is_the_only_initial_action() {
        let go = RawAction::new("go_to_url", json!({"url": "https://app.test"}));
        assert_eq!(
            initial_step(&go).unwrap(),
            Step::Navigate { url: "https://app.test".to_string() }
        );
        assert!(initial_step(&RawAction::new("click_element", json!({"index": 1}))).is_err());
    }

    #[test]
    fn unusable_reply_is_recorded_as_run_error() {
        let mut run = AgentRun::default();
        let message = note_unparsable(&mut run, "Failed to parse LLM response: expected value");
        assert_eq!(run.errors, vec![message.clone()]);
        assert!(message.contains("expected value"));
        assert!(run.model_actions.is_empty());
        assert!(run.final_result.is_none());
    }
}
