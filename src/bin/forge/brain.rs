use anyhow::{Result, anyhow};
use scenario_forge::llm::{ChatClient, ChatMessage};
use tracing::{debug, warn};

use crate::types::{PageState, Step};

const SYSTEM_PROMPT: &str = r#"You are a QA browser automation agent. You execute one Gherkin scenario in a real Chrome browser by issuing ONE step at a time as JSON.

Available actions:
- {"action":"Navigate","url":"https://..."}
- {"action":"WaitFor","selector":"css selector","timeout_ms":5000}
- {"action":"TypeInto","index":3,"text":"search query"}
- {"action":"Click","index":3}
- {"action":"PressKey","key":"Enter"}
- {"action":"GetXpath","index":3}
- {"action":"Extract","selector":"body","label":"main_content"}
- {"action":"Done","summary":"Scenario passed: the dashboard is shown"}

Rules:
1. Return ONLY a single JSON object per response. No markdown, no explanation.
2. Target elements by the [N] numbers from the DOM snapshot. Numbers change after every page update, always use the latest snapshot.
3. Before interacting with an element for the first time, issue GetXpath for it so a stable locator is recorded.
4. Use TypeInto to fill inputs, then PressKey with "Enter" to submit, or Click the submit button.
5. Verify every Then step against the page (Extract when needed) before finishing.
6. When the scenario is complete, use Done with a summary that says whether it passed or failed and why.
7. If you encounter an error, try an alternative approach. If stuck after 3 attempts, use Done to explain."#;

/// What the LLM answered: a step to run, or text that is not one.
#[derive(Debug, PartialEq)]
pub enum Decision {
    Step(Step),
    Unparsable(String),
}

/// Conversation state for one scenario run.
pub struct Brain {
    client: ChatClient,
    conversation: Vec<ChatMessage>,
}

impl Brain {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            conversation: vec![ChatMessage::system(SYSTEM_PROMPT)],
        }
    }

    /// Start a new scenario. Every scenario gets a fresh conversation.
    pub fn start_task(&mut self, scenario: &str) {
        self.conversation.truncate(1);
        self.conversation.push(ChatMessage::user(format!(
            "Scenario to execute:\n{}\n\nThe browser is on the start page. What is your next step?",
            scenario
        )));
    }

    /// Feed observation back to the LLM.
    pub fn observe(&mut self, page_state: &PageState) {
        let mut observation = format!(
            "Page URL: {}\nTitle: {}\n\nDOM:\n{}",
            page_state.url, page_state.title, page_state.dom_snapshot
        );

        if let Some(ref err) = page_state.error {
            observation.push_str(&format!("\n\nERROR from last step: {}", err));
        }

        for content in &page_state.extracted {
            observation.push_str(&format!("\n\nExtracted: {}", content));
        }

        self.conversation.push(ChatMessage::user(observation));
    }

    /// Tell the LLM its last reply could not be used.
    pub fn reject(&mut self, problem: &str) {
        self.conversation.push(ChatMessage::user(format!(
            "ERROR: {}\nReply with exactly one JSON step from the list of actions.",
            problem
        )));
    }

    /// Ask the LLM for the next step. Only transport failures are errors.
    pub async fn decide_next_step(&mut self) -> Result<Decision> {
        if self.conversation.len() > 40 {
            warn!(
                "conversation history is long ({} messages)",
                self.conversation.len()
            );
        }

        let content = self.client.chat(&self.conversation).await?;
        debug!("LLM says: {}", content);
        self.conversation.push(ChatMessage::assistant(content.clone()));

        Ok(interpret(&content))
    }
}

fn interpret(content: &str) -> Decision {
    match parse_step(content) {
        Ok(step) => Decision::Step(step),
        Err(e) => Decision::Unparsable(format!("{:#}", e)),
    }
}

/// Strip possible markdown fences the LLM might add, then parse.
fn parse_step(content: &str) -> Result<Step> {
    let cleaned = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(cleaned)
        .map_err(|e| anyhow!("Failed to parse LLM response: {}. Content: {}", e, cleaned))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_step() {
        let step = parse_step("```json\n{\"action\":\"GetXpath\",\"index\":2}\n```").unwrap();
        assert_eq!(step, Step::GetXpath { index: 2 });
    }

    #[test]
    fn rejects_prose() {
        assert!(parse_step("I will click the button").is_err());
    }

    #[test]
    fn prose_reply_is_a_decision_not_an_error() {
        assert_eq!(
            interpret("{\"action\":\"Click\",\"index\":1}"),
            Decision::Step(Step::Click { index: 1 })
        );
        match interpret("Sure! First I will click login.") {
            Decision::Unparsable(detail) => assert!(detail.contains("Failed to parse LLM response")),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn rejection_is_fed_back() {
        let config = scenario_forge::Config {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let mut brain = Brain::new(ChatClient::new(&config).unwrap());
        brain.start_task("Scenario: login");
        brain.reject("not JSON");
        assert_eq!(brain.conversation.len(), 3);
        let last = serde_json::to_value(&brain.conversation[2]).unwrap();
        assert_eq!(last["role"], "user");
        assert!(last["content"].as_str().unwrap().starts_with("ERROR: not JSON"));
    }
}
