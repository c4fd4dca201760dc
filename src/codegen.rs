//! Projects a Gherkin feature and its recorded history into framework source.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::framework::Framework;
use crate::gherkin::{extract_code_block, feature_slug};
use crate::types::NormalizedHistory;
use crate::{Error, Result};

/// A text-completion service. Replies are expected to hold one fenced block.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub framework: Framework,
    pub filename: String,
    pub code: String,
}

impl GeneratedArtifact {
    /// Writes the code into `dir`. The filename must be a single plain component.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let mut components = Path::new(&self.filename).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(Error::Generation(format!(
                "artifact filename '{}' is not a plain file name",
                self.filename
            )));
        }
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.code)?;
        info!("wrote {}", path.display());
        Ok(path)
    }
}

/// `<feature_slug>_automation.<ext>`
pub fn output_filename(framework: Framework, gherkin: &str) -> String {
    format!(
        "{}_automation.{}",
        feature_slug(gherkin),
        framework.file_extension()
    )
}

/// `element_<index>` → xpath, in index order.
pub fn selectors_view(history: &NormalizedHistory) -> Value {
    let selectors: serde_json::Map<String, Value> = history
        .element_xpaths
        .iter()
        .map(|(index, xpath)| (format!("element_{index}"), Value::from(xpath)))
        .collect();
    Value::Object(selectors)
}

/// Ordered steps with their resolved locators, plus the extracted content.
pub fn actions_view(history: &NormalizedHistory) -> Value {
    let steps: Vec<Value> = history
        .detailed_actions
        .iter()
        .map(|action| {
            let mut step = json!({
                "step": action.sequence_index,
                "action": action.name,
            });
            if !action.params.is_null() {
                step["params"] = action.params.clone();
            }
            if let Some(details) = &action.element_details {
                step["element_index"] = json!(details.index);
                if let Some(xpath) = &details.xpath {
                    step["xpath"] = json!(xpath);
                }
            }
            step
        })
        .collect();

    json!({
        "steps": steps,
        "extracted_content": history.extracted_content,
    })
}

fn framework_guidance(framework: Framework) -> &'static str {
    match framework {
        Framework::SeleniumPytestBdd => {
            "Use Python with Selenium WebDriver and pytest-bdd. Bind the feature with \
             `scenarios()`, write `@given`/`@when`/`@then` step definitions, provide the \
             driver through a pytest fixture and locate elements with `By.XPATH`."
        }
        Framework::PlaywrightPython => {
            "Use Python with Playwright's sync API under pytest. One test function per \
             scenario, use the `page` fixture and `page.locator(\"xpath=...\")`, and assert \
             with `expect`."
        }
        Framework::CypressJs => {
            "Use JavaScript with Cypress. One `describe` block for the feature and one `it` \
             per scenario; locate elements with `cy.xpath(...)` and note the \
             cypress-xpath plugin in a comment at the top."
        }
        Framework::RobotFramework => {
            "Use Robot Framework with SeleniumLibrary. Provide `*** Settings ***`, \
             `*** Variables ***` holding the xpaths, `*** Test Cases ***` with one case per \
             scenario and `*** Keywords ***` for reusable steps."
        }
        Framework::SeleniumCucumberJava => {
            "Use Java with Selenium WebDriver and Cucumber. Write a step definition class \
             with `@Given`/`@When`/`@Then` annotations, a page object holding `By.xpath` \
             locators, and set up and quit the driver in `@Before`/`@After` hooks."
        }
        Framework::AppiumPytest => {
            "Use Python with the Appium client and pytest for a native or hybrid iOS/Android \
             app. Create the driver in a fixture from desired capabilities read from the \
             environment, prefer accessibility ids and fall back to the recorded xpaths, and \
             comment each step with the Gherkin line it implements."
        }
    }
}

pub struct CodeProjector<'a> {
    generator: &'a dyn CodeGenerator,
}

impl<'a> CodeProjector<'a> {
    pub fn new(generator: &'a dyn CodeGenerator) -> Self {
        Self { generator }
    }

    pub fn prompt(&self, framework: Framework, gherkin: &str, history: &NormalizedHistory) -> String {
        let selectors = serde_json::to_string_pretty(&selectors_view(history)).unwrap_or_default();
        let actions = serde_json::to_string_pretty(&actions_view(history)).unwrap_or_default();
        let urls = serde_json::to_string_pretty(&history.urls).unwrap_or_default();
        let language = framework.syntax_hint();

        format!(
            "Generate a single, self-contained {name} test automation file.\n\
             {guidance}\n\n\
             Gherkin feature:\n```gherkin\n{gherkin}\n```\n\n\
             Recorded execution:\n\
             - Element selectors (xpath): {selectors}\n\
             - Actions performed: {actions}\n\
             - URLs visited: {urls}\n\n\
             Include all imports and setup. Return ONLY one ```{language} fenced code block.",
            name = framework.display_name(),
            guidance = framework_guidance(framework),
        )
    }

    pub async fn generate(
        &self,
        framework: Framework,
        gherkin: &str,
        history: &NormalizedHistory,
    ) -> Result<GeneratedArtifact> {
        let prompt = self.prompt(framework, gherkin, history);
        debug!("code generation prompt is {} chars", prompt.len());

        let reply = self.generator.complete(&prompt).await?;
        let code = extract_code_block(&reply).ok_or_else(|| {
            Error::Generation(format!(
                "reply for {framework} contained no fenced code block"
            ))
        })?;

        let artifact = GeneratedArtifact {
            framework,
            filename: output_filename(framework, gherkin),
            code,
        };
        info!("generated {} ({} bytes)", artifact.filename, artifact.code.len());
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionRecord, ElementDetails};
    use std::sync::Mutex;

    struct Canned {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl Canned {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CodeGenerator for Canned {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn history() -> NormalizedHistory {
        NormalizedHistory {
            detailed_actions: vec![ActionRecord {
                name: "click_element".to_string(),
                sequence_index: 0,
                params: json!({"index": 7}),
                element_details: Some(ElementDetails {
                    index: 7,
                    xpath: Some("//button[@id=\"submit\"]".to_string()),
                }),
            }],
            element_xpaths: [(7, "//button[@id=\"submit\"]".to_string())]
                .into_iter()
                .collect(),
            extracted_content: vec!["Logged in".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn filename_uses_slug_and_extension() {
        assert_eq!(
            output_filename(Framework::RobotFramework, "Feature: User Login Flow"),
            "user_login_flow_automation.robot"
        );
        assert_eq!(
            output_filename(Framework::SeleniumCucumberJava, "Scenario: a"),
            "automated_test_automation.java"
        );
    }

    #[test]
    fn views_carry_locators() {
        let h = history();
        assert_eq!(selectors_view(&h), json!({"element_7": "//button[@id=\"submit\"]"}));
        let actions = actions_view(&h);
        assert_eq!(actions["steps"][0]["xpath"], "//button[@id=\"submit\"]");
        assert_eq!(actions["steps"][0]["element_index"], 7);
        assert_eq!(actions["extracted_content"][0], "Logged in");
    }

    #[tokio::test]
    async fn prompt_embeds_gherkin_and_history() {
        let canned = Canned::new("```python\nprint('ok')\n```");
        let projector = CodeProjector::new(&canned);
        projector
            .generate(Framework::PlaywrightPython, "Feature: Search", &history())
            .await
            .unwrap();

        let prompts = canned.prompts.lock().unwrap();
        assert!(prompts[0].contains("Feature: Search"));
        assert!(prompts[0].contains("element_7"));
        assert!(prompts[0].contains("Logged in"));
        assert!(prompts[0].contains("```python fenced code block"));
    }

    #[tokio::test]
    async fn appium_projection_reuses_views() {
        let canned = Canned::new("```python\nfrom appium import webdriver\n```");
        let artifact = CodeProjector::new(&canned)
            .generate(Framework::AppiumPytest, "Feature: Mobile Login", &history())
            .await
            .unwrap();

        assert_eq!(artifact.filename, "mobile_login_automation.py");
        assert_eq!(artifact.code, "from appium import webdriver");
        let prompts = canned.prompts.lock().unwrap();
        assert!(prompts[0].contains("Appium + PyTest (Mobile)"));
        assert!(prompts[0].contains("accessibility ids"));
        assert!(prompts[0].contains("element_7"));
    }

    #[tokio::test]
    async fn prose_around_block_is_discarded() {
        let canned = Canned::new("Sure!\n```javascript\ndescribe('Login', () => {});\n```\nDone.");
        let artifact = CodeProjector::new(&canned)
            .generate(Framework::CypressJs, "Feature: Login", &history())
            .await
            .unwrap();
        assert_eq!(artifact.code, "describe('Login', () => {});");
        assert_eq!(artifact.filename, "login_automation.js");
    }

    #[tokio::test]
    async fn missing_block_is_generation_error() {
        let canned = Canned::new("I cannot do that.");
        let err = CodeProjector::new(&canned)
            .generate(Framework::CypressJs, "Feature: Login", &history())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[test]
    fn artifact_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = GeneratedArtifact {
            framework: Framework::CypressJs,
            filename: "login_automation.js".to_string(),
            code: "describe()".to_string(),
        };
        let path = artifact.write_to(dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "describe()");
    }

    #[test]
    fn artifact_stays_inside_output_dir() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out").join("nested");

        let filename = output_filename(Framework::CypressJs, "Feature: ../../escape");
        assert_eq!(filename, "______escape_automation.js");
        let artifact = GeneratedArtifact {
            framework: Framework::CypressJs,
            filename,
            code: "describe()".to_string(),
        };
        let path = artifact.write_to(&out).unwrap();
        assert_eq!(path.parent(), Some(out.as_path()));

        let crafted = GeneratedArtifact {
            filename: "../escape_automation.js".to_string(),
            ..artifact
        };
        assert!(matches!(crafted.write_to(&out), Err(Error::Generation(_))));
        assert!(!root.path().join("out").join("escape_automation.js").exists());
    }
}
