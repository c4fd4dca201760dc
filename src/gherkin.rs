//! Gherkin text handling: scenario splitting, feature naming, and the fenced
//! block convention shared with the code generator.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::codegen::CodeGenerator;
use crate::framework::Platform;
use crate::{Error, Result};

const SCENARIO_MARKER: &str = "Scenario:";
const FALLBACK_STEM: &str = "automated_test";

static FEATURE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*Feature:[ \t]*(.+)$").expect("valid regex"));
static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n`]*\n(.*?)```").expect("valid regex"));

/// Splits a feature into scenario blocks, one per `Scenario:` header.
///
/// A block runs from its header line up to the line before the next header
/// (or the end of the document). Text before the first header is dropped.
/// `Background:` and `Scenario Outline:` are not block starts; their lines
/// belong to whichever block is open.
pub fn split_scenarios(document: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in document.lines() {
        if line.trim().starts_with(SCENARIO_MARKER) {
            if let Some(block) = current.take() {
                blocks.push(block.join("\n"));
            }
            current = Some(vec![line]);
        } else if let Some(block) = current.as_mut() {
            block.push(line);
        }
    }
    if let Some(block) = current {
        blocks.push(block.join("\n"));
    }

    debug!("split feature into {} scenario(s)", blocks.len());
    blocks
}

/// File stem derived from the `Feature:` line, or `automated_test`.
///
/// Anything other than letters, digits, `-` and `_` becomes `_`, so the stem
/// is always a single path component.
pub fn feature_slug(document: &str) -> String {
    FEATURE_LINE
        .captures(document)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.to_lowercase()
                .chars()
                .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                .collect::<String>()
        })
        .unwrap_or_else(|| FALLBACK_STEM.to_string())
}

/// Body of the first fenced code block, without the fences or language tag.
pub fn extract_code_block(text: &str) -> Option<String> {
    let body = FENCED_BLOCK.captures(text)?.get(1)?.as_str();
    let body = body.trim_end_matches(['\n', '\r']);
    if body.trim().is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}

/// Writes a feature file for a user story or a set of manual test cases.
pub async fn author_feature(
    story: &str,
    platform: Platform,
    generator: &dyn CodeGenerator,
) -> Result<String> {
    let audience = match platform {
        Platform::Web => "a web application",
        Platform::Mobile => {
            "a native or hybrid mobile app on iOS and Android. Describe what the user \
             wants, not individual taps or swipes"
        }
    };
    let prompt = format!(
        "Convert the following user story and manual test cases into a single Gherkin \
         feature file for {audience}.\n\
         Start with a `Feature:` line, use `Scenario:` for single flows and \
         `Scenario Outline:` with `Examples:` for data-driven ones, tag scenarios, and \
         keep steps at the level of user intent.\n\
         Return ONLY one ```gherkin fenced code block.\n\n{story}"
    );
    let reply = generator.complete(&prompt).await?;
    extract_code_block(&reply)
        .ok_or_else(|| Error::Generation("reply contained no fenced gherkin block".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN: &str = "Feature: Login\n\
        \n\
        Scenario: Valid login\n\
        Given the login page\n\
        When valid credentials are submitted\n\
        Then the dashboard is shown\n\
        \n\
        Scenario: Invalid login\n\
        Given the login page\n\
        When a wrong password is submitted\n\
        Then an error is shown";

    #[test]
    fn one_block_per_header() {
        let blocks = split_scenarios(LOGIN);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("Scenario: Valid login"));
        assert!(blocks[1].starts_with("Scenario: Invalid login"));
    }

    #[test]
    fn blocks_reproduce_header_to_header_spans() {
        let blocks = split_scenarios(LOGIN);
        let start = LOGIN.find("Scenario: Valid").unwrap();
        assert_eq!(blocks.join("\n"), &LOGIN[start..]);
    }

    #[test]
    fn preamble_is_dropped() {
        assert!(split_scenarios("Feature: Nothing here\n  As a user\n").is_empty());
        assert!(split_scenarios("").is_empty());
    }

    #[test]
    fn indented_headers_count() {
        let doc = "Feature: X\n  Scenario: a\n    Given a\n  Scenario: b\n    Given b\n";
        let blocks = split_scenarios(doc);
        assert_eq!(blocks, vec!["  Scenario: a\n    Given a", "  Scenario: b\n    Given b"]);
    }

    #[test]
    fn background_and_outline_are_swallowed() {
        let doc = "Feature: X\nScenario: first\nGiven a\nBackground:\nGiven b\n\
                   Scenario Outline: data\nWhen <x>\nExamples:\n| x |\n| 1 |";
        let blocks = split_scenarios(doc);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("Background:"));
        assert!(blocks[0].contains("Scenario Outline: data"));
    }

    #[test]
    fn slug_from_feature_line() {
        assert_eq!(feature_slug("Feature: User Login Flow\nScenario: a"), "user_login_flow");
        assert_eq!(feature_slug("  Feature:Search  \n"), "search");
    }

    #[test]
    fn slug_fallback() {
        assert_eq!(feature_slug("Scenario: a\nGiven b"), "automated_test");
        assert_eq!(feature_slug(""), "automated_test");
        assert_eq!(feature_slug("Feature:\nScenario: a"), "automated_test");
        assert_eq!(feature_slug("Feature:   \nScenario: a"), "automated_test");
    }

    #[test]
    fn slug_is_a_single_path_component() {
        assert_eq!(feature_slug("Feature: ../../escape"), "______escape");
        assert_eq!(feature_slug("Feature: Login/Logout"), "login_logout");
        assert_eq!(feature_slug("Feature: C:\\temp\\x"), "c__temp_x");
        assert_eq!(feature_slug("Feature: Checkout-v2 (guest)"), "checkout-v2__guest_");
    }

    #[test]
    fn code_block_body_only() {
        let reply = "Here is the test:\n```javascript\ndescribe('x', () => {});\n```\nEnjoy!";
        assert_eq!(extract_code_block(reply).as_deref(), Some("describe('x', () => {});"));
    }

    #[test]
    fn code_block_without_language() {
        let reply = "```\nline one\nline two\n```";
        assert_eq!(extract_code_block(reply).as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn no_code_block() {
        assert_eq!(extract_code_block("just prose"), None);
        assert_eq!(extract_code_block("```python\n```"), None);
    }

    struct Canned(&'static str, std::sync::Mutex<Vec<String>>);

    #[async_trait::async_trait]
    impl CodeGenerator for Canned {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.1.lock().unwrap().push(prompt.to_string());
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn authored_feature_is_the_fenced_block() {
        let canned = Canned(
            "Here you go:\n```gherkin\nFeature: Login\nScenario: ok\n```",
            Default::default(),
        );
        let feature = author_feature("As a user I log in", Platform::Web, &canned)
            .await
            .unwrap();
        assert_eq!(feature, "Feature: Login\nScenario: ok");
        let prompts = canned.1.lock().unwrap();
        assert!(prompts[0].contains("a web application"));
        assert!(prompts[0].ends_with("As a user I log in"));
    }

    #[tokio::test]
    async fn mobile_authoring_asks_for_intent() {
        let canned = Canned("```gherkin\nFeature: App\n```", Default::default());
        author_feature("Open the app", Platform::Mobile, &canned)
            .await
            .unwrap();
        assert!(canned.1.lock().unwrap()[0].contains("mobile app on iOS and Android"));
    }

    #[tokio::test]
    async fn authoring_without_block_fails() {
        let canned = Canned("I need more detail.", Default::default());
        let err = author_feature("?", Platform::Web, &canned).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }
}
