use anyhow::Result;
use headless_chrome::{Browser, LaunchOptions, Tab};
use scenario_forge::locator::{LookupFailure, element_description, lookup_content};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::dom;
use crate::types::{EXTRACT_MAX_CHARS, Step};

/// Browser session shared by every scenario of one execution.
pub struct BrowserSession {
    _browser: Browser,
    pub tab: Arc<Tab>,
}

/// Element a step acted on, as reported back to the recorder.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub description: String,
    pub xpath: String,
}

#[derive(Debug, Default)]
pub struct StepOutcome {
    pub interacted: Option<Interaction>,
    pub extracted: Vec<String>,
}

impl BrowserSession {
    pub fn launch(headless: bool, chrome_path: Option<PathBuf>) -> Result<Self> {
        let profile = agent_profile_dir()?;
        info!("starting Chrome (profile {})", profile.display());

        let options = LaunchOptions {
            headless,
            path: chrome_path,
            user_data_dir: Some(profile),
            args: vec![
                std::ffi::OsStr::new("--no-first-run"),
                std::ffi::OsStr::new("--no-default-browser-check"),
                std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
                std::ffi::OsStr::new("--disable-infobars"),
                std::ffi::OsStr::new("--password-store=basic"),
            ],
            idle_browser_timeout: Duration::from_secs(300),
            ..Default::default()
        };

        let browser = Browser::new(options)
            .map_err(|e| anyhow::anyhow!("Browser launch failed: {}", e))?;

        let tab = browser.new_tab()?;
        tab.navigate_to("about:blank")?;
        info!("Chrome ready");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}

/// Persistent shadow profile so the agent never locks the user's own one.
fn agent_profile_dir() -> Result<PathBuf> {
    let base = match dirs::cache_dir() {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let profile = base.join("scenario-forge").join("chrome-profile");
    std::fs::create_dir_all(&profile)?;
    Ok(profile)
}

/// Execute a step using just the Arc<Tab> (so it can run in spawn_blocking).
pub fn execute_step_on_tab(tab: &Arc<Tab>, step: &Step) -> Result<StepOutcome> {
    let mut outcome = StepOutcome::default();

    match step {
        Step::Navigate { url } => {
            tab.navigate_to(url)?;
            tab.wait_for_element("body")?;
            std::thread::sleep(Duration::from_millis(1500));
        }
        Step::WaitFor {
            selector,
            timeout_ms,
        } => {
            tab.wait_for_element_with_custom_timeout(selector, Duration::from_millis(*timeout_ms))?;
        }
        Step::TypeInto { index, text } => {
            let interaction = describe(tab, *index)?;
            let selector = dom::selector_for(*index);
            let el = tab.find_element(&selector)?;
            el.click()?;
            tab.evaluate(
                &format!("document.querySelector('{}').value = ''", selector.replace('\'', "\\'")),
                false,
            )?;
            tab.type_str(text)?;
            outcome.interacted = Some(interaction);
        }
        Step::Click { index } => {
            let interaction = describe(tab, *index)?;
            let el = tab.find_element(&dom::selector_for(*index))?;
            el.click()?;
            std::thread::sleep(Duration::from_millis(1000));
            outcome.interacted = Some(interaction);
        }
        Step::PressKey { key } => {
            tab.press_key(key)?;
            std::thread::sleep(Duration::from_millis(1000));
        }
        Step::GetXpath { index } => {
            // A failed lookup is reported as content, never as a step error.
            let lookup = dom::element_info(tab, *index)
                .map(|info| info.xpath)
                .map_err(|e| LookupFailure {
                    index: *index,
                    reason: format!("{:#}", e),
                });
            if let Err(failure) = &lookup {
                warn!("xpath lookup for element {} failed: {}", index, failure.reason);
            }
            outcome.extracted.push(lookup_content(*index, &lookup));
            if let Ok(xpath) = lookup {
                outcome.interacted = Some(Interaction {
                    description: format!("element {}", index),
                    xpath,
                });
            }
        }
        Step::Extract { selector, label } => {
            let js_sel = selector.replace('\'', "\\'");
            let result = tab.evaluate(
                &format!("(document.querySelector('{js_sel}') || {{}}).innerText || ''"),
                false,
            )?;
            let content: String = result
                .value
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default()
                .chars()
                .take(EXTRACT_MAX_CHARS)
                .collect();
            outcome.extracted.push(format!("{label}: {content}"));
        }
        Step::Done { .. } => {}
    }

    Ok(outcome)
}

fn describe(tab: &Arc<Tab>, index: u32) -> Result<Interaction> {
    let info = dom::element_info(tab, index)?;
    debug!("element {} resolved to {}", index, info.xpath);
    Ok(Interaction {
        description: element_description(&info.tag, index, &info.xpath),
        xpath: info.xpath,
    })
}
