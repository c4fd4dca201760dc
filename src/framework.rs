use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the generated tests drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    #[default]
    Web,
    Mobile,
}

/// Target test frameworks. Any selection surface lists [`Framework::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    SeleniumPytestBdd,
    PlaywrightPython,
    CypressJs,
    RobotFramework,
    SeleniumCucumberJava,
    AppiumPytest,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown framework '{0}'")]
pub struct UnknownFrameworkError(pub String);

impl Framework {
    pub const ALL: [Framework; 6] = [
        Framework::SeleniumPytestBdd,
        Framework::PlaywrightPython,
        Framework::CypressJs,
        Framework::RobotFramework,
        Framework::SeleniumCucumberJava,
        Framework::AppiumPytest,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Framework::SeleniumPytestBdd => "Selenium + PyTest BDD (Python)",
            Framework::PlaywrightPython => "Playwright (Python)",
            Framework::CypressJs => "Cypress (JavaScript)",
            Framework::RobotFramework => "Robot Framework",
            Framework::SeleniumCucumberJava => "Selenium + Cucumber (Java)",
            Framework::AppiumPytest => "Appium + PyTest (Mobile)",
        }
    }

    /// Short identifier used on the command line.
    pub fn id(self) -> &'static str {
        match self {
            Framework::SeleniumPytestBdd => "selenium-pytest-bdd",
            Framework::PlaywrightPython => "playwright-python",
            Framework::CypressJs => "cypress-js",
            Framework::RobotFramework => "robot-framework",
            Framework::SeleniumCucumberJava => "selenium-cucumber-java",
            Framework::AppiumPytest => "appium-pytest",
        }
    }

    pub fn platform(self) -> Platform {
        match self {
            Framework::SeleniumPytestBdd
            | Framework::PlaywrightPython
            | Framework::CypressJs
            | Framework::RobotFramework
            | Framework::SeleniumCucumberJava => Platform::Web,
            Framework::AppiumPytest => Platform::Mobile,
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            Framework::SeleniumPytestBdd
            | Framework::PlaywrightPython
            | Framework::AppiumPytest => "py",
            Framework::CypressJs => "js",
            Framework::RobotFramework => "robot",
            Framework::SeleniumCucumberJava => "java",
        }
    }

    /// Language tag for syntax highlighting and for the fenced reply.
    pub fn syntax_hint(self) -> &'static str {
        match self {
            Framework::SeleniumPytestBdd
            | Framework::PlaywrightPython
            | Framework::AppiumPytest => "python",
            Framework::CypressJs => "javascript",
            Framework::RobotFramework => "robotframework",
            Framework::SeleniumCucumberJava => "java",
        }
    }

    /// Resolves a display name or short id.
    pub fn lookup(name: &str) -> Result<Self, UnknownFrameworkError> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.display_name() == name || f.id() == name)
            .ok_or_else(|| UnknownFrameworkError(name.to_string()))
    }
}

impl FromStr for Framework {
    type Err = UnknownFrameworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s)
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entry_resolves_with_extension() {
        let expected = [
            ("Selenium + PyTest BDD (Python)", "py", Platform::Web),
            ("Playwright (Python)", "py", Platform::Web),
            ("Cypress (JavaScript)", "js", Platform::Web),
            ("Robot Framework", "robot", Platform::Web),
            ("Selenium + Cucumber (Java)", "java", Platform::Web),
            ("Appium + PyTest (Mobile)", "py", Platform::Mobile),
        ];
        assert_eq!(expected.len(), Framework::ALL.len());
        for (name, ext, platform) in expected {
            let framework = Framework::lookup(name).unwrap();
            assert_eq!(framework.file_extension(), ext);
            assert_eq!(framework.platform(), platform);
            assert_eq!(framework.to_string(), name);
        }
    }

    #[test]
    fn platform_parses_kebab_case() {
        assert_eq!(serde_json::from_str::<Platform>("\"mobile\"").unwrap(), Platform::Mobile);
        assert_eq!(Platform::default(), Platform::Web);
    }

    #[test]
    fn short_ids_resolve() {
        for framework in Framework::ALL {
            assert_eq!(framework.id().parse::<Framework>(), Ok(framework));
        }
    }

    #[test]
    fn unknown_name_fails() {
        assert_eq!(
            Framework::lookup("WebdriverIO"),
            Err(UnknownFrameworkError("WebdriverIO".to_string()))
        );
        assert!(Framework::lookup("cypress (javascript)").is_err());
        assert!(Framework::lookup("").is_err());
    }
}
