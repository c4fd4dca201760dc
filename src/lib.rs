//! Turns a Gherkin feature into a recorded browser trace and then into
//! executable test automation for one of several frameworks.
//!
//! Pipeline:
//!
//! ```text
//! Gherkin text -> split_scenarios -> InteractionRecorder (one agent run per scenario)
//!              -> HistoryAggregator -> NormalizedHistory -> CodeProjector -> source file
//! ```

pub mod codegen;
pub mod config;
pub mod framework;
pub mod gherkin;
pub mod history;
pub mod llm;
pub mod locator;
pub mod pipeline;
pub mod recorder;
pub mod store;
pub mod types;

pub use codegen::{CodeGenerator, CodeProjector, GeneratedArtifact};
pub use config::Config;
pub use framework::{Framework, Platform, UnknownFrameworkError};
pub use gherkin::{extract_code_block, feature_slug, split_scenarios};
pub use history::{HistoryAggregator, MergePolicy};
pub use locator::ElementXPathMap;
pub use pipeline::SessionStore;
pub use recorder::{AgentSession, AutomationEngine, InteractionRecorder};
pub use types::{ActionRecord, AgentRun, AgentTask, NormalizedHistory, RawAction, ScenarioResult};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The automation engine failed while running a scenario.
    #[error("agent execution failed: {0}")]
    AgentExecution(String),

    #[error(transparent)]
    UnknownFramework(#[from] UnknownFrameworkError),

    /// The code generation call failed or produced no fenced code block.
    #[error("code generation failed: {0}")]
    Generation(String),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
