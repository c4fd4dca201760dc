//! Session-scoped state and the two pipeline entry points that update it.
//!
//! The store only ever changes after a step has fully succeeded, so a
//! failed execution or generation leaves the previous snapshot in place.

use std::sync::Arc;

use tracing::info;

use crate::codegen::{CodeProjector, GeneratedArtifact};
use crate::framework::Framework;
use crate::recorder::{AutomationEngine, InteractionRecorder};
use crate::types::NormalizedHistory;
use crate::{Error, Result};

/// Snapshot of what one user session has produced so far.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    gherkin: Option<String>,
    executed_gherkin: Option<String>,
    history: Option<Arc<NormalizedHistory>>,
    artifact: Option<GeneratedArtifact>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current (possibly user-edited) feature text.
    pub fn gherkin(&self) -> Option<&str> {
        self.gherkin.as_deref()
    }

    pub fn set_gherkin(&mut self, gherkin: impl Into<String>) {
        self.gherkin = Some(gherkin.into());
    }

    /// Last successfully committed history.
    pub fn history(&self) -> Option<Arc<NormalizedHistory>> {
        self.history.clone()
    }

    /// The feature text the committed history was recorded from.
    pub fn executed_gherkin(&self) -> Option<&str> {
        self.executed_gherkin.as_deref()
    }

    pub fn artifact(&self) -> Option<&GeneratedArtifact> {
        self.artifact.as_ref()
    }

    pub fn commit_history(&mut self, gherkin: &str, history: NormalizedHistory) -> Arc<NormalizedHistory> {
        let history = Arc::new(history);
        self.gherkin = Some(gherkin.to_string());
        self.executed_gherkin = Some(gherkin.to_string());
        self.history = Some(Arc::clone(&history));
        self.artifact = None;
        history
    }

    pub fn commit_artifact(&mut self, artifact: GeneratedArtifact) {
        self.artifact = Some(artifact);
    }
}

/// Executes `document` and commits the resulting history on success.
pub async fn execute_feature(
    store: &mut SessionStore,
    recorder: &InteractionRecorder,
    engine: &dyn AutomationEngine,
    document: &str,
) -> Result<Arc<NormalizedHistory>> {
    let history = recorder.execute(engine, document).await?;
    info!(
        "committing history with {} action(s)",
        history.detailed_actions.len()
    );
    Ok(store.commit_history(document, history))
}

/// Generates framework code from the committed feature and history.
pub async fn generate_code(
    store: &mut SessionStore,
    projector: &CodeProjector<'_>,
    framework: Framework,
) -> Result<GeneratedArtifact> {
    let (Some(gherkin), Some(history)) = (store.executed_gherkin(), store.history()) else {
        return Err(Error::Generation(
            "no execution history yet, execute the feature first".to_string(),
        ));
    };

    let artifact = projector.generate(framework, gherkin, &history).await?;
    store.commit_artifact(artifact.clone());
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_replaces_artifact() {
        let mut store = SessionStore::new();
        store.commit_artifact(GeneratedArtifact {
            framework: Framework::CypressJs,
            filename: "x_automation.js".to_string(),
            code: String::new(),
        });
        store.commit_history("Feature: X", NormalizedHistory::default());
        assert!(store.artifact().is_none());
        assert_eq!(store.executed_gherkin(), Some("Feature: X"));
        assert!(store.history().is_some());
    }

    #[test]
    fn editing_gherkin_keeps_executed_text() {
        let mut store = SessionStore::new();
        store.commit_history("Feature: A", NormalizedHistory::default());
        store.set_gherkin("Feature: B");
        assert_eq!(store.gherkin(), Some("Feature: B"));
        assert_eq!(store.executed_gherkin(), Some("Feature: A"));
    }
}
